//! Identity erasure for heterogeneous sources.
//!
//! Requests from different sources share rounds, caches, and logs, so
//! identities and values of arbitrary types must become comparable
//! behind one representation. [`FetchId`] wraps any identity type in a
//! `dyn Any` with a precomputed hash and a monomorphized equality
//! function; values travel as [`BoxedValue`] and are recovered per
//! branch by downcasting.

use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bounds every identity type must satisfy.
///
/// Blanket-implemented; user code never implements it by hand.
pub trait Identity: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static> Identity for T {}

/// A result value threaded through rounds and caches.
pub type BoxedValue = Arc<dyn Any + Send + Sync>;

/// Type-erased identity with value equality and hashing.
///
/// Two `FetchId`s are equal iff they wrap the same concrete type and
/// the wrapped values compare equal. The hash covers the type as well,
/// so identities of different types never collide into one cache slot.
#[derive(Clone)]
pub struct FetchId {
    value: Arc<dyn Any + Send + Sync>,
    hash: u64,
    eq_fn: fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> bool,
    debug_fn: fn(&(dyn Any + Send + Sync)) -> String,
}

impl FetchId {
    /// Erases a typed identity.
    pub fn new<I: Identity>(value: I) -> Self {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<I>().hash(&mut hasher);
        value.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            value: Arc::new(value),
            eq_fn: eq_impl::<I>,
            debug_fn: debug_impl::<I>,
        }
    }

    /// Returns the typed identity if `I` matches the erased type.
    pub fn downcast_ref<I: Identity>(&self) -> Option<&I> {
        self.value.downcast_ref::<I>()
    }

    /// Debug rendering used in round logs and missing-identity reports.
    pub fn render(&self) -> String {
        (self.debug_fn)(self.value.as_ref())
    }
}

fn eq_impl<I: Identity>(a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
    match (a.downcast_ref::<I>(), b.downcast_ref::<I>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_impl<I: Identity>(value: &(dyn Any + Send + Sync)) -> String {
    value
        .downcast_ref::<I>()
        .map(|v| format!("{v:?}"))
        .unwrap_or_else(|| String::from("<opaque>"))
}

impl PartialEq for FetchId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && (self.eq_fn)(self.value.as_ref(), other.value.as_ref())
    }
}

impl Eq for FetchId {}

impl Hash for FetchId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
