//! Erased program tree.
//!
//! [`crate::Query`] is a typed facade; the tree underneath erases value
//! types so the planner and the interpreter can rewrite it without
//! generics. Transform functions return `Result` so a downcast mismatch
//! surfaces as [`crate::GatherError::Internal`] instead of panicking —
//! the typed builders make such a mismatch unreachable.

use std::fmt;
use std::sync::Arc;

use gather_source::{BoxedValue, DynSource, FetchId};

/// Applied once the inner value is available.
pub(crate) type MapFn = Box<dyn FnOnce(BoxedValue) -> Result<BoxedValue, ValueTypeError> + Send>;

/// Continuation expanded once the inner value is available.
pub(crate) type BindFn = Box<dyn FnOnce(BoxedValue) -> Result<Node, ValueTypeError> + Send>;

/// Downcast mismatch inside the erasure layer.
#[derive(Debug)]
pub(crate) struct ValueTypeError {
    pub expected: &'static str,
}

/// Tagged program tree.
pub(crate) enum Node {
    /// A known value.
    Pure(BoxedValue),
    /// User-lifted failure.
    Fail(anyhow::Error),
    /// One identity from one source.
    Fetch { source: DynSource, id: FetchId },
    /// Value transformation.
    Map { inner: Box<Node>, apply: MapFn },
    /// Sequential dependency: the continuation sees the inner value, so
    /// its fetches cannot join the inner tree's rounds.
    Then { inner: Box<Node>, bind: BindFn },
    /// Independent pair; reduces to an `Arc<(BoxedValue, BoxedValue)>`.
    Join { left: Box<Node>, right: Box<Node> },
}

impl Node {
    pub(crate) fn pure<A: Send + Sync + 'static>(value: A) -> Node {
        Node::Pure(Arc::new(value))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Pure(_) => f.write_str("Pure"),
            Node::Fail(cause) => write!(f, "Fail({cause})"),
            Node::Fetch { source, id } => {
                write!(f, "Fetch({}, {id:?})", source.name())
            }
            Node::Map { inner, .. } => f.debug_tuple("Map").field(inner).finish(),
            Node::Then { inner, .. } => f.debug_tuple("Then").field(inner).finish(),
            Node::Join { left, right } => {
                f.debug_tuple("Join").field(left).field(right).finish()
            }
        }
    }
}

/// Recovers a typed value from a boxed one, cloning only when the value
/// is still shared (cached values usually are).
pub(crate) fn unbox<A: Clone + Send + Sync + 'static>(
    value: BoxedValue,
) -> Result<A, ValueTypeError> {
    match value.downcast::<A>() {
        Ok(arc) => Ok(Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())),
        Err(_) => Err(ValueTypeError {
            expected: std::any::type_name::<A>(),
        }),
    }
}
