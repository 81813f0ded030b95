//! Object-safe bridge from typed sources into the request plumbing.
//!
//! Rounds mix requests against sources with unrelated identity and
//! value types, so the runtime talks to sources through [`ErasedSource`]
//! trait objects. [`ErasedDataSource`] adapts any typed [`DataSource`]
//! by downcasting identities on the way in and boxing values on the way
//! out; responses are re-associated with the exact [`FetchId`]s that
//! were requested.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{SourceError, SourceResult};
use crate::identity::{BoxedValue, FetchId};
use crate::traits::{BatchExecution, DataSource};

/// Type-erased data source handle used by rounds and the planner.
#[async_trait]
pub trait ErasedSource: Send + Sync + 'static {
    /// The wrapped source's stable name.
    fn name(&self) -> &str;

    /// The wrapped source's batch bound.
    fn max_batch_size(&self) -> Option<NonZeroUsize>;

    /// The wrapped source's chunk execution policy.
    fn batch_execution(&self) -> BatchExecution;

    /// Single fetch over an erased identity.
    async fn fetch_erased(&self, id: &FetchId) -> SourceResult<Option<BoxedValue>>;

    /// Batch fetch over erased identities.
    async fn batch_erased(&self, ids: &[FetchId]) -> SourceResult<HashMap<FetchId, BoxedValue>>;
}

/// Shared erased source handle.
pub type DynSource = Arc<dyn ErasedSource>;

/// Adapter implementing [`ErasedSource`] for any typed [`DataSource`].
pub struct ErasedDataSource<S> {
    inner: Arc<S>,
}

impl<S: DataSource> ErasedDataSource<S> {
    /// Wraps a typed source.
    pub fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }

    /// Wraps a typed source into a shared erased handle.
    pub fn shared(inner: Arc<S>) -> DynSource {
        Arc::new(Self::new(inner))
    }

    fn typed_id<'a>(&self, id: &'a FetchId) -> SourceResult<&'a S::Identity> {
        id.downcast_ref::<S::Identity>()
            .ok_or_else(|| SourceError::IdentityType {
                source_name: self.inner.name().to_string(),
            })
    }
}

#[async_trait]
impl<S: DataSource> ErasedSource for ErasedDataSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn max_batch_size(&self) -> Option<NonZeroUsize> {
        self.inner.max_batch_size()
    }

    fn batch_execution(&self) -> BatchExecution {
        self.inner.batch_execution()
    }

    async fn fetch_erased(&self, id: &FetchId) -> SourceResult<Option<BoxedValue>> {
        let id = self.typed_id(id)?;
        let value = self.inner.fetch(id).await?;
        Ok(value.map(|v| Arc::new(v) as BoxedValue))
    }

    async fn batch_erased(&self, ids: &[FetchId]) -> SourceResult<HashMap<FetchId, BoxedValue>> {
        let mut typed = Vec::with_capacity(ids.len());
        let mut requested: HashMap<S::Identity, FetchId> = HashMap::with_capacity(ids.len());
        for id in ids {
            let typed_id = self.typed_id(id)?.clone();
            typed.push(typed_id.clone());
            requested.insert(typed_id, id.clone());
        }

        let response = self.inner.batch(&typed).await?;

        let mut out = HashMap::with_capacity(response.len());
        for (id, value) in response {
            match requested.get(&id) {
                Some(fetch_id) => {
                    out.insert(fetch_id.clone(), Arc::new(value) as BoxedValue);
                }
                None => {
                    // Contract violation: the batch returned an identity
                    // nobody asked for. Dropping it keeps the response
                    // map aligned with the request.
                    warn!(
                        source = self.inner.name(),
                        identity = ?id,
                        "batch returned an identity that was not requested"
                    );
                }
            }
        }
        Ok(out)
    }
}
