//! DataSource trait definition.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use async_trait::async_trait;

use crate::error::SourceResult;
use crate::identity::Identity;

/// How a source wants oversized batches executed once split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchExecution {
    /// Split chunks run concurrently within the same round.
    #[default]
    Parallel,
    /// Split chunks run one after another, each recorded as its own round.
    Sequential,
}

/// A backend that resolves identities to values.
///
/// # Contract
///
/// `batch` must be observationally equivalent to calling `fetch` once
/// per identity and collecting the non-empty results; the difference is
/// efficiency and atomicity only. The returned map must not contain
/// identities that were not requested — extra keys are a contract
/// violation and are dropped by the runtime.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Key identifying one record in this source.
    type Identity: Identity;
    /// Value this source resolves identities to.
    type Value: Clone + Send + Sync + 'static;

    /// Stable name identifying this source. Cache keys and request
    /// grouping are keyed by it; uniqueness across sources is the
    /// caller's obligation.
    fn name(&self) -> &str;

    /// Fetches a single identity. A miss yields `Ok(None)`.
    async fn fetch(&self, id: &Self::Identity) -> SourceResult<Option<Self::Value>>;

    /// Fetches a set of identities in one call. Missing identities are
    /// omitted from the result.
    ///
    /// The default implementation falls back to per-identity `fetch`.
    async fn batch(
        &self,
        ids: &[Self::Identity],
    ) -> SourceResult<HashMap<Self::Identity, Self::Value>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = self.fetch(id).await? {
                out.insert(id.clone(), value);
            }
        }
        Ok(out)
    }

    /// Upper bound on identities per `batch` call. `None` means unlimited.
    fn max_batch_size(&self) -> Option<NonZeroUsize> {
        None
    }

    /// Execution policy for the chunks produced when an oversized batch
    /// is split.
    fn batch_execution(&self) -> BatchExecution {
        BatchExecution::Parallel
    }
}
