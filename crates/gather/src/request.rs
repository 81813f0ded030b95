//! Request types consumed by a round.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use gather_source::{DynSource, FetchId};

/// Error returned when constructing a request from no identities.
#[derive(Debug, Error)]
#[error("a request needs at least one identity")]
pub struct EmptyRequest;

/// A single-identity request against one source.
#[derive(Clone)]
pub struct FetchOne {
    source: DynSource,
    id: FetchId,
}

impl FetchOne {
    pub(crate) fn new(source: DynSource, id: FetchId) -> Self {
        Self { source, id }
    }

    /// Name of the source this request targets.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The requested identity.
    pub fn id(&self) -> &FetchId {
        &self.id
    }

    pub(crate) fn source(&self) -> &DynSource {
        &self.source
    }
}

impl fmt::Debug for FetchOne {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOne")
            .field("source", &self.source.name())
            .field("id", &self.id)
            .finish()
    }
}

/// A multi-identity request against one source.
///
/// Identities are deduplicated at construction and keep their first-seen
/// order, which also fixes the order chunks are split in.
#[derive(Clone)]
pub struct FetchMany {
    source: DynSource,
    ids: Vec<FetchId>,
}

impl FetchMany {
    /// Builds a request from an identity sequence, dropping duplicates.
    pub fn new(
        source: DynSource,
        ids: impl IntoIterator<Item = FetchId>,
    ) -> Result<Self, EmptyRequest> {
        let mut seen = HashSet::new();
        let ids: Vec<FetchId> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if ids.is_empty() {
            return Err(EmptyRequest);
        }
        Ok(Self { source, ids })
    }

    /// Builds a request from identities already deduplicated by the
    /// planner.
    pub(crate) fn from_parts(source: DynSource, ids: Vec<FetchId>) -> Self {
        debug_assert!(!ids.is_empty(), "planner produced an empty batch");
        Self { source, ids }
    }

    /// Name of the source this request targets.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The requested identities, in first-seen order.
    pub fn ids(&self) -> &[FetchId] {
        &self.ids
    }

    /// Number of identities carried.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn source(&self) -> &DynSource {
        &self.source
    }

    pub(crate) fn into_parts(self) -> (DynSource, Vec<FetchId>) {
        (self.source, self.ids)
    }
}

impl fmt::Debug for FetchMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchMany")
            .field("source", &self.source.name())
            .field("ids", &self.ids)
            .finish()
    }
}

/// The unit a round executes.
#[derive(Debug, Clone)]
pub enum Request {
    /// One identity from one source, dispatched via `fetch`.
    One(FetchOne),
    /// Several identities from one source, dispatched via `batch`.
    Many(FetchMany),
    /// Batches dispatched concurrently, ordered by source name (chunks
    /// split from one oversized batch stay adjacent). The round
    /// completes when every batch has completed.
    Concurrent(Vec<FetchMany>),
}

impl Request {
    /// Total number of identities carried.
    pub fn identity_count(&self) -> usize {
        match self {
            Request::One(_) => 1,
            Request::Many(many) => many.len(),
            Request::Concurrent(batches) => batches.iter().map(FetchMany::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tests::mocks::MockSource;
    use gather_source::ErasedDataSource;

    fn source() -> DynSource {
        ErasedDataSource::shared(MockSource::<u32, String>::new("users").shared())
    }

    #[test]
    fn test_fetch_many_rejects_empty_identity_sets() {
        assert!(FetchMany::new(source(), []).is_err());
    }

    #[test]
    fn test_fetch_many_dedups_preserving_first_seen_order() {
        let many = FetchMany::new(
            source(),
            [3u32, 1, 3, 2, 1].into_iter().map(FetchId::new),
        )
        .unwrap();

        let expected: Vec<FetchId> = [3u32, 1, 2].into_iter().map(FetchId::new).collect();
        assert_eq!(many.ids(), expected.as_slice());
    }

    #[test]
    fn test_identity_count_sums_concurrent_batches() {
        let a = FetchMany::new(source(), [1u32, 2].into_iter().map(FetchId::new)).unwrap();
        let b = FetchMany::new(source(), [3u32].into_iter().map(FetchId::new)).unwrap();

        let request = Request::Concurrent(vec![a, b]);
        assert_eq!(request.identity_count(), 3);
    }
}
