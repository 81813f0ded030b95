//! Runtime error types.

use std::collections::HashMap;

use thiserror::Error;

use gather_source::FetchId;

use crate::program::node::ValueTypeError;
use crate::request::FetchOne;
use crate::runtime::Environment;

/// Failures surfaced by [`crate::Runtime::run`] and friends.
///
/// Every variant except `Internal` carries the environment at the point
/// of failure, so callers can inspect the cache and the rounds that
/// already committed.
#[derive(Debug, Error)]
pub enum GatherError {
    /// A standalone single fetch returned no value.
    #[error("identity {} not found in source '{}'", .request.id().render(), .request.source_name())]
    NotFound {
        /// Environment at the point of failure.
        env: Environment,
        /// The request whose identity the source did not resolve.
        request: FetchOne,
    },

    /// A batch or concurrent round resolved fewer identities than
    /// requested.
    #[error("missing identities: {}", format_missing(.missing))]
    MissingIdentities {
        /// Environment at the point of failure.
        env: Environment,
        /// Unresolved identities, grouped by source name.
        missing: HashMap<String, Vec<FetchId>>,
    },

    /// A source raised, or the program lifted an error with
    /// [`crate::Query::fail`].
    #[error("unhandled error: {cause}")]
    Unhandled {
        /// Environment at the point of failure.
        env: Environment,
        /// The underlying cause.
        cause: anyhow::Error,
    },

    /// Invariant violation inside the erasure layer.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatherError {
    /// The environment at the point of failure, when the variant
    /// carries one.
    pub fn env(&self) -> Option<&Environment> {
        match self {
            GatherError::NotFound { env, .. }
            | GatherError::MissingIdentities { env, .. }
            | GatherError::Unhandled { env, .. } => Some(env),
            GatherError::Internal { .. } => None,
        }
    }
}

impl From<ValueTypeError> for GatherError {
    fn from(err: ValueTypeError) -> Self {
        GatherError::Internal {
            message: format!("value type mismatch: expected {}", err.expected),
        }
    }
}

/// Result type for runtime operations.
pub type GatherResult<T> = Result<T, GatherError>;

/// Stable rendering of a missing-identity map for error messages.
fn format_missing(missing: &HashMap<String, Vec<FetchId>>) -> String {
    let mut sources: Vec<&String> = missing.keys().collect();
    sources.sort();
    sources
        .into_iter()
        .map(|source| {
            let ids = missing[source]
                .iter()
                .map(FetchId::render)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{source} -> [{ids}]")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_missing_orders_sources_by_name() {
        let missing = HashMap::from([
            ("zeta".to_string(), vec![FetchId::new(3u32)]),
            ("alpha".to_string(), vec![FetchId::new(1u32), FetchId::new(2u32)]),
        ]);

        assert_eq!(format_missing(&missing), "alpha -> [1, 2]; zeta -> [3]");
    }
}
