//! gather: declarative batched data access
//!
//! Describe *what* data a computation needs with [`Query`]; the runtime
//! decides *how* to retrieve it with the fewest possible round-trips:
//! - Independent fetches declared with [`Query::join`] / [`join_all`]
//!   coalesce into the same round
//! - Identities are deduplicated and batched per source
//! - Batches against distinct sources run in parallel
//! - Fetched values are cached, within a run and across runs when the
//!   caller shares a cache
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   gather                     │
//! ├─────────────────────────────────────────────┤
//! │  program/  - Query algebra (program tree)   │
//! │  plan.rs   - Coalescing & batch splitting   │
//! │  request.rs- Round request types            │
//! │  runtime/  - Round interpreter & entry pts  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gather::{join_all, Query, Runtime};
//!
//! let users: Arc<UserSource> = Arc::new(UserSource::connect(pool));
//!
//! // Three independent fetches become one batch call.
//! let query = join_all((1..=3).map(|id| Query::fetch(&users, id)));
//! let names = Runtime::new().run(query).await?;
//! ```

mod plan;

pub mod error;
pub mod program;
pub mod request;
pub mod runtime;

pub use error::{GatherError, GatherResult};
pub use program::{join3, join4, join_all, traverse, Query};
pub use request::{FetchMany, FetchOne, Request};
pub use runtime::{run, run_all, run_log, Environment, Round, Runtime};

// Re-export the source-facing contracts so one import serves both
// halves of the library.
pub use gather_source::{
    BatchExecution, BoxedValue, CacheKey, DataCache, DataSource, DynCache, FetchId,
    ForgetfulCache, Identity, InMemoryCache, SourceError, SourceResult,
};
