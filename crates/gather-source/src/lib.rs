//! gather-source: data-source and cache contracts
//!
//! This crate contains the backend-facing half of gather:
//! - The [`DataSource`] trait every backend implements
//! - The [`DataCache`] trait plus the built-in in-memory and forgetful caches
//! - Identity erasure ([`FetchId`]) so heterogeneous sources can share rounds
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               gather-source                  │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataSource contract          │
//! │  erased.rs   - Object-safe source adapter   │
//! │  identity.rs - Erased identities & values   │
//! │  cache.rs    - Cache contract & impls       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod erased;
pub mod error;
pub mod identity;
pub mod traits;

// Re-export commonly used types at the crate root
pub use cache::{CacheKey, DataCache, DynCache, ForgetfulCache, InMemoryCache};
pub use erased::{DynSource, ErasedDataSource, ErasedSource};
pub use error::{SourceError, SourceResult};
pub use identity::{BoxedValue, FetchId, Identity};
pub use traits::{BatchExecution, DataSource};
