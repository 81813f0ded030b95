//! Execution runtime: entry points over programs.

mod env;
mod executor;

#[cfg(test)]
pub(crate) mod tests;

pub use env::{Environment, Round};

use std::sync::Arc;

use tracing::instrument;

use gather_source::{DynCache, InMemoryCache};

use crate::error::GatherResult;
use crate::program::node::unbox;
use crate::program::Query;

/// Executes queries against a cache.
///
/// A fresh runtime starts with an empty [`InMemoryCache`]; hand it a
/// shared cache with [`Runtime::with_cache`] to reuse results across
/// runs.
pub struct Runtime {
    cache: DynCache,
}

impl Runtime {
    /// Creates a runtime with a fresh in-memory cache.
    pub fn new() -> Self {
        Self {
            cache: Arc::new(InMemoryCache::new()),
        }
    }

    /// Creates a runtime over a caller-provided cache.
    pub fn with_cache(cache: DynCache) -> Self {
        Self { cache }
    }

    /// Runs a query and returns its value.
    pub async fn run<A>(&self, query: Query<A>) -> GatherResult<A>
    where
        A: Clone + Send + Sync + 'static,
    {
        self.run_all(query).await.map(|(_, value)| value)
    }

    /// Runs a query and returns the recorded rounds with the value.
    pub async fn run_log<A>(&self, query: Query<A>) -> GatherResult<(Vec<Round>, A)>
    where
        A: Clone + Send + Sync + 'static,
    {
        let (env, value) = self.run_all(query).await?;
        Ok((env.into_rounds(), value))
    }

    /// Runs a query and returns the full environment with the value.
    #[instrument(skip_all)]
    pub async fn run_all<A>(&self, query: Query<A>) -> GatherResult<(Environment, A)>
    where
        A: Clone + Send + Sync + 'static,
    {
        let mut env = Environment::new(Arc::clone(&self.cache));
        let value = executor::execute(query.into_node(), &mut env).await?;
        let value = unbox::<A>(value)?;
        Ok((env, value))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a query on a fresh default runtime.
pub async fn run<A>(query: Query<A>) -> GatherResult<A>
where
    A: Clone + Send + Sync + 'static,
{
    Runtime::new().run(query).await
}

/// Runs a query on a fresh default runtime, returning the round log
/// with the value.
pub async fn run_log<A>(query: Query<A>) -> GatherResult<(Vec<Round>, A)>
where
    A: Clone + Send + Sync + 'static,
{
    Runtime::new().run_log(query).await
}

/// Runs a query on a fresh default runtime, returning the full
/// environment with the value.
pub async fn run_all<A>(query: Query<A>) -> GatherResult<(Environment, A)>
where
    A: Clone + Send + Sync + 'static,
{
    Runtime::new().run_all(query).await
}
