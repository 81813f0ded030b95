//! Round log and environment.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use gather_source::{BoxedValue, CacheKey, DynCache};

use crate::request::Request;

/// Record of one wave of source invocations.
///
/// A `Concurrent` request produces a single round however many batches
/// it dispatched; the request keeps the per-batch structure so
/// sub-fetches stay attributable.
#[derive(Clone)]
pub struct Round {
    cache: DynCache,
    request: Request,
    response: HashMap<CacheKey, BoxedValue>,
    started: Instant,
    ended: Instant,
}

impl Round {
    pub(crate) fn new(
        cache: DynCache,
        request: Request,
        response: HashMap<CacheKey, BoxedValue>,
        started: Instant,
        ended: Instant,
    ) -> Self {
        Self {
            cache,
            request,
            response,
            started,
            ended,
        }
    }

    /// The request this round dispatched.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Raw response map keyed by `(source-name, identity)`.
    pub fn response(&self) -> &HashMap<CacheKey, BoxedValue> {
        &self.response
    }

    /// Number of values the sources returned.
    pub fn response_len(&self) -> usize {
        self.response.len()
    }

    /// Cache handle that was in effect when the round ran.
    pub fn cache(&self) -> &DynCache {
        &self.cache
    }

    /// Monotonic dispatch timestamp.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Monotonic completion timestamp.
    pub fn ended(&self) -> Instant {
        self.ended
    }

    /// Wall-clock time the round was in flight.
    pub fn duration(&self) -> Duration {
        self.ended.duration_since(self.started)
    }

    /// Wall-clock time the round was in flight, in milliseconds.
    pub fn duration_millis(&self) -> f64 {
        self.duration().as_secs_f64() * 1_000.0
    }
}

impl fmt::Debug for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Round")
            .field("request", &self.request)
            .field("response_len", &self.response.len())
            .field("duration_millis", &self.duration_millis())
            .finish()
    }
}

/// Accumulated rounds plus the cache in effect. Rounds only append;
/// recorded rounds are never mutated.
#[derive(Clone)]
pub struct Environment {
    rounds: Vec<Round>,
    cache: DynCache,
}

impl Environment {
    pub(crate) fn new(cache: DynCache) -> Self {
        Self {
            rounds: Vec::new(),
            cache,
        }
    }

    /// Rounds recorded so far, in execution order.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The current cache handle.
    pub fn cache(&self) -> &DynCache {
        &self.cache
    }

    /// Consumes the environment into its round log.
    pub fn into_rounds(self) -> Vec<Round> {
        self.rounds
    }

    pub(crate) fn record(&mut self, round: Round) {
        self.rounds.push(round);
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("rounds", &self.rounds)
            .finish()
    }
}
