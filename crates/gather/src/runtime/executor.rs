//! Round interpreter: reduce, plan, dispatch, substitute.
//!
//! Execution alternates two phases until the tree is a value. The
//! synchronous phase ([`advance`]) applies every transform whose input
//! is available and stops at the first layer of unresolved fetches. The
//! asynchronous phase ([`run_cycle`]) plans those fetches with the
//! coalescing and chunking passes, satisfies them from the cache and
//! the sources, commits a round per dispatched request, and substitutes
//! the values back into the tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use gather_source::{BoxedValue, CacheKey, FetchId, SourceError};

use crate::error::{GatherError, GatherResult};
use crate::plan::{chunk, coalesce, SourceGroup};
use crate::program::node::Node;
use crate::request::{FetchMany, FetchOne, Request};
use crate::runtime::env::{Environment, Round};

/// Outcome of structural reduction: a value, or a tree blocked on at
/// least one fetch.
enum Step {
    Done(BoxedValue),
    Blocked(Node),
}

impl Step {
    fn into_node(self) -> Node {
        match self {
            Step::Done(value) => Node::Pure(value),
            Step::Blocked(node) => node,
        }
    }
}

/// Runs a program to completion against the given environment.
pub(crate) async fn execute(mut node: Node, env: &mut Environment) -> GatherResult<BoxedValue> {
    loop {
        match advance(node, env)? {
            Step::Done(value) => return Ok(value),
            Step::Blocked(blocked) => node = run_cycle(blocked, env).await?,
        }
    }
}

/// Structural reduction without I/O.
///
/// Applies transforms whose inputs are available, collapses resolved
/// joins, and expands `Then` continuations. A lifted failure surfaces
/// here, before any further round is dispatched.
fn advance(node: Node, env: &Environment) -> GatherResult<Step> {
    match node {
        Node::Pure(value) => Ok(Step::Done(value)),
        Node::Fail(cause) => Err(GatherError::Unhandled {
            env: env.clone(),
            cause,
        }),
        fetch @ Node::Fetch { .. } => Ok(Step::Blocked(fetch)),
        Node::Map { inner, apply } => match advance(*inner, env)? {
            Step::Done(value) => Ok(Step::Done(apply(value)?)),
            Step::Blocked(inner) => Ok(Step::Blocked(Node::Map {
                inner: Box::new(inner),
                apply,
            })),
        },
        Node::Then { inner, bind } => match advance(*inner, env)? {
            Step::Done(value) => advance(bind(value)?, env),
            Step::Blocked(inner) => Ok(Step::Blocked(Node::Then {
                inner: Box::new(inner),
                bind,
            })),
        },
        Node::Join { left, right } => {
            let left = advance(*left, env)?;
            let right = advance(*right, env)?;
            match (left, right) {
                (Step::Done(left), Step::Done(right)) => {
                    Ok(Step::Done(Arc::new((left, right)) as BoxedValue))
                }
                (left, right) => Ok(Step::Blocked(Node::Join {
                    left: Box::new(left.into_node()),
                    right: Box::new(right.into_node()),
                })),
            }
        }
    }
}

/// One round cycle: plan the blocked tree, satisfy it from the cache
/// and the sources, and substitute the resolved values back in.
async fn run_cycle(node: Node, env: &mut Environment) -> GatherResult<Node> {
    let groups = coalesce(&node);
    debug_assert!(!groups.is_empty(), "blocked tree with no reachable fetch");

    // Cache partition: resolved identities come for free; only the
    // missing ones form this cycle's requests. A fully cached cycle
    // records no round at all.
    let mut resolved: HashMap<CacheKey, BoxedValue> = HashMap::new();
    let mut missing: Vec<SourceGroup> = Vec::new();
    for group in groups {
        let SourceGroup { source, ids } = group;
        let mut missing_ids = Vec::with_capacity(ids.len());
        for id in ids {
            let key = CacheKey::new(source.name(), id.clone());
            match env.cache().lookup(&key).await {
                Some(value) => {
                    resolved.insert(key, value);
                }
                None => missing_ids.push(id),
            }
        }
        if !missing_ids.is_empty() {
            missing.push(SourceGroup {
                source,
                ids: missing_ids,
            });
        }
    }

    for request in chunk(missing) {
        let started = Instant::now();
        let response = dispatch(&request, env).await?;
        let ended = Instant::now();

        debug!(
            request = ?request,
            fetched = response.len(),
            duration_millis = (ended - started).as_secs_f64() * 1_000.0,
            "round completed"
        );
        metrics::counter!("gather_rounds_total").increment(1);

        for (key, value) in &response {
            env.cache().insert(key.clone(), value.clone()).await;
        }
        env.record(Round::new(
            Arc::clone(env.cache()),
            request,
            response.clone(),
            started,
            ended,
        ));
        resolved.extend(response);
    }

    Ok(substitute(node, &resolved))
}

/// A batch that did not fully resolve.
enum BatchFailure {
    /// Requested identities the source's response omitted.
    Missing {
        source_name: String,
        ids: Vec<FetchId>,
    },
    /// The source itself raised.
    Source { error: SourceError },
}

impl BatchFailure {
    fn into_error(self, env: &Environment) -> GatherError {
        match self {
            BatchFailure::Missing { source_name, ids } => GatherError::MissingIdentities {
                env: env.clone(),
                missing: HashMap::from([(source_name, ids)]),
            },
            BatchFailure::Source { error } => GatherError::Unhandled {
                env: env.clone(),
                cause: anyhow::Error::new(error),
            },
        }
    }
}

/// Sends one request to its sources and collects the raw response.
/// Failures carry the environment as of before this round committed.
async fn dispatch(
    request: &Request,
    env: &Environment,
) -> GatherResult<HashMap<CacheKey, BoxedValue>> {
    match request {
        Request::One(one) => dispatch_one(one, env).await,
        Request::Many(many) => run_batch(many).await.map_err(|f| f.into_error(env)),
        Request::Concurrent(batches) => {
            let mut in_flight: FuturesUnordered<_> = batches.iter().map(run_batch).collect();
            let mut response = HashMap::new();
            let mut failures: Vec<BatchFailure> = Vec::new();

            // Drain every batch before surfacing a failure, so sibling
            // fetches are never abandoned mid-flight.
            while let Some(outcome) = in_flight.next().await {
                match outcome {
                    Ok(batch_response) => response.extend(batch_response),
                    Err(failure) => failures.push(failure),
                }
            }

            if failures.is_empty() {
                return Ok(response);
            }
            // The first failure in completion order decides the error
            // kind; missing identities from every batch are merged into
            // one report.
            if matches!(failures[0], BatchFailure::Source { .. }) {
                return Err(failures.remove(0).into_error(env));
            }
            let mut missing: HashMap<String, Vec<FetchId>> = HashMap::new();
            for failure in failures {
                if let BatchFailure::Missing { source_name, ids } = failure {
                    missing.entry(source_name).or_default().extend(ids);
                }
            }
            Err(GatherError::MissingIdentities {
                env: env.clone(),
                missing,
            })
        }
    }
}

/// Dispatches a standalone single fetch. A miss is `NotFound`.
async fn dispatch_one(
    one: &FetchOne,
    env: &Environment,
) -> GatherResult<HashMap<CacheKey, BoxedValue>> {
    debug!(source = one.source_name(), id = ?one.id(), "dispatching fetch");
    match one.source().fetch_erased(one.id()).await {
        Ok(Some(value)) => Ok(HashMap::from([(
            CacheKey::new(one.source_name(), one.id().clone()),
            value,
        )])),
        Ok(None) => Err(GatherError::NotFound {
            env: env.clone(),
            request: one.clone(),
        }),
        Err(error) => Err(GatherError::Unhandled {
            env: env.clone(),
            cause: anyhow::Error::new(error),
        }),
    }
}

/// Runs one batch. Single-identity batches preserve the `fetch` path;
/// larger ones go through `batch`.
async fn run_batch(batch: &FetchMany) -> Result<HashMap<CacheKey, BoxedValue>, BatchFailure> {
    let source = batch.source();
    let ids = batch.ids();
    debug!(source = source.name(), identities = ids.len(), "dispatching batch");

    let response = if let [id] = ids {
        match source.fetch_erased(id).await {
            Ok(Some(value)) => HashMap::from([(id.clone(), value)]),
            Ok(None) => HashMap::new(),
            Err(error) => return Err(BatchFailure::Source { error }),
        }
    } else {
        match source.batch_erased(ids).await {
            Ok(response) => response,
            Err(error) => return Err(BatchFailure::Source { error }),
        }
    };

    let absent: Vec<FetchId> = ids
        .iter()
        .filter(|id| !response.contains_key(*id))
        .cloned()
        .collect();
    if !absent.is_empty() {
        return Err(BatchFailure::Missing {
            source_name: source.name().to_string(),
            ids: absent,
        });
    }

    Ok(response
        .into_iter()
        .map(|(id, value)| (CacheKey::new(source.name(), id), value))
        .collect())
}

/// Replaces satisfied fetch leaves with their values. `Then`
/// continuations are untouched; their fetches belong to later cycles.
fn substitute(node: Node, resolved: &HashMap<CacheKey, BoxedValue>) -> Node {
    match node {
        Node::Fetch { source, id } => {
            let key = CacheKey::new(source.name(), id.clone());
            match resolved.get(&key) {
                Some(value) => Node::Pure(value.clone()),
                None => Node::Fetch { source, id },
            }
        }
        Node::Map { inner, apply } => Node::Map {
            inner: Box::new(substitute(*inner, resolved)),
            apply,
        },
        Node::Then { inner, bind } => Node::Then {
            inner: Box::new(substitute(*inner, resolved)),
            bind,
        },
        Node::Join { left, right } => Node::Join {
            left: Box::new(substitute(*left, resolved)),
            right: Box::new(substitute(*right, resolved)),
        },
        leaf @ (Node::Pure(_) | Node::Fail(_)) => leaf,
    }
}
