//! Round planning: parallel-join coalescing and batch-size splitting.
//!
//! Both passes are pure functions. [`coalesce`] extracts the initial
//! request set of a blocked tree and merges it per source; [`chunk`]
//! lays the merged set out as waves that respect each source's declared
//! batch bound. The interpreter applies them at the start of every
//! round cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gather_source::{BatchExecution, DynSource, FetchId};

use crate::program::node::Node;
use crate::request::{FetchMany, FetchOne, Request};

/// Identities one source must resolve in the current cycle,
/// deduplicated and in first-seen order.
pub(crate) struct SourceGroup {
    pub source: DynSource,
    pub ids: Vec<FetchId>,
}

struct GroupBuilder {
    source: DynSource,
    ids: Vec<FetchId>,
    seen: HashSet<FetchId>,
}

/// Extracts the initial request set of a blocked tree.
///
/// Descends through `Map`, `Join`, and the inner side of `Then`; never
/// into a `Then` continuation, whose fetches depend on a value that
/// does not exist yet. `Pure` and `Fail` contribute nothing. Groups are
/// ordered lexicographically by source name; identities within a group
/// keep the order the tree mentions them in, left to right.
pub(crate) fn coalesce(node: &Node) -> Vec<SourceGroup> {
    let mut groups: HashMap<String, GroupBuilder> = HashMap::new();
    let mut pending = vec![node];

    while let Some(current) = pending.pop() {
        match current {
            Node::Fetch { source, id } => {
                let group = groups
                    .entry(source.name().to_string())
                    .or_insert_with(|| GroupBuilder {
                        source: Arc::clone(source),
                        ids: Vec::new(),
                        seen: HashSet::new(),
                    });
                if group.seen.insert(id.clone()) {
                    group.ids.push(id.clone());
                }
            }
            Node::Map { inner, .. } | Node::Then { inner, .. } => pending.push(inner),
            Node::Join { left, right } => {
                // LIFO stack: push right first so left is visited first.
                pending.push(right);
                pending.push(left);
            }
            Node::Pure(_) | Node::Fail(_) => {}
        }
    }

    let mut result: Vec<SourceGroup> = groups
        .into_values()
        .map(|builder| SourceGroup {
            source: builder.source,
            ids: builder.ids,
        })
        .collect();
    result.sort_by(|a, b| a.source.name().cmp(b.source.name()));
    result
}

/// Splits groups that exceed their source's batch bound and lays the
/// cycle out as requests to execute in order: one parallel wave first,
/// then the sequential sources' chunks as dedicated rounds.
pub(crate) fn chunk(groups: Vec<SourceGroup>) -> Vec<Request> {
    let mut wave: Vec<FetchMany> = Vec::new();
    let mut follow_ups: Vec<FetchMany> = Vec::new();

    for group in groups {
        let SourceGroup { source, ids } = group;
        let limit = source
            .max_batch_size()
            .map(|n| n.get())
            .unwrap_or(usize::MAX);
        if ids.len() <= limit {
            wave.push(FetchMany::from_parts(source, ids));
            continue;
        }
        let chunks = ids
            .chunks(limit)
            .map(|chunk| FetchMany::from_parts(Arc::clone(&source), chunk.to_vec()));
        match source.batch_execution() {
            BatchExecution::Parallel => wave.extend(chunks),
            BatchExecution::Sequential => follow_ups.extend(chunks),
        }
    }

    let mut requests = Vec::with_capacity(1 + follow_ups.len());
    if wave.len() > 1 {
        requests.push(Request::Concurrent(wave));
    } else if let Some(batch) = wave.pop() {
        requests.push(simplify(batch));
    }
    requests.extend(follow_ups.into_iter().map(Request::Many));
    requests
}

/// A lone single-identity batch is a plain single fetch.
fn simplify(batch: FetchMany) -> Request {
    if batch.len() == 1 {
        let (source, mut ids) = batch.into_parts();
        let id = ids.pop().expect("from_parts guarantees one identity");
        Request::One(FetchOne::new(source, id))
    } else {
        Request::Many(batch)
    }
}
