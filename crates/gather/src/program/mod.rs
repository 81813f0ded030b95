//! Program algebra: building blocks for fetch computations.
//!
//! A [`Query`] is an inert description of data to retrieve; nothing is
//! fetched until it is handed to [`crate::Runtime::run`]. The shape of
//! the description is what the optimizer works with: parts combined
//! with [`Query::join`] (or [`join_all`] / [`traverse`]) are
//! independent and may share rounds, while [`Query::and_then`] declares
//! a data dependency that forces a later round.

pub(crate) mod node;

#[cfg(test)]
mod proptests;

use std::marker::PhantomData;
use std::sync::Arc;

use gather_source::{BoxedValue, DataSource, ErasedDataSource, FetchId};

use crate::program::node::{unbox, BindFn, MapFn, Node};

/// A declarative fetch computation producing `A`.
#[must_use = "queries describe work; run them with Runtime::run"]
pub struct Query<A> {
    node: Node,
    _out: PhantomData<fn() -> A>,
}

impl<A> Query<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Lifts a known value. Contributes no round.
    pub fn pure(value: A) -> Self {
        Self::from_node(Node::pure(value))
    }

    /// Lifts a failure. The run fails with
    /// [`crate::GatherError::Unhandled`] when the value is needed.
    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        Self::from_node(Node::Fail(error.into()))
    }

    /// Fetches one identity from a source.
    pub fn fetch<S>(source: &Arc<S>, id: S::Identity) -> Query<A>
    where
        S: DataSource<Value = A>,
    {
        Query::from_node(Node::Fetch {
            source: ErasedDataSource::shared(Arc::clone(source)),
            id: FetchId::new(id),
        })
    }

    /// Transforms the result.
    pub fn map<B, F>(self, f: F) -> Query<B>
    where
        B: Clone + Send + Sync + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        let apply: MapFn = Box::new(move |value| Ok(Arc::new(f(unbox::<A>(value)?)) as BoxedValue));
        Query::from_node(Node::Map {
            inner: Box::new(self.node),
            apply,
        })
    }

    /// Sequences a dependent computation: `k` sees the result and
    /// decides what to fetch next. Fetches inside `k` run in a later
    /// round than `self`'s.
    pub fn and_then<B, F>(self, k: F) -> Query<B>
    where
        B: Clone + Send + Sync + 'static,
        F: FnOnce(A) -> Query<B> + Send + 'static,
    {
        let bind: BindFn = Box::new(move |value| Ok(k(unbox::<A>(value)?).node));
        Query::from_node(Node::Then {
            inner: Box::new(self.node),
            bind,
        })
    }

    /// Pairs two independent computations. Their fetches coalesce into
    /// the same rounds wherever possible.
    pub fn join<B>(self, other: Query<B>) -> Query<(A, B)>
    where
        B: Clone + Send + Sync + 'static,
    {
        let joined = Node::Join {
            left: Box::new(self.node),
            right: Box::new(other.node),
        };
        let apply: MapFn = Box::new(|value| {
            let (left, right) = unbox::<(BoxedValue, BoxedValue)>(value)?;
            Ok(Arc::new((unbox::<A>(left)?, unbox::<B>(right)?)) as BoxedValue)
        });
        Query::from_node(Node::Map {
            inner: Box::new(joined),
            apply,
        })
    }

    pub(crate) fn from_node(node: Node) -> Self {
        Self {
            node,
            _out: PhantomData,
        }
    }

    pub(crate) fn into_node(self) -> Node {
        self.node
    }
}

/// Triple of independent computations.
pub fn join3<A, B, C>(a: Query<A>, b: Query<B>, c: Query<C>) -> Query<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    a.join(b).join(c).map(|((a, b), c)| (a, b, c))
}

/// Quadruple of independent computations.
pub fn join4<A, B, C, D>(
    a: Query<A>,
    b: Query<B>,
    c: Query<C>,
    d: Query<D>,
) -> Query<(A, B, C, D)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    a.join(b).join(c).join(d).map(|(((a, b), c), d)| (a, b, c, d))
}

/// Combines independent computations into one producing all results in
/// order. The runtime batches their fetches into the same rounds.
pub fn join_all<A>(queries: impl IntoIterator<Item = Query<A>>) -> Query<Vec<A>>
where
    A: Clone + Send + Sync + 'static,
{
    let queries: Vec<Query<A>> = queries.into_iter().collect();
    join_balanced(queries)
}

/// Maps each item to a query and combines the results in input order.
pub fn traverse<T, A, F>(items: impl IntoIterator<Item = T>, f: F) -> Query<Vec<A>>
where
    A: Clone + Send + Sync + 'static,
    F: FnMut(T) -> Query<A>,
{
    join_all(items.into_iter().map(f))
}

/// Balanced join tree: keeps reduction depth logarithmic in the number
/// of queries, so long sequences do not build deep recursion.
fn join_balanced<A>(mut queries: Vec<Query<A>>) -> Query<Vec<A>>
where
    A: Clone + Send + Sync + 'static,
{
    match queries.len() {
        0 => Query::pure(Vec::new()),
        1 => queries.remove(0).map(|value| vec![value]),
        len => {
            let right = join_balanced(queries.split_off(len / 2));
            let left = join_balanced(queries);
            left.join(right).map(|(mut left, mut right)| {
                left.append(&mut right);
                left
            })
        }
    }
}
