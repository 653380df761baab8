//! Immutable query builder over a store collection.
//!
//! A [`QueryBuilder`] is an ordered list of [`Constraint`] descriptors. Adding a
//! constraint never modifies the builder it was called on: it returns a new
//! builder that shares the accumulated prefix and holds one more descriptor.
//! Nothing reaches the store until the builder is realized.
//!
//! # Query Building
//!
//! ```ignore
//! use docbind::prelude::*;
//!
//! let active = users.query().filter("status", FilterOp::Equal, "active");
//! let page = active
//!     .order_by_direction("created_at", Direction::Descending)
//!     .limit(20);
//!
//! // `active` is still usable and unchanged.
//! let first_page = page.fetch().await?;
//! let next_page = page.start_after(last_snapshot).fetch().await?;
//! ```
//!
//! # Realization
//!
//! [`QueryBuilder::realize`] replays the descriptors, in insertion order, onto the
//! client's [`NativeQuery`]. Ordering matters to stores that check cursor and
//! order-by pairing, so it is never rearranged. Invalid combinations are not
//! rejected locally; the store reports them when the query runs.

use std::{fmt, sync::Arc};

use bson::{Bson, Document as BsonDocument};

use crate::{
    chain::Chain,
    client::{NativeQuery, StoreClient},
    document::{Document, DocumentExt},
    error::StoreResult,
    path::CollectionPath,
    snapshot::{DocumentSnapshot, QuerySnapshot},
};

/// Field comparison operators, mirroring the store's native vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// Field equals one of the listed values.
    In,
    /// Field equals none of the listed values.
    NotIn,
    /// Array field contains the value.
    ArrayContains,
    /// Array field contains at least one of the listed values.
    ArrayContainsAny,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::ArrayContainsAny => "array-contains-any",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for an order-by constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Which end of the ordered result set a limit keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitEnd {
    First,
    Last,
}

/// The four pagination cursor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    StartAt,
    StartAfter,
    EndAt,
    EndBefore,
}

/// The position a cursor refers to.
///
/// A snapshot fixes the position on its own. A value list is matched against the
/// active order-by fields, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorAnchor {
    Snapshot(DocumentSnapshot),
    Values(Vec<Bson>),
}

impl From<DocumentSnapshot> for CursorAnchor {
    fn from(snapshot: DocumentSnapshot) -> Self {
        CursorAnchor::Snapshot(snapshot)
    }
}

impl From<Vec<Bson>> for CursorAnchor {
    fn from(values: Vec<Bson>) -> Self {
        CursorAnchor::Values(values)
    }
}

impl CursorAnchor {
    /// Builds a value-list anchor from anything convertible to [`Bson`].
    pub fn values(values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        CursorAnchor::Values(values.into_iter().map(Into::into).collect())
    }
}

/// One accumulated query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Filter {
        field: String,
        op: FilterOp,
        value: Bson,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    Limit {
        count: usize,
        end: LimitEnd,
    },
    Cursor {
        kind: CursorKind,
        anchor: CursorAnchor,
    },
}

impl Constraint {
    /// Appends this descriptor to a native query.
    pub fn apply<Q: NativeQuery>(&self, query: Q) -> Q {
        match self {
            Constraint::Filter { field, op, value } => query.filter(field, *op, value.clone()),
            Constraint::OrderBy { field, direction } => query.order_by(field, *direction),
            Constraint::Limit { count, end: LimitEnd::First } => query.limit(*count),
            Constraint::Limit { count, end: LimitEnd::Last } => query.limit_to_last(*count),
            Constraint::Cursor { kind, anchor } => {
                let anchor = anchor.clone();

                match kind {
                    CursorKind::StartAt => query.start_at(anchor),
                    CursorKind::StartAfter => query.start_after(anchor),
                    CursorKind::EndAt => query.end_at(anchor),
                    CursorKind::EndBefore => query.end_before(anchor),
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct QueryBuilder<C: StoreClient> {
    client: Arc<C>,
    collection: CollectionPath,
    constraints: Chain<Constraint>,
}

impl<C: StoreClient> Clone for QueryBuilder<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            collection: self.collection.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

impl<C: StoreClient> QueryBuilder<C> {
    /// Creates an unconstrained query over `collection`.
    pub fn new(client: Arc<C>, collection: CollectionPath) -> Self {
        Self {
            client,
            collection,
            constraints: Chain::new(),
        }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// The accumulated descriptors, in insertion order.
    pub fn constraints(&self) -> Vec<&Constraint> {
        self.constraints.iter().collect()
    }

    /// Whether `other` was derived from the same descriptor chain without additions.
    pub fn same_constraints(&self, other: &Self) -> bool {
        self.constraints.ptr_eq(&other.constraints)
    }

    fn with(&self, constraint: Constraint) -> Self {
        Self {
            client: Arc::clone(&self.client),
            collection: self.collection.clone(),
            constraints: self.constraints.push(constraint),
        }
    }

    /// Keeps documents whose `field` compares to `value` under `op`.
    ///
    /// `field` may be a dotted path into nested maps.
    pub fn filter(&self, field: impl Into<String>, op: FilterOp, value: impl Into<Bson>) -> Self {
        self.with(Constraint::Filter {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    /// Orders results by `field`, ascending.
    pub fn order_by(&self, field: impl Into<String>) -> Self {
        self.order_by_direction(field, Direction::Ascending)
    }

    pub fn order_by_direction(&self, field: impl Into<String>, direction: Direction) -> Self {
        self.with(Constraint::OrderBy {
            field: field.into(),
            direction,
        })
    }

    /// Keeps at most `count` results from the start of the ordered set.
    pub fn limit(&self, count: usize) -> Self {
        self.with(Constraint::Limit { count, end: LimitEnd::First })
    }

    /// Keeps at most `count` results from the end of the ordered set.
    pub fn limit_to_last(&self, count: usize) -> Self {
        self.with(Constraint::Limit { count, end: LimitEnd::Last })
    }

    pub fn start_at(&self, anchor: impl Into<CursorAnchor>) -> Self {
        self.cursor(CursorKind::StartAt, anchor.into())
    }

    pub fn start_after(&self, anchor: impl Into<CursorAnchor>) -> Self {
        self.cursor(CursorKind::StartAfter, anchor.into())
    }

    pub fn end_at(&self, anchor: impl Into<CursorAnchor>) -> Self {
        self.cursor(CursorKind::EndAt, anchor.into())
    }

    pub fn end_before(&self, anchor: impl Into<CursorAnchor>) -> Self {
        self.cursor(CursorKind::EndBefore, anchor.into())
    }

    fn cursor(&self, kind: CursorKind, anchor: CursorAnchor) -> Self {
        self.with(Constraint::Cursor { kind, anchor })
    }

    /// Replays every descriptor onto a fresh native query. Does not touch the store.
    pub fn realize(&self) -> C::Query {
        log::debug!(
            "realizing query on {} with {} constraint(s)",
            self.collection,
            self.constraints.len()
        );

        self.constraints
            .iter()
            .fold(self.client.query(&self.collection), |query, constraint| {
                constraint.apply(query)
            })
    }

    /// Realizes the query and runs it once, returning the store's snapshot.
    ///
    /// # Errors
    ///
    /// Returns whatever error the client reports, including invalid query shapes.
    pub async fn fetch_snapshot(&self) -> StoreResult<QuerySnapshot> {
        self.client.run_query(self.realize()).await
    }

    /// Runs the query and returns the decoded data of every result, in order.
    pub async fn fetch(&self) -> StoreResult<Vec<BsonDocument>> {
        Ok(self
            .fetch_snapshot()
            .await?
            .into_iter()
            .filter_map(DocumentSnapshot::into_data)
            .collect())
    }

    /// Runs the query and deserializes every result into `D`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError::Serialization`](crate::error::StoreError::Serialization)
    /// if a result does not decode as `D`.
    pub async fn fetch_as<D: Document>(&self) -> StoreResult<Vec<D>> {
        self.fetch()
            .await?
            .into_iter()
            .map(D::from_bson_document)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::test_support::{NativeCall, RecordingClient};

    fn users() -> QueryBuilder<RecordingClient> {
        QueryBuilder::new(Arc::new(RecordingClient::default()), CollectionPath::root("users"))
    }

    #[test]
    fn adding_constraints_returns_new_builders() {
        let base = users().filter("status", FilterOp::Equal, "active");
        let extended = base.limit(5);

        assert_eq!(base.constraints().len(), 1);
        assert_eq!(extended.constraints().len(), 2);
        assert!(!base.same_constraints(&extended));
        assert!(base.same_constraints(&base.clone()));
    }

    #[test]
    fn branches_from_a_shared_prefix_are_independent() {
        let base = users().order_by("name");
        let first = base.limit(1);
        let last = base.limit_to_last(1);

        assert_eq!(
            first.constraints().last(),
            Some(&&Constraint::Limit { count: 1, end: LimitEnd::First })
        );
        assert_eq!(
            last.constraints().last(),
            Some(&&Constraint::Limit { count: 1, end: LimitEnd::Last })
        );
        assert_eq!(base.constraints().len(), 1);
    }

    #[test]
    fn realize_replays_constraints_in_insertion_order() {
        let query = users()
            .filter("age", FilterOp::GreaterThan, 18)
            .order_by("name")
            .limit(5)
            .start_after(CursorAnchor::values(["bob"]))
            .realize();

        assert_eq!(
            query.calls,
            vec![
                NativeCall::Filter("age".into(), FilterOp::GreaterThan, Bson::Int32(18)),
                NativeCall::OrderBy("name".into(), Direction::Ascending),
                NativeCall::Limit(5),
                NativeCall::StartAfter(CursorAnchor::Values(vec![Bson::String("bob".into())])),
            ]
        );
        assert_eq!(query.collection, CollectionPath::root("users"));
    }

    #[test]
    fn realize_maps_every_cursor_and_limit_kind() {
        let snapshot = DocumentSnapshot::new(
            CollectionPath::root("users").document("alice"),
            Some(doc! { "name": "alice" }),
        );

        let query = users()
            .order_by_direction("name", Direction::Descending)
            .start_at(snapshot.clone())
            .end_at(CursorAnchor::values(["a"]))
            .end_before(CursorAnchor::values(["b"]))
            .limit_to_last(2)
            .realize();

        assert_eq!(
            query.calls,
            vec![
                NativeCall::OrderBy("name".into(), Direction::Descending),
                NativeCall::StartAt(CursorAnchor::Snapshot(snapshot)),
                NativeCall::EndAt(CursorAnchor::Values(vec![Bson::String("a".into())])),
                NativeCall::EndBefore(CursorAnchor::Values(vec![Bson::String("b".into())])),
                NativeCall::LimitToLast(2),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_runs_one_query_and_drops_metadata() {
        let client = Arc::new(RecordingClient::with_results(vec![
            DocumentSnapshot::new(
                CollectionPath::root("users").document("a"),
                Some(doc! { "name": "a" }),
            ),
            DocumentSnapshot::new(
                CollectionPath::root("users").document("b"),
                Some(doc! { "name": "b" }),
            ),
        ]));
        let query = QueryBuilder::new(Arc::clone(&client), CollectionPath::root("users"))
            .order_by("name");

        let results = query.fetch().await.unwrap();

        assert_eq!(results, vec![doc! { "name": "a" }, doc! { "name": "b" }]);
        assert_eq!(client.queries_run(), 1);
    }

    #[tokio::test]
    async fn fetch_of_no_results_is_empty() {
        assert!(users().fetch().await.unwrap().is_empty());
    }
}
