//! The capability surface docbind consumes from an underlying document store client.
//!
//! docbind does not talk to a database itself. Everything that reaches the store
//! goes through a [`StoreClient`], which a concrete client library (or the
//! in-memory client in `docbind-memory`) implements. Handles and builders forward
//! to it and return its results and errors untouched.
//!
//! # Traits
//!
//! - [`StoreClient`]: document reads and writes plus query execution
//! - [`NativeQuery`]: the client's chainable query value that builders replay into
//! - [`StoreClientBuilder`]: factory trait for creating client instances
//!
//! # Example
//!
//! ```ignore
//! use docbind::prelude::*;
//! use docbind::memory::InMemoryClient;
//!
//! let client = InMemoryClient::builder().build().await?;
//! let users = CollectionPath::root("users");
//! let query = client.query(&users).filter("age", FilterOp::GreaterThan, 18.into()).limit(10);
//! let snapshot = client.run_query(query).await?;
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{
    error::StoreResult,
    path::{CollectionPath, DocumentPath},
    query::{CursorAnchor, Direction, FilterOp},
    snapshot::{DocumentSnapshot, QuerySnapshot, WriteResult},
    value::{SetOptions, WriteData},
};

/// A store-native chainable query.
///
/// Each method consumes the query and returns the extended one. Implementations
/// record or translate the calls; they are not expected to validate them, since
/// invalid combinations are reported by [`StoreClient::run_query`].
pub trait NativeQuery: Send + Sized + 'static {
    fn filter(self, field: &str, op: FilterOp, value: Bson) -> Self;

    fn order_by(self, field: &str, direction: Direction) -> Self;

    fn limit(self, count: usize) -> Self;

    fn limit_to_last(self, count: usize) -> Self;

    fn start_at(self, anchor: CursorAnchor) -> Self;

    fn start_after(self, anchor: CursorAnchor) -> Self;

    fn end_at(self, anchor: CursorAnchor) -> Self;

    fn end_before(self, anchor: CursorAnchor) -> Self;
}

/// Abstract interface for document store clients.
///
/// # Thread Safety
///
/// Clients are shared behind an `Arc` by every handle and builder derived from
/// them, so implementations must be `Send + Sync`.
///
/// # Error Handling
///
/// Every async method returns a [`StoreResult`]. Failures are surfaced as-is to
/// callers; docbind performs no retries and no error translation.
#[async_trait]
pub trait StoreClient: Send + Sync + Debug + 'static {
    /// The native query type [`QueryBuilder`](crate::query::QueryBuilder)s realize into.
    type Query: NativeQuery;

    /// Starts a native query over every document in `collection`. No I/O.
    fn query(&self, collection: &CollectionPath) -> Self::Query;

    /// Runs a realized query and returns its results in order.
    async fn run_query(&self, query: Self::Query) -> StoreResult<QuerySnapshot>;

    /// Reads one document. A missing document is a snapshot without data, not an error.
    async fn get(&self, document: &DocumentPath) -> StoreResult<DocumentSnapshot>;

    /// Creates a document with a store-generated id and returns its path.
    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<DocumentPath>;

    /// Writes a document, overwriting or merging according to `options`.
    async fn set(
        &self,
        document: &DocumentPath,
        data: WriteData,
        options: &SetOptions,
    ) -> StoreResult<WriteResult>;

    /// Applies a partial update keyed by dotted field paths, atomically.
    async fn update(&self, document: &DocumentPath, data: WriteData) -> StoreResult<WriteResult>;

    /// Deletes a document.
    async fn delete(&self, document: &DocumentPath) -> StoreResult<WriteResult>;
}

#[async_trait]
pub trait StoreClientBuilder {
    type Client: StoreClient;

    async fn build(self) -> StoreResult<Self::Client>;
}
