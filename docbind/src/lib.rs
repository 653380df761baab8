//! Main docbind crate: schema-aware collection handles and chainable builders over
//! a hierarchical document store.
//!
//! This crate is the primary entry point for users of docbind. It re-exports the
//! core types from `docbind-core` and the in-memory client from `docbind-memory`.
//!
//! # Features
//!
//! - **Collection handles** - Resolve root or nested collections and read and write documents
//! - **Default values** - Schema fields are filled in on `add` and `set` when the payload omits them
//! - **Immutable builders** - Queries and updates accumulate descriptors without touching the store
//! - **Sub-collections** - Nested handles built through factories registered in the schema
//! - **Typed documents** - Serde types in, serde types out
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::{prelude::*, memory::InMemoryClient};
//! use serde::{Serialize, Deserialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub status: Option<String>,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(InMemoryClient::builder().build().await?);
//!     let schema = CollectionSchema::new().with_default("status", "inactive");
//!     let users = TypedCollection::<_, User>::open(client, Some(schema.into()));
//!
//!     users.set("alice", &User { name: "Alice".into(), status: None }).await?;
//!
//!     let inactive = users
//!         .query()
//!         .filter("status", FilterOp::Equal, "inactive")
//!         .order_by("name")
//!         .limit(10)
//!         .fetch_as::<User>()
//!         .await?;
//!
//!     users
//!         .update("alice")
//!         .set_field("status", "active")
//!         .server_timestamp("activated_at")
//!         .commit()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Sub-collections
//!
//! A schema can declare the sub-collections of its documents together with the
//! handle type to build for each. Asking for a sub-collection the schema does not
//! declare is a [`SchemaError`](error::SchemaError), raised before anything else
//! happens.
//!
//! ```ignore
//! struct Posts(CollectionHandle<InMemoryClient>);
//!
//! impl CollectionType<InMemoryClient> for Posts {
//!     fn from_handle(handle: CollectionHandle<InMemoryClient>) -> Self { Posts(handle) }
//! }
//!
//! let schema = CollectionSchema::new()
//!     .with_sub_collection("posts", SubCollectionSchema::new::<Posts>());
//! let users = CollectionHandle::root(client, "users", Some(schema.into()));
//!
//! let posts: Posts = users.sub_collection("alice", "posts")?;
//! ```
//!
//! # Clients
//!
//! - [`memory`] - In-memory client for development and testing
//!
//! Any other store is plugged in by implementing
//! [`StoreClient`](client::StoreClient).

pub mod prelude;

pub use docbind_core::{
    chain, client, collection, document, error, path, query, reference, schema, snapshot, update,
    value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory client implementations.
pub mod memory {
    pub use docbind_memory::{InMemoryClient, InMemoryClientBuilder, MemoryQuery};
}
