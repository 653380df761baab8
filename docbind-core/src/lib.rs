//! Schema-aware, chainable bindings over a hierarchical document store.
//!
//! This crate is the core of the docbind project and provides:
//!
//! - **Store client abstraction** ([`client`]) - The capability surface a concrete store client implements
//! - **Collection handles** ([`collection`]) - Collection-level reads and writes with default injection
//! - **Document references** ([`reference`]) - Single-document addressing, reads and deletes
//! - **Query builder** ([`query`]) - Immutable query descriptors realized into native queries
//! - **Update builder** ([`update`]) - Immutable partial-update accumulation with a single commit
//! - **Schemas** ([`schema`]) - Field defaults and sub-collection factories
//! - **Typed documents** ([`document`]) - Serde-backed conversion between Rust types and stored documents
//! - **Paths, values and snapshots** ([`path`], [`value`], [`snapshot`]) - The data exchanged with the client
//! - **Error handling** ([`error`]) - Store errors and schema configuration errors
//!
//! # Example
//!
//! ```ignore
//! use docbind_core::{collection::CollectionHandle, schema::CollectionSchema};
//! use bson::doc;
//!
//! let schema = CollectionSchema::new().with_default("status", "inactive");
//! let users = CollectionHandle::root(client, "users", Some(schema.into()));
//!
//! users.set("alice", doc! { "name": "Alice" }).await?;
//! let active = users
//!     .query()
//!     .filter("status", FilterOp::Equal, "active")
//!     .order_by("name")
//!     .limit(10)
//!     .fetch()
//!     .await?;
//! ```

pub mod chain;
pub mod client;
pub mod collection;
pub mod document;
pub mod error;
pub mod path;
pub mod query;
pub mod reference;
pub mod schema;
pub mod snapshot;
pub mod update;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;
