//! In-memory document store client for docbind.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreClient` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Hierarchical paths** - Collections nest under documents to any depth
//! - **Full query support** - Filters, ordering, cursors and limits
//! - **Sentinels** - Server timestamps, increments, array union/remove and field deletes
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::{memory::InMemoryClient, prelude::*};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(InMemoryClient::builder().build().await?);
//!     let users = CollectionHandle::root(client, "users", None);
//!
//!     users.set("alice", doc! { "name": "Alice" }).await?;
//!     assert!(users.get("alice").await?.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;
mod write;

pub use evaluator::MemoryQuery;
pub use store::{InMemoryClient, InMemoryClientBuilder};
