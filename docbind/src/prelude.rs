//! Convenient re-exports of commonly used types from docbind.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docbind::prelude::*;
//! ```
//!
//! This provides access to:
//! - Collection handles, document references and typed collections
//! - Query and update builders
//! - Schemas and sub-collection registration
//! - Store client traits, paths, values and snapshots
//! - Error types

pub use bson::doc;

pub use docbind_core::{
    client::{NativeQuery, StoreClient, StoreClientBuilder},
    collection::{CollectionHandle, TypedCollection},
    document::{Document, DocumentExt},
    error::{SchemaError, StoreError, StoreResult},
    path::{CollectionPath, DocumentPath},
    query::{CursorAnchor, Direction, FilterOp, QueryBuilder},
    reference::DocumentReference,
    schema::{CollectionSchema, CollectionType, DefaultValue, FieldSchema, SubCollectionSchema},
    snapshot::{DocumentSnapshot, QuerySnapshot, WriteResult},
    update::{CommitOutcome, UpdateBuilder},
    value::{FieldValue, Numeric, Sentinel, SetOptions, WriteData},
};
