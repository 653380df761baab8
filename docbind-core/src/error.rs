//! Error types and result types for docbind operations.
//!
//! Two families of errors exist and never share a type:
//!
//! - [`SchemaError`] is raised synchronously when a schema descriptor is missing
//!   something a handle needs (a sub-collection entry, a registered factory). These
//!   are authoring mistakes and are not recoverable at runtime.
//! - [`StoreError`] is produced by a [`StoreClient`](crate::client::StoreClient) and
//!   handed back to the caller exactly as the client produced it. Use
//!   [`StoreResult<T>`] as the return type for operations that reach the store.
//!
//! Reading a document that does not exist is not an error: it resolves to `Ok(None)`.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors reported by a store client.
///
/// Handles and builders never wrap, retry or translate these; whatever the client
/// returns is what the caller sees.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The request was malformed (bad path, bad query shape, bad sentinel placement).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A write targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The caller is not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The store could not be reached or refused to serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// Conversion between typed documents and stored values failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Any other failure reported by the underlying client.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for operations that reach the store.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors caused by an incomplete or inconsistent schema descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema has no sub-collection table, or the table has no entry for the name.
    #[error("Collection {collection} has no sub-collection named {sub_collection} in its schema")]
    MissingSubCollection {
        collection: String,
        sub_collection: String,
    },
    /// The sub-collection entry exists but no handle factory was registered for it.
    #[error("Sub-collection {sub_collection} of collection {collection} has no registered collection type")]
    MissingFactory {
        collection: String,
        sub_collection: String,
    },
    /// The registered factory builds a different handle type than the one requested.
    #[error("Sub-collection {sub_collection} of collection {collection} is not registered as {expected}")]
    FactoryTypeMismatch {
        collection: String,
        sub_collection: String,
        expected: &'static str,
    },
    /// A schema configuration document could not be interpreted.
    #[error("Invalid schema configuration: {0}")]
    InvalidConfig(String),
}

impl From<SerdeJsonError> for SchemaError {
    fn from(err: SerdeJsonError) -> Self {
        SchemaError::InvalidConfig(err.to_string())
    }
}

impl From<BsonError> for SchemaError {
    fn from(err: BsonError) -> Self {
        SchemaError::InvalidConfig(err.to_string())
    }
}
