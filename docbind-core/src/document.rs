//! Typed document records and their conversion to and from stored values.
//!
//! Generated collection code pairs a [`Document`] type with a collection so that
//! reads and writes are checked at compile time, while the store keeps seeing
//! plain BSON documents.

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::{
    error::{StoreError, StoreResult},
    value::WriteData,
};

/// A record type stored in a collection.
///
/// Fields left out of the serialized form (for example through
/// `#[serde(skip_serializing_if = "Option::is_none")]`) are considered absent and
/// receive schema defaults on write. Fields serialized as `null` are present and do not.
///
/// # Example
///
/// ```ignore
/// use docbind::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub name: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     pub status: Option<String>,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the top-level collection this record type lives in.
    fn collection_name() -> &'static str;
}

/// Conversion helpers, implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Serializes this record into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if serialization fails or the record
    /// does not serialize to a map.
    fn to_bson_document(&self) -> StoreResult<BsonDocument>;

    /// Serializes this record into a write payload of literal fields.
    fn to_write_data(&self) -> StoreResult<WriteData>;

    /// Decodes a record from stored document data.
    fn from_bson_document(document: BsonDocument) -> StoreResult<Self>;

    fn to_json(&self) -> StoreResult<Value>;

    fn from_json(value: Value) -> StoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson_document(&self) -> StoreResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(StoreError::Serialization(format!(
                "Expected {} to serialize to a document, got {:?}",
                D::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn to_write_data(&self) -> StoreResult<WriteData> {
        Ok(WriteData::from(self.to_bson_document()?))
    }

    fn from_bson_document(document: BsonDocument) -> StoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> StoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> StoreResult<Self> {
        Ok(from_value(value)?)
    }
}
