//! Schema descriptors: per-field default values and nested sub-collections.
//!
//! A [`CollectionSchema`] is read-only configuration handed to a
//! [`CollectionHandle`]. It carries two tables:
//!
//! - **fields**: field name to [`FieldSchema`], whose optional [`DefaultValue`] is
//!   injected into `add`/`set` payloads that do not mention the field;
//! - **sub-collections**: name to [`SubCollectionSchema`], holding the nested
//!   schema and the factory that builds the sub-collection's handle type.
//!
//! Schemas are usually built in code by generated collection types:
//!
//! ```ignore
//! let posts = CollectionSchema::new()
//!     .with_server_timestamp("created_at");
//!
//! let users = CollectionSchema::new()
//!     .with_default("status", "inactive")
//!     .with_default("score", 0)
//!     .with_sub_collection("posts", SubCollectionSchema::new::<Posts>().with_schema(posts));
//! ```
//!
//! They can also be loaded from JSON configuration, with factories registered
//! afterwards since constructors are not data:
//!
//! ```ignore
//! let users = CollectionSchema::from_json(json!({
//!     "fields": { "status": { "defaultValue": "inactive" } },
//!     "subCollections": { "posts": { "schema": { "fields": {} } } }
//! }))?
//! .register::<Posts>("posts");
//! ```

use std::{
    any::{Any, type_name},
    collections::BTreeMap,
    fmt::{self, Debug},
    sync::Arc,
};

use bson::{Bson, ser::serialize_to_bson};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    client::StoreClient,
    collection::CollectionHandle,
    error::SchemaError,
    value::{FieldValue, WriteData},
};

/// The configuration marker selecting a server-assigned timestamp default.
pub const SERVER_TIMESTAMP_MARKER: &str = "serverTimestamp";

/// A field's default value.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Literal(Bson),
    ServerTimestamp,
}

impl DefaultValue {
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            DefaultValue::Literal(value) => FieldValue::Value(value.clone()),
            DefaultValue::ServerTimestamp => FieldValue::server_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    pub default_value: Option<DefaultValue>,
}

/// A handle type that can be built from a resolved [`CollectionHandle`].
///
/// Generated collection wrappers implement this so they can be registered as
/// sub-collection factories.
pub trait CollectionType<C: StoreClient>: Send + Sync + 'static {
    fn from_handle(handle: CollectionHandle<C>) -> Self;
}

/// A type-erased constructor for a sub-collection's handle type.
pub type CollectionFactory<C> =
    Arc<dyn Fn(CollectionHandle<C>) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// One entry in a schema's sub-collection table.
pub struct SubCollectionSchema<C: StoreClient> {
    schema: Option<Arc<CollectionSchema<C>>>,
    factory: Option<CollectionFactory<C>>,
    type_name: Option<&'static str>,
}

impl<C: StoreClient> SubCollectionSchema<C> {
    /// An entry whose handles are built by `T::from_handle`.
    pub fn new<T: CollectionType<C>>() -> Self {
        Self {
            schema: None,
            factory: Some(factory_for::<C, T>()),
            type_name: Some(type_name::<T>()),
        }
    }

    /// An entry with no registered handle type yet.
    pub fn unregistered() -> Self {
        Self {
            schema: None,
            factory: None,
            type_name: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<Arc<CollectionSchema<C>>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn schema(&self) -> Option<&Arc<CollectionSchema<C>>> {
        self.schema.as_ref()
    }

    pub fn factory(&self) -> Option<&CollectionFactory<C>> {
        self.factory.as_ref()
    }
}

impl<C: StoreClient> Clone for SubCollectionSchema<C> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            factory: self.factory.clone(),
            type_name: self.type_name,
        }
    }
}

impl<C: StoreClient> Debug for SubCollectionSchema<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubCollectionSchema")
            .field("schema", &self.schema)
            .field("registered_type", &self.type_name)
            .finish()
    }
}

fn factory_for<C: StoreClient, T: CollectionType<C>>() -> CollectionFactory<C> {
    Arc::new(|handle| Box::new(T::from_handle(handle)) as Box<dyn Any + Send + Sync>)
}

#[derive(Debug)]
pub struct CollectionSchema<C: StoreClient> {
    fields: BTreeMap<String, FieldSchema>,
    sub_collections: Option<BTreeMap<String, SubCollectionSchema<C>>>,
}

impl<C: StoreClient> Default for CollectionSchema<C> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            sub_collections: None,
        }
    }
}

impl<C: StoreClient> Clone for CollectionSchema<C> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            sub_collections: self.sub_collections.clone(),
        }
    }
}

impl<C: StoreClient> CollectionSchema<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Declares `name` with a literal default.
    pub fn with_default(self, name: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.with_field(
            name,
            FieldSchema {
                default_value: Some(DefaultValue::Literal(value.into())),
            },
        )
    }

    /// Declares `name` defaulting to the server's write time.
    pub fn with_server_timestamp(self, name: impl Into<String>) -> Self {
        self.with_field(
            name,
            FieldSchema {
                default_value: Some(DefaultValue::ServerTimestamp),
            },
        )
    }

    pub fn with_sub_collection(mut self, name: impl Into<String>, entry: SubCollectionSchema<C>) -> Self {
        self.sub_collections
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), entry);
        self
    }

    /// Registers `T` as the handle type for sub-collection `name`, keeping any
    /// nested schema already configured for it.
    pub fn register<T: CollectionType<C>>(mut self, name: impl Into<String>) -> Self {
        let entry = self
            .sub_collections
            .get_or_insert_with(BTreeMap::new)
            .entry(name.into())
            .or_insert_with(SubCollectionSchema::unregistered);

        entry.factory = Some(factory_for::<C, T>());
        entry.type_name = Some(type_name::<T>());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn sub_collection(&self, name: &str) -> Option<&SubCollectionSchema<C>> {
        self.sub_collections.as_ref()?.get(name)
    }

    /// Adds the default of every declared field missing from `data`.
    ///
    /// Fields present in `data` are never replaced, whatever their value.
    pub fn apply_defaults(&self, mut data: WriteData) -> WriteData {
        for (name, field) in &self.fields {
            if let Some(default) = &field.default_value {
                if !data.contains_field(name) {
                    data.insert(name.clone(), default.to_field_value());
                }
            }
        }

        data
    }

    /// Builds a schema from its JSON configuration form.
    ///
    /// `defaultValue` may be any JSON literal; the string `"serverTimestamp"` selects
    /// [`DefaultValue::ServerTimestamp`]. Sub-collections loaded this way have no
    /// factory until [`register`](Self::register) is called.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidConfig`] if the value does not have the expected shape,
    /// or if a default cannot be stored (an integer beyond the signed 64-bit range).
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let config: SchemaConfig = serde_json::from_value(value)?;
        config.into_schema()
    }

    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let config: SchemaConfig = serde_json::from_str(input)?;
        config.into_schema()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaConfig {
    #[serde(default)]
    fields: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    sub_collections: Option<BTreeMap<String, SubCollectionConfig>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SubCollectionConfig {
    #[serde(default)]
    schema: Option<Box<SchemaConfig>>,
}

impl SchemaConfig {
    fn into_schema<C: StoreClient>(self) -> Result<CollectionSchema<C>, SchemaError> {
        let fields: BTreeMap<String, FieldSchema> = self
            .fields
            .into_iter()
            .map(|(name, options)| -> Result<_, SchemaError> {
                // Present-but-null is a literal null default, so look the key up directly.
                let default_value = options
                    .get("defaultValue")
                    .map(|value| match value {
                        Value::String(marker) if marker == SERVER_TIMESTAMP_MARKER => {
                            Ok(DefaultValue::ServerTimestamp)
                        }
                        literal => serialize_to_bson(literal).map(DefaultValue::Literal),
                    })
                    .transpose()?;

                Ok((name, FieldSchema { default_value }))
            })
            .collect::<Result<_, SchemaError>>()?;

        let sub_collections: Option<BTreeMap<String, SubCollectionSchema<C>>> = self
            .sub_collections
            .map(|table| {
                table
                    .into_iter()
                    .map(|(name, entry)| -> Result<_, SchemaError> {
                        let mut sub = SubCollectionSchema::unregistered();
                        sub.schema = entry
                            .schema
                            .map(|schema| schema.into_schema().map(Arc::new))
                            .transpose()?;
                        Ok((name, sub))
                    })
                    .collect::<Result<_, SchemaError>>()
            })
            .transpose()?;

        Ok(CollectionSchema { fields, sub_collections })
    }
}
