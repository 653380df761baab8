//! Collection handles: the root that queries, updates and sub-collections hang off.
//!
//! # Collection Types
//!
//! - [`CollectionHandle`] - schema-aware handle working with BSON payloads
//! - [`TypedCollection`] - wraps a handle and converts to and from a [`Document`] type
//!
//! A handle resolves its path once, at construction: under a parent document if one
//! is given, otherwise at the root of the store. Writes through `add` and `set`
//! receive the schema's default values for every declared field the payload leaves
//! out, except for merge writes, which only ever touch what the caller sent.
//!
//! # Example
//!
//! ```ignore
//! use docbind::prelude::*;
//!
//! let schema = CollectionSchema::new()
//!     .with_default("status", "inactive")
//!     .with_sub_collection("posts", SubCollectionSchema::new::<Posts>());
//! let users = CollectionHandle::root(client.clone(), "users", Some(schema.into()));
//!
//! users.set("alice", doc! { "name": "Alice" }).await?;
//! let alice = users.get("alice").await?;          // Some({ name: "Alice", status: "inactive" })
//! let posts: Posts = users.sub_collection("alice", "posts")?;
//! ```

use bson::Document as BsonDocument;
use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    client::StoreClient,
    document::{Document, DocumentExt},
    error::{SchemaError, StoreResult},
    path::{CollectionPath, DocumentPath},
    query::QueryBuilder,
    reference::DocumentReference,
    schema::{CollectionSchema, CollectionType},
    snapshot::{DocumentSnapshot, WriteResult},
    update::UpdateBuilder,
    value::{SetOptions, WriteData},
};

pub struct CollectionHandle<C: StoreClient> {
    client: Arc<C>,
    path: CollectionPath,
    schema: Option<Arc<CollectionSchema<C>>>,
}

impl<C: StoreClient> fmt::Debug for CollectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("path", &self.path)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<C: StoreClient> CollectionHandle<C> {
    /// Resolves collection `name`, nested under `parent` when given, otherwise at the root.
    ///
    /// No I/O is performed.
    pub fn open(
        client: Arc<C>,
        name: impl Into<String>,
        schema: Option<Arc<CollectionSchema<C>>>,
        parent: Option<&DocumentPath>,
    ) -> Self {
        let path = match parent {
            Some(parent) => parent.collection(name),
            None => CollectionPath::root(name),
        };

        Self { client, path, schema }
    }

    /// Resolves the top-level collection `name`.
    pub fn root(client: Arc<C>, name: impl Into<String>, schema: Option<Arc<CollectionSchema<C>>>) -> Self {
        Self::open(client, name, schema, None)
    }

    /// Resolves the collection `name` nested under `parent`.
    pub fn nested(
        client: Arc<C>,
        parent: &DocumentPath,
        name: impl Into<String>,
        schema: Option<Arc<CollectionSchema<C>>>,
    ) -> Self {
        Self::open(client, name, schema, Some(parent))
    }

    /// The collection identifier (last path segment).
    pub fn name(&self) -> &str {
        self.path.id()
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn schema(&self) -> Option<&Arc<CollectionSchema<C>>> {
        self.schema.as_ref()
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Returns a reference to document `id` in this collection. No I/O.
    pub fn doc(&self, id: impl Into<String>) -> DocumentReference<C> {
        DocumentReference::new(Arc::clone(&self.client), self.path.document(id))
    }

    fn with_defaults(&self, data: WriteData) -> WriteData {
        match &self.schema {
            Some(schema) => schema.apply_defaults(data),
            None => data,
        }
    }

    /// Creates a document with a store-generated id, after injecting defaults.
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged; nothing is retried.
    pub async fn add(&self, data: impl Into<WriteData>) -> StoreResult<DocumentReference<C>> {
        let data = self.with_defaults(data.into());
        let path = self.client.add(&self.path, data).await?;

        log::debug!("added document {path}");

        Ok(DocumentReference::new(Arc::clone(&self.client), path))
    }

    /// Overwrites document `id` with `data`, after injecting defaults.
    pub async fn set(&self, id: impl Into<String>, data: impl Into<WriteData>) -> StoreResult<WriteResult> {
        self.set_with_options(id, data, SetOptions::default()).await
    }

    /// Writes document `id` according to `options`.
    ///
    /// Merge writes (a merge flag or a field list) skip default injection so they
    /// never introduce fields the caller did not send.
    pub async fn set_with_options(
        &self,
        id: impl Into<String>,
        data: impl Into<WriteData>,
        options: SetOptions,
    ) -> StoreResult<WriteResult> {
        let data = if options.is_merge() {
            data.into()
        } else {
            self.with_defaults(data.into())
        };

        self.client
            .set(&self.path.document(id), data, &options)
            .await
    }

    /// Reads document `id`; `Ok(None)` means it does not exist.
    pub async fn get(&self, id: impl Into<String>) -> StoreResult<Option<BsonDocument>> {
        Ok(self.get_snapshot(id).await?.into_data())
    }

    pub async fn get_snapshot(&self, id: impl Into<String>) -> StoreResult<DocumentSnapshot> {
        self.client.get(&self.path.document(id)).await
    }

    pub async fn delete(&self, id: impl Into<String>) -> StoreResult<WriteResult> {
        self.client.delete(&self.path.document(id)).await
    }

    /// Starts an unconstrained query over this collection.
    pub fn query(&self) -> QueryBuilder<C> {
        QueryBuilder::new(Arc::clone(&self.client), self.path.clone())
    }

    /// Starts an empty update builder for document `id`.
    pub fn update(&self, id: impl Into<String>) -> UpdateBuilder<C> {
        UpdateBuilder::new(Arc::clone(&self.client), self.path.document(id))
    }

    /// Opens sub-collection `name` under document `parent_id`, as the handle type
    /// registered for it in this collection's schema.
    ///
    /// The nested schema is the one registered with the entry.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingSubCollection`] if the schema has no entry for `name`
    /// - [`SchemaError::MissingFactory`] if the entry has no registered handle type
    /// - [`SchemaError::FactoryTypeMismatch`] if the registered type is not `T`
    pub fn sub_collection<T: CollectionType<C>>(
        &self,
        parent_id: impl Into<String>,
        name: &str,
    ) -> Result<T, SchemaError> {
        self.open_sub_collection(parent_id, name, None)
    }

    /// Like [`sub_collection`](Self::sub_collection), but hands `schema` to the new
    /// handle instead of the entry's registered schema.
    pub fn sub_collection_with_schema<T: CollectionType<C>>(
        &self,
        parent_id: impl Into<String>,
        name: &str,
        schema: Arc<CollectionSchema<C>>,
    ) -> Result<T, SchemaError> {
        self.open_sub_collection(parent_id, name, Some(schema))
    }

    fn open_sub_collection<T: CollectionType<C>>(
        &self,
        parent_id: impl Into<String>,
        name: &str,
        schema: Option<Arc<CollectionSchema<C>>>,
    ) -> Result<T, SchemaError> {
        // The schema is checked before the parent document is resolved.
        let entry = self
            .schema
            .as_ref()
            .and_then(|schema| schema.sub_collection(name))
            .ok_or_else(|| {
                log::warn!("{} has no sub-collection {name} in its schema", self.path);
                SchemaError::MissingSubCollection {
                    collection: self.path.to_string(),
                    sub_collection: name.to_string(),
                }
            })?;

        let factory = entry.factory().ok_or_else(|| SchemaError::MissingFactory {
            collection: self.path.to_string(),
            sub_collection: name.to_string(),
        })?;

        let parent = self.path.document(parent_id);
        let handle = CollectionHandle::nested(
            Arc::clone(&self.client),
            &parent,
            name,
            schema.or_else(|| entry.schema().cloned()),
        );

        factory(handle)
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| SchemaError::FactoryTypeMismatch {
                collection: self.path.to_string(),
                sub_collection: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<C: StoreClient> CollectionType<C> for CollectionHandle<C> {
    fn from_handle(handle: CollectionHandle<C>) -> Self {
        handle
    }
}

/// A collection handle bound to a [`Document`] type.
pub struct TypedCollection<C: StoreClient, D: Document> {
    handle: CollectionHandle<C>,
    _marker: PhantomData<D>,
}

impl<C: StoreClient, D: Document> fmt::Debug for TypedCollection<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCollection")
            .field("handle", &self.handle)
            .field("document", &std::any::type_name::<D>())
            .finish()
    }
}

impl<C: StoreClient, D: Document> CollectionType<C> for TypedCollection<C, D> {
    fn from_handle(handle: CollectionHandle<C>) -> Self {
        Self { handle, _marker: PhantomData }
    }
}

impl<C: StoreClient, D: Document> TypedCollection<C, D> {
    /// Opens the top-level collection named by [`Document::collection_name`].
    pub fn open(client: Arc<C>, schema: Option<Arc<CollectionSchema<C>>>) -> Self {
        Self::from_handle(CollectionHandle::root(client, D::collection_name(), schema))
    }

    pub fn handle(&self) -> &CollectionHandle<C> {
        &self.handle
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentReference<C> {
        self.handle.doc(id)
    }

    pub async fn add(&self, document: &D) -> StoreResult<DocumentReference<C>> {
        self.handle.add(document.to_write_data()?).await
    }

    pub async fn set(&self, id: impl Into<String>, document: &D) -> StoreResult<WriteResult> {
        self.handle.set(id, document.to_write_data()?).await
    }

    pub async fn set_with_options(
        &self,
        id: impl Into<String>,
        document: &D,
        options: SetOptions,
    ) -> StoreResult<WriteResult> {
        self.handle
            .set_with_options(id, document.to_write_data()?, options)
            .await
    }

    /// Reads and decodes document `id`; `Ok(None)` means it does not exist.
    pub async fn get(&self, id: impl Into<String>) -> StoreResult<Option<D>> {
        self.handle
            .get(id)
            .await?
            .map(D::from_bson_document)
            .transpose()
    }

    pub async fn delete(&self, id: impl Into<String>) -> StoreResult<WriteResult> {
        self.handle.delete(id).await
    }

    /// Starts a query; use [`QueryBuilder::fetch_as`] to decode results as `D`.
    pub fn query(&self) -> QueryBuilder<C> {
        self.handle.query()
    }

    pub fn update(&self, id: impl Into<String>) -> UpdateBuilder<C> {
        self.handle.update(id)
    }

    pub fn sub_collection<T: CollectionType<C>>(
        &self,
        parent_id: impl Into<String>,
        name: &str,
    ) -> Result<T, SchemaError> {
        self.handle.sub_collection(parent_id, name)
    }
}
