//! Document references bound to a store client.

use std::{
    fmt::{self, Display},
    sync::Arc,
};

use bson::Document as BsonDocument;

use crate::{
    client::StoreClient,
    collection::CollectionHandle,
    error::StoreResult,
    path::{CollectionPath, DocumentPath},
    snapshot::{DocumentSnapshot, WriteResult},
    update::UpdateBuilder,
};

/// A resolved document address together with the client that serves it.
///
/// Creating a reference performs no I/O; the document need not exist.
#[derive(Debug)]
pub struct DocumentReference<C: StoreClient> {
    client: Arc<C>,
    path: DocumentPath,
}

impl<C: StoreClient> Clone for DocumentReference<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            path: self.path.clone(),
        }
    }
}

impl<C: StoreClient> PartialEq for DocumentReference<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.client, &other.client) && self.path == other.path
    }
}

impl<C: StoreClient> DocumentReference<C> {
    pub fn new(client: Arc<C>, path: DocumentPath) -> Self {
        Self { client, path }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// The path of the collection containing this document.
    pub fn parent(&self) -> CollectionPath {
        self.path.parent()
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Reads the document, returning `None` if it does not exist.
    pub async fn get(&self) -> StoreResult<Option<BsonDocument>> {
        Ok(self.get_snapshot().await?.into_data())
    }

    pub async fn get_snapshot(&self) -> StoreResult<DocumentSnapshot> {
        self.client.get(&self.path).await
    }

    pub async fn delete(&self) -> StoreResult<WriteResult> {
        self.client.delete(&self.path).await
    }

    /// Starts an empty update builder targeting this document.
    pub fn update(&self) -> UpdateBuilder<C> {
        UpdateBuilder::new(Arc::clone(&self.client), self.path.clone())
    }

    /// Opens the schema-less sub-collection `name` under this document.
    pub fn collection(&self, name: impl Into<String>) -> CollectionHandle<C> {
        CollectionHandle::nested(Arc::clone(&self.client), &self.path, name, None)
    }
}

impl<C: StoreClient> Display for DocumentReference<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentReference({})", self.path)
    }
}
