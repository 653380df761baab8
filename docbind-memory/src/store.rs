//! In-memory document store client.
//!
//! This module provides a simple but complete client that keeps documents as
//! BSON maps keyed by collection path and document id, behind an async-aware
//! read-write lock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::Document;
use chrono::Utc;
use mea::rwlock::RwLock;
use uuid::Uuid;

use docbind_core::{
    client::{StoreClient, StoreClientBuilder},
    error::{StoreError, StoreResult},
    path::{CollectionPath, DocumentPath},
    snapshot::{DocumentSnapshot, QuerySnapshot, WriteResult},
    value::{SetOptions, WriteData},
};

use crate::{
    evaluator::MemoryQuery,
    write::{apply_set, apply_update, create},
};

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<CollectionPath, CollectionMap>;

/// Thread-safe in-memory document store client.
///
/// # Thread Safety
///
/// `InMemoryClient` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same documents.
///
/// # Semantics
///
/// - Collections exist implicitly; a sub-collection does not require its parent
///   document to exist, and deleting a document leaves its sub-collections alone.
/// - Sentinels are resolved at write time, with one timestamp per write.
/// - Queries scan the whole collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use docbind_memory::InMemoryClient;
/// use docbind_core::client::{StoreClient, StoreClientBuilder};
/// use bson::doc;
///
/// let alice_path = CollectionPath::root("users").document("alice");
/// let client = InMemoryClient::builder()
///     .with_document(alice_path.clone(), doc! { "name": "Alice" })
///     .build()
///     .await?;
///
/// let alice = client.get(&alice_path).await?;
/// assert!(alice.exists());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryClient {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryClient {
    /// Creates a new empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryClient` with seed documents.
    pub fn builder() -> InMemoryClientBuilder {
        InMemoryClientBuilder::default()
    }

    /// Number of documents currently stored directly in `collection`.
    pub async fn document_count(&self, collection: &CollectionPath) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Paths of the collections that currently hold at least one document.
    pub async fn list_collections(&self) -> Vec<CollectionPath> {
        let mut collections = self
            .store
            .read()
            .await
            .iter()
            .filter(|(_, collection_map)| !collection_map.is_empty())
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();

        collections.sort_by_key(ToString::to_string);
        collections
    }

    fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl StoreClient for InMemoryClient {
    type Query = MemoryQuery;

    fn query(&self, collection: &CollectionPath) -> MemoryQuery {
        MemoryQuery::new(collection.clone())
    }

    async fn run_query(&self, query: MemoryQuery) -> StoreResult<QuerySnapshot> {
        let store = self.store.read().await;
        let collection = query.collection();
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(QuerySnapshot::default()),
        };

        let matched = query.evaluate(
            collection_map
                .iter()
                .map(|(id, document)| (id.as_str(), document)),
        )?;

        log::debug!("query on {collection} matched {} document(s)", matched.len());

        Ok(QuerySnapshot::new(
            matched
                .into_iter()
                .map(|(id, document)| {
                    DocumentSnapshot::new(collection.document(id), Some(document.clone()))
                })
                .collect(),
        ))
    }

    async fn get(&self, document: &DocumentPath) -> StoreResult<DocumentSnapshot> {
        let data = self
            .store
            .read()
            .await
            .get(&document.parent())
            .and_then(|collection_map| collection_map.get(document.id()))
            .cloned();

        Ok(DocumentSnapshot::new(document.clone(), data))
    }

    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<DocumentPath> {
        let now = Utc::now();
        let document = create(data, bson::DateTime::from_chrono(now))?;
        let id = Self::generate_id();

        self.store
            .write()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), document);

        log::debug!("created {collection}/{id}");

        Ok(collection.document(id))
    }

    async fn set(
        &self,
        document: &DocumentPath,
        data: WriteData,
        options: &SetOptions,
    ) -> StoreResult<WriteResult> {
        let now = Utc::now();
        let mut store = self.store.write().await;

        let existing = if options.is_merge() {
            store
                .get(&document.parent())
                .and_then(|collection_map| collection_map.get(document.id()))
                .cloned()
        } else {
            None
        };

        let written = apply_set(existing, data, options, bson::DateTime::from_chrono(now))?;
        store
            .entry(document.parent())
            .or_default()
            .insert(document.id().to_string(), written);

        Ok(WriteResult::new(now))
    }

    async fn update(&self, document: &DocumentPath, data: WriteData) -> StoreResult<WriteResult> {
        let now = Utc::now();
        let mut store = self.store.write().await;

        let stored = store
            .get_mut(&document.parent())
            .and_then(|collection_map| collection_map.get_mut(document.id()))
            .ok_or_else(|| StoreError::NotFound(document.to_string()))?;

        *stored = apply_update(stored.clone(), data, bson::DateTime::from_chrono(now))?;

        Ok(WriteResult::new(now))
    }

    async fn delete(&self, document: &DocumentPath) -> StoreResult<WriteResult> {
        let mut store = self.store.write().await;

        let parent = document.parent();
        if let Some(collection_map) = store.get_mut(&parent) {
            if collection_map.remove(document.id()).is_some() {
                log::debug!("deleted {document}");
            }
            if collection_map.is_empty() {
                store.remove(&parent);
            }
        }

        Ok(WriteResult::new(Utc::now()))
    }
}

/// Builder for constructing [`InMemoryClient`] instances.
///
/// Seed documents are stored as given, with no sentinel processing.
///
/// # Example
///
/// ```ignore
/// use docbind_memory::InMemoryClient;
/// use docbind_core::client::StoreClientBuilder;
///
/// let client = InMemoryClient::builder()
///     .with_document(CollectionPath::root("users").document("alice"), doc! { "name": "Alice" })
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryClientBuilder {
    documents: Vec<(DocumentPath, Document)>,
}

impl InMemoryClientBuilder {
    pub fn with_document(mut self, path: DocumentPath, document: Document) -> Self {
        self.documents.push((path, document));
        self
    }
}

#[async_trait]
impl StoreClientBuilder for InMemoryClientBuilder {
    type Client = InMemoryClient;

    /// Builds a client holding the seed documents; later seeds for the same path win.
    async fn build(self) -> StoreResult<Self::Client> {
        let mut store = StoreMap::new();

        for (path, document) in self.documents {
            store
                .entry(path.parent())
                .or_default()
                .insert(path.id().to_string(), document);
        }

        Ok(InMemoryClient {
            store: Arc::new(RwLock::new(store)),
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::{Bson, doc};
    use docbind_core::{
        client::NativeQuery,
        query::{Direction, FilterOp},
        value::FieldValue,
    };

    use super::*;

    fn alice() -> DocumentPath {
        CollectionPath::root("users").document("alice")
    }

    async fn seeded() -> InMemoryClient {
        InMemoryClient::builder()
            .with_document(alice(), doc! { "name": "alice", "age": 31 })
            .with_document(CollectionPath::root("users").document("bob"), doc! { "name": "bob", "age": 25 })
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn get_of_missing_document_is_an_empty_snapshot() {
        let client = InMemoryClient::new();

        let snapshot = client.get(&alice()).await.unwrap();

        assert!(!snapshot.exists());
        assert_eq!(snapshot.id(), "alice");
    }

    #[tokio::test]
    async fn add_generates_distinct_ids() {
        let client = InMemoryClient::new();
        let users = CollectionPath::root("users");

        let first = client.add(&users, WriteData::from(doc! { "n": 1 })).await.unwrap();
        let second = client.add(&users, WriteData::from(doc! { "n": 2 })).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(first.parent(), users);
        assert_eq!(client.document_count(&users).await, 2);
        assert_eq!(client.get(&first).await.unwrap().into_data(), Some(doc! { "n": 1 }));
    }

    #[tokio::test]
    async fn set_overwrites_and_merges() {
        let client = seeded().await;

        client
            .set(&alice(), WriteData::from(doc! { "name": "Alice" }), &SetOptions::default())
            .await
            .unwrap();
        assert_eq!(client.get(&alice()).await.unwrap().into_data(), Some(doc! { "name": "Alice" }));

        client
            .set(&alice(), WriteData::from(doc! { "age": 32 }), &SetOptions::merge_all())
            .await
            .unwrap();
        assert_eq!(
            client.get(&alice()).await.unwrap().into_data(),
            Some(doc! { "name": "Alice", "age": 32 })
        );
    }

    #[tokio::test]
    async fn failed_merge_leaves_document_untouched() {
        let client = seeded().await;

        let result = client
            .set(&alice(), WriteData::from(doc! { "name": "x" }), &SetOptions::merge_fields(["age"]))
            .await;

        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert_eq!(
            client.get(&alice()).await.unwrap().into_data(),
            Some(doc! { "name": "alice", "age": 31 })
        );
    }

    #[tokio::test]
    async fn rejected_set_creates_no_collection() {
        let client = InMemoryClient::new();

        let result = client
            .set(&alice(), WriteData::new().with("name", FieldValue::delete()), &SetOptions::default())
            .await;

        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert!(client.list_collections().await.is_empty());
    }

    #[tokio::test]
    async fn lists_only_collections_with_documents() {
        let client = seeded().await;
        let posts = alice().collection("posts");
        let post = client.add(&posts, WriteData::from(doc! { "title": "hi" })).await.unwrap();

        assert_eq!(client.list_collections().await, [CollectionPath::root("users"), posts]);

        client.delete(&post).await.unwrap();
        assert_eq!(client.list_collections().await, [CollectionPath::root("users")]);
    }

    #[tokio::test]
    async fn update_requires_an_existing_document() {
        let client = InMemoryClient::new();

        let result = client.update(&alice(), WriteData::new().with("age", 1)).await;

        assert_eq!(result, Err(StoreError::NotFound("users/alice".into())));
    }

    #[tokio::test]
    async fn update_applies_sentinels() {
        let client = seeded().await;

        let result = client
            .update(
                &alice(),
                WriteData::new()
                    .with("age", FieldValue::increment(1))
                    .with("seen_at", FieldValue::server_timestamp()),
            )
            .await
            .unwrap();

        let data = client.get(&alice()).await.unwrap().into_data().unwrap();
        assert_eq!(data.get("age"), Some(&Bson::Int32(32)));
        assert_eq!(
            data.get("seen_at"),
            Some(&Bson::DateTime(bson::DateTime::from_chrono(result.update_time)))
        );
    }

    #[tokio::test]
    async fn rejected_update_leaves_document_untouched() {
        let client = seeded().await;

        let result = client
            .update(
                &alice(),
                WriteData::new().with("profile.city", "Lisbon").with("profile", doc! {}),
            )
            .await;

        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert_eq!(
            client.get(&alice()).await.unwrap().into_data(),
            Some(doc! { "name": "alice", "age": 31 })
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let client = seeded().await;

        client.delete(&alice()).await.unwrap();
        client.delete(&alice()).await.unwrap();

        assert!(!client.get(&alice()).await.unwrap().exists());
    }

    #[tokio::test]
    async fn sub_collections_are_independent_of_their_parent() {
        let client = seeded().await;
        let posts = alice().collection("posts");

        client.add(&posts, WriteData::from(doc! { "title": "hi" })).await.unwrap();
        client.delete(&alice()).await.unwrap();

        assert_eq!(client.document_count(&posts).await, 1);
        assert_eq!(client.document_count(&CollectionPath::root("users")).await, 1);
    }

    #[tokio::test]
    async fn runs_queries_over_one_collection() {
        let client = seeded().await;
        let users = CollectionPath::root("users");

        let snapshot = client
            .run_query(
                client
                    .query(&users)
                    .filter("age", FilterOp::GreaterThan, Bson::Int32(20))
                    .order_by("age", Direction::Descending),
            )
            .await
            .unwrap();

        let ids = snapshot.documents().iter().map(|doc| doc.id()).collect::<Vec<_>>();
        assert_eq!(ids, ["alice", "bob"]);
        assert!(client.run_query(client.query(&alice().collection("posts"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let client = InMemoryClient::new();
        let clone = client.clone();

        clone
            .set(&alice(), WriteData::from(doc! { "name": "alice" }), &SetOptions::default())
            .await
            .unwrap();

        assert!(client.get(&alice()).await.unwrap().exists());
    }
}
