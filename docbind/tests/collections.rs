use std::sync::Arc;

use docbind::{
    bson::{Bson, DateTime},
    memory::InMemoryClient,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl Document for User {
    fn collection_name() -> &'static str {
        "users"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Post {
    title: String,
    likes: i64,
}

impl Document for Post {
    fn collection_name() -> &'static str {
        "posts"
    }
}

type Posts = TypedCollection<InMemoryClient, Post>;

async fn client() -> Arc<InMemoryClient> {
    Arc::new(InMemoryClient::builder().build().await.unwrap())
}

fn user_schema() -> Arc<CollectionSchema<InMemoryClient>> {
    Arc::new(
        CollectionSchema::new()
            .with_default("status", "inactive")
            .with_server_timestamp("created_at")
            .with_sub_collection(
                "posts",
                SubCollectionSchema::new::<Posts>()
                    .with_schema(CollectionSchema::new().with_default("likes", 0_i64)),
            ),
    )
}

#[tokio::test]
async fn set_then_get_round_trips_with_server_fields() {
    let client = client().await;
    let users = CollectionHandle::root(Arc::clone(&client), "users", Some(user_schema()));

    let result = users.set("alice", doc! { "name": "alice", "age": 31 }).await.unwrap();
    let mut stored = users.get("alice").await.unwrap().unwrap();
    let created_at = stored.remove("created_at");

    assert_eq!(stored, doc! { "name": "alice", "age": 31, "status": "inactive" });
    assert_eq!(created_at, Some(Bson::DateTime(DateTime::from_chrono(result.update_time))));
}

#[tokio::test]
async fn reading_a_missing_document_is_none() {
    let client = client().await;
    let users = CollectionHandle::root(client, "users", None);

    assert_eq!(users.get("ghost").await, Ok(None));
    assert_eq!(users.doc("ghost").get().await, Ok(None));
}

#[tokio::test]
async fn merge_writes_do_not_introduce_defaults() {
    let client = client().await;
    let users = CollectionHandle::root(Arc::clone(&client), "users", Some(user_schema()));

    users
        .set_with_options("bob", doc! { "name": "bob" }, SetOptions::merge_all())
        .await
        .unwrap();

    assert_eq!(users.get("bob").await.unwrap(), Some(doc! { "name": "bob" }));
}

#[tokio::test]
async fn add_returns_a_reference_to_the_created_document() {
    let client = client().await;
    let users = CollectionHandle::root(Arc::clone(&client), "users", Some(user_schema()));

    let reference = users.add(doc! { "name": "carol", "status": "active" }).await.unwrap();

    assert_eq!(reference.parent(), CollectionPath::root("users"));
    let stored = reference.get().await.unwrap().unwrap();
    assert_eq!(stored.get("status"), Some(&Bson::String("active".into())));
    assert!(matches!(stored.get("created_at"), Some(Bson::DateTime(_))));

    reference.delete().await.unwrap();
    assert_eq!(reference.get().await, Ok(None));
}

#[tokio::test]
async fn typed_collections_convert_documents() {
    let client = client().await;
    let users: TypedCollection<InMemoryClient, User> =
        TypedCollection::open(Arc::clone(&client), Some(user_schema()));

    users
        .set("alice", &User { name: "alice".into(), status: None })
        .await
        .unwrap();

    assert_eq!(
        users.get("alice").await.unwrap(),
        Some(User { name: "alice".into(), status: Some("inactive".into()) })
    );
    assert_eq!(users.get("bob").await.unwrap(), None);
}

#[tokio::test]
async fn sub_collections_nest_under_the_parent_document() {
    let client = client().await;
    let users = CollectionHandle::root(Arc::clone(&client), "users", Some(user_schema()));

    let posts: Posts = users.sub_collection("alice", "posts").unwrap();
    posts
        .handle()
        .set("p1", doc! { "title": "hello" })
        .await
        .unwrap();

    assert_eq!(posts.handle().path().to_string(), "users/alice/posts");
    assert_eq!(
        posts.get("p1").await.unwrap(),
        Some(Post { title: "hello".into(), likes: 0 })
    );
    // The parent document itself was never written.
    assert_eq!(users.get("alice").await.unwrap(), None);
    assert_eq!(
        users.doc("alice").collection("posts").get("p1").await.unwrap(),
        Some(doc! { "title": "hello", "likes": 0_i64 })
    );
}

#[tokio::test]
async fn undeclared_sub_collections_fail_before_any_store_call() {
    let client = client().await;
    let users = CollectionHandle::root(Arc::clone(&client), "users", Some(user_schema()));

    let error = users.sub_collection::<Posts>("alice", "likes").unwrap_err();

    assert!(matches!(error, SchemaError::MissingSubCollection { .. }));
    assert!(error.to_string().contains("users"));
    assert!(error.to_string().contains("likes"));
    assert_eq!(client.document_count(&CollectionPath::root("users")).await, 0);
}

#[tokio::test]
async fn schemas_load_from_json_and_accept_registrations() {
    let client = client().await;
    let schema = CollectionSchema::from_json(json!({
        "fields": {
            "status": { "defaultValue": "inactive" },
            "created_at": { "defaultValue": "serverTimestamp" }
        },
        "subCollections": {
            "posts": { "schema": { "fields": { "likes": { "defaultValue": 0 } } } }
        }
    }))
    .unwrap();

    let unregistered = CollectionHandle::root(Arc::clone(&client), "users", Some(Arc::new(schema.clone())));
    assert!(matches!(
        unregistered.sub_collection::<Posts>("alice", "posts"),
        Err(SchemaError::MissingFactory { .. })
    ));

    let users = CollectionHandle::root(client, "users", Some(Arc::new(schema.register::<Posts>("posts"))));
    let posts: Posts = users.sub_collection("alice", "posts").unwrap();
    posts.handle().set("p1", doc! { "title": "t" }).await.unwrap();

    assert_eq!(posts.get("p1").await.unwrap(), Some(Post { title: "t".into(), likes: 0 }));
}
