//! Immutable partial-update builder for a single document.
//!
//! An [`UpdateBuilder`] accumulates field-path operations without touching the
//! store. Each operation method returns a new builder; the one it was called on is
//! unchanged. [`UpdateBuilder::commit`] sends everything as one atomic update.
//!
//! ```ignore
//! let outcome = users
//!     .update("alice")
//!     .increment("visits", 1)
//!     .array_union("tags", ["beta"])
//!     .server_timestamp("seen_at")
//!     .set_field("profile.city", "Lisbon")
//!     .commit()
//!     .await?;
//! ```
//!
//! A builder should be committed once: committing it again re-applies any
//! increments and array unions it carries.

use std::sync::Arc;

use bson::Bson;

use crate::{
    chain::Chain,
    client::StoreClient,
    error::StoreResult,
    path::DocumentPath,
    snapshot::WriteResult,
    value::{FieldValue, Numeric, Sentinel, WriteData},
};

/// What [`UpdateBuilder::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// One update call was made and the store accepted it.
    Committed(WriteResult),
    /// The builder held no operations, so the store was not called.
    NoOp,
}

impl CommitOutcome {
    pub fn write_result(&self) -> Option<&WriteResult> {
        match self {
            CommitOutcome::Committed(result) => Some(result),
            CommitOutcome::NoOp => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, CommitOutcome::NoOp)
    }
}

#[derive(Debug)]
pub struct UpdateBuilder<C: StoreClient> {
    client: Arc<C>,
    document: DocumentPath,
    operations: Chain<(String, FieldValue)>,
}

impl<C: StoreClient> Clone for UpdateBuilder<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            document: self.document.clone(),
            operations: self.operations.clone(),
        }
    }
}

impl<C: StoreClient> UpdateBuilder<C> {
    pub fn new(client: Arc<C>, document: DocumentPath) -> Self {
        Self {
            client,
            document,
            operations: Chain::new(),
        }
    }

    pub fn document(&self) -> &DocumentPath {
        &self.document
    }

    fn with(&self, path: impl Into<String>, value: FieldValue) -> Self {
        Self {
            client: Arc::clone(&self.client),
            document: self.document.clone(),
            operations: self.operations.push((path.into(), value)),
        }
    }

    /// Overwrites the field at `path` (dotted for nested fields) with `value`.
    pub fn set_field(&self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.with(path, FieldValue::Value(value.into()))
    }

    pub fn delete_field(&self, path: impl Into<String>) -> Self {
        self.with(path, FieldValue::Sentinel(Sentinel::Delete))
    }

    pub fn increment(&self, path: impl Into<String>, delta: impl Into<Numeric>) -> Self {
        self.with(path, FieldValue::increment(delta))
    }

    pub fn array_union(&self, path: impl Into<String>, elements: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.with(path, FieldValue::array_union(elements))
    }

    pub fn array_remove(&self, path: impl Into<String>, elements: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        self.with(path, FieldValue::array_remove(elements))
    }

    pub fn server_timestamp(&self, path: impl Into<String>) -> Self {
        self.with(path, FieldValue::server_timestamp())
    }

    /// The accumulated operations, one per field path; later operations on a path
    /// replace earlier ones.
    pub fn operations(&self) -> WriteData {
        self.operations
            .iter()
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Sends the accumulated operations as a single atomic update.
    ///
    /// With no operations recorded, returns [`CommitOutcome::NoOp`] without calling
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged, e.g. when the document does not exist.
    pub async fn commit(&self) -> StoreResult<CommitOutcome> {
        if self.operations.is_empty() {
            log::debug!("skipping update of {}: no operations recorded", self.document);
            return Ok(CommitOutcome::NoOp);
        }

        let data = self.operations();
        log::debug!("updating {} field(s) of {}", data.len(), self.document);

        Ok(CommitOutcome::Committed(
            self.client.update(&self.document, data).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        path::CollectionPath,
        test_support::{RecordedWrite, RecordingClient},
    };

    fn alice() -> DocumentPath {
        CollectionPath::root("users").document("alice")
    }

    #[tokio::test]
    async fn empty_commit_makes_no_store_call() {
        let client = Arc::new(RecordingClient::default());

        let outcome = UpdateBuilder::new(Arc::clone(&client), alice()).commit().await.unwrap();

        assert_eq!(outcome, CommitOutcome::NoOp);
        assert!(outcome.write_result().is_none());
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn last_write_to_a_path_wins() {
        let client = Arc::new(RecordingClient::default());

        let outcome = UpdateBuilder::new(Arc::clone(&client), alice())
            .set_field("count", 1)
            .set_field("count", 2)
            .commit()
            .await
            .unwrap();

        assert!(!outcome.is_noop());
        assert_eq!(
            client.writes(),
            vec![RecordedWrite::Update(alice(), WriteData::new().with("count", 2))]
        );
    }

    #[tokio::test]
    async fn increments_are_not_merged() {
        let client = Arc::new(RecordingClient::default());

        UpdateBuilder::new(Arc::clone(&client), alice())
            .increment("visits", 1)
            .increment("visits", 5)
            .commit()
            .await
            .unwrap();

        assert_eq!(
            client.writes(),
            vec![RecordedWrite::Update(
                alice(),
                WriteData::new().with("visits", FieldValue::increment(5))
            )]
        );
    }

    #[tokio::test]
    async fn commit_sends_every_operation_kind_once() {
        let client = Arc::new(RecordingClient::default());

        UpdateBuilder::new(Arc::clone(&client), alice())
            .set_field("profile.city", "Lisbon")
            .delete_field("legacy")
            .increment("score", 1.5)
            .array_union("tags", ["a", "b"])
            .array_remove("roles", ["guest"])
            .server_timestamp("seen_at")
            .commit()
            .await
            .unwrap();

        let expected = WriteData::new()
            .with("profile.city", "Lisbon")
            .with("legacy", FieldValue::delete())
            .with("score", FieldValue::increment(1.5))
            .with("tags", FieldValue::array_union(["a", "b"]))
            .with("roles", FieldValue::array_remove(["guest"]))
            .with("seen_at", FieldValue::server_timestamp());

        assert_eq!(client.writes(), vec![RecordedWrite::Update(alice(), expected)]);
    }

    #[test]
    fn operations_leave_the_original_builder_untouched() {
        let base = UpdateBuilder::new(Arc::new(RecordingClient::default()), alice())
            .set_field("name", "alice");
        let extended = base.increment("visits", 1);

        assert_eq!(base.operations().len(), 1);
        assert_eq!(extended.operations().len(), 2);
        assert!(!base.operations().contains_field("visits"));
    }

    #[tokio::test]
    async fn store_errors_propagate_unchanged() {
        let error = StoreError::NotFound("users/alice".into());
        let client = Arc::new(RecordingClient::failing(error.clone()));

        let result = UpdateBuilder::new(client, alice()).set_field("a", 1).commit().await;

        assert_eq!(result, Err(error));
    }
}
