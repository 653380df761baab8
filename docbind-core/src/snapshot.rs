//! Results returned by the store: document snapshots, query snapshots and write results.

use bson::Document;
use chrono::{DateTime, Utc};

use crate::path::DocumentPath;

/// The state of a single document at the time it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    path: DocumentPath,
    data: Option<Document>,
}

impl DocumentSnapshot {
    pub fn new(path: DocumentPath, data: Option<Document>) -> Self {
        Self { path, data }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// The decoded document fields, or `None` if the document does not exist.
    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Document> {
        self.data
    }
}

/// The ordered results of running a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

/// Store-assigned metadata for a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub update_time: DateTime<Utc>,
}

impl WriteResult {
    pub fn new(update_time: DateTime<Utc>) -> Self {
        Self { update_time }
    }
}
