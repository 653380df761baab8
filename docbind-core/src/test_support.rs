//! A client that records every call, for exercising handles and builders in isolation.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::Utc;

use crate::{
    client::{NativeQuery, StoreClient},
    error::{StoreError, StoreResult},
    path::{CollectionPath, DocumentPath},
    query::{CursorAnchor, Direction, FilterOp},
    snapshot::{DocumentSnapshot, QuerySnapshot, WriteResult},
    value::{SetOptions, WriteData},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedWrite {
    Add(CollectionPath, WriteData),
    Set(DocumentPath, WriteData, SetOptions),
    Update(DocumentPath, WriteData),
    Delete(DocumentPath),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    Filter(String, FilterOp, Bson),
    OrderBy(String, Direction),
    Limit(usize),
    LimitToLast(usize),
    StartAt(CursorAnchor),
    StartAfter(CursorAnchor),
    EndAt(CursorAnchor),
    EndBefore(CursorAnchor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub collection: CollectionPath,
    pub calls: Vec<NativeCall>,
}

impl RecordedQuery {
    fn push(mut self, call: NativeCall) -> Self {
        self.calls.push(call);
        self
    }
}

impl NativeQuery for RecordedQuery {
    fn filter(self, field: &str, op: FilterOp, value: Bson) -> Self {
        self.push(NativeCall::Filter(field.to_string(), op, value))
    }

    fn order_by(self, field: &str, direction: Direction) -> Self {
        self.push(NativeCall::OrderBy(field.to_string(), direction))
    }

    fn limit(self, count: usize) -> Self {
        self.push(NativeCall::Limit(count))
    }

    fn limit_to_last(self, count: usize) -> Self {
        self.push(NativeCall::LimitToLast(count))
    }

    fn start_at(self, anchor: CursorAnchor) -> Self {
        self.push(NativeCall::StartAt(anchor))
    }

    fn start_after(self, anchor: CursorAnchor) -> Self {
        self.push(NativeCall::StartAfter(anchor))
    }

    fn end_at(self, anchor: CursorAnchor) -> Self {
        self.push(NativeCall::EndAt(anchor))
    }

    fn end_before(self, anchor: CursorAnchor) -> Self {
        self.push(NativeCall::EndBefore(anchor))
    }
}

#[derive(Debug, Default)]
pub struct RecordingClient {
    documents: BTreeMap<DocumentPath, Document>,
    results: Vec<DocumentSnapshot>,
    failure: Option<StoreError>,
    writes: Mutex<Vec<RecordedWrite>>,
    queries: AtomicUsize,
}

impl RecordingClient {
    /// Every query returns `results`, whatever its constraints.
    pub fn with_results(results: Vec<DocumentSnapshot>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Every call fails with `error`.
    pub fn failing(error: StoreError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn with_document(mut self, path: DocumentPath, data: Document) -> Self {
        self.documents.insert(path, data);
        self
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn queries_run(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn record(&self, write: RecordedWrite) -> StoreResult<WriteResult> {
        self.check()?;
        self.writes.lock().unwrap().push(write);
        Ok(WriteResult::new(Utc::now()))
    }
}

#[async_trait]
impl StoreClient for RecordingClient {
    type Query = RecordedQuery;

    fn query(&self, collection: &CollectionPath) -> RecordedQuery {
        RecordedQuery {
            collection: collection.clone(),
            calls: Vec::new(),
        }
    }

    async fn run_query(&self, _query: RecordedQuery) -> StoreResult<QuerySnapshot> {
        self.check()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(QuerySnapshot::new(self.results.clone()))
    }

    async fn get(&self, document: &DocumentPath) -> StoreResult<DocumentSnapshot> {
        self.check()?;
        Ok(DocumentSnapshot::new(
            document.clone(),
            self.documents.get(document).cloned(),
        ))
    }

    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<DocumentPath> {
        self.record(RecordedWrite::Add(collection.clone(), data))?;
        Ok(collection.document("generated"))
    }

    async fn set(
        &self,
        document: &DocumentPath,
        data: WriteData,
        options: &SetOptions,
    ) -> StoreResult<WriteResult> {
        self.record(RecordedWrite::Set(document.clone(), data, options.clone()))
    }

    async fn update(&self, document: &DocumentPath, data: WriteData) -> StoreResult<WriteResult> {
        self.record(RecordedWrite::Update(document.clone(), data))
    }

    async fn delete(&self, document: &DocumentPath) -> StoreResult<WriteResult> {
        self.record(RecordedWrite::Delete(document.clone()))
    }
}
