//! In-memory `HostStore` and `Downloader` for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reframe_core::{AttachmentField, AttachmentRef, ProcessedFile};

use crate::{DownloadError, Downloader, HostStore, ServiceError};

/// One call to `write_attachment_cell` as seen by the mock.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub record_id: String,
    pub field_id: String,
    pub files: Vec<ProcessedFile>,
}

enum Cell {
    Attachments(Vec<AttachmentRef>),
    Broken(String),
}

/// A host store whose records, cells and write acknowledgment are scripted
/// up front. Every write and URL resolution is recorded.
pub struct MockHostStore {
    records: Vec<String>,
    fields: Vec<AttachmentField>,
    cells: HashMap<(String, String), Cell>,
    acknowledge_writes: bool,
    writes: Mutex<Vec<WriteCall>>,
    resolve_calls: Mutex<Vec<Vec<String>>>,
}

impl Default for MockHostStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHostStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            fields: Vec::new(),
            cells: HashMap::new(),
            acknowledge_writes: true,
            writes: Mutex::new(Vec::new()),
            resolve_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_field(mut self, field_id: &str, display_name: &str) -> Self {
        self.fields.push(AttachmentField {
            field_id: field_id.to_string(),
            display_name: display_name.to_string(),
        });
        self
    }

    /// Add a record with no attachments anywhere.
    pub fn with_record(mut self, record_id: &str) -> Self {
        self.add_record(record_id);
        self
    }

    /// Add (or extend) a record with the given cell content.
    /// Attachment tokens are `<record_id>:<name>`.
    pub fn with_cell(mut self, record_id: &str, field_id: &str, names: &[&str]) -> Self {
        self.add_record(record_id);
        let refs = names
            .iter()
            .map(|name| AttachmentRef::new(format!("{record_id}:{name}"), *name))
            .collect();
        self.cells.insert(
            (record_id.to_string(), field_id.to_string()),
            Cell::Attachments(refs),
        );
        self
    }

    /// Make reading this cell fail with `ServiceError::Internal(message)`.
    pub fn with_broken_cell(mut self, record_id: &str, field_id: &str, message: &str) -> Self {
        self.add_record(record_id);
        self.cells.insert(
            (record_id.to_string(), field_id.to_string()),
            Cell::Broken(message.to_string()),
        );
        self
    }

    /// Acknowledge every write with `false`.
    pub fn rejecting_writes(mut self) -> Self {
        self.acknowledge_writes = false;
        self
    }

    fn add_record(&mut self, record_id: &str) {
        if !self.records.iter().any(|r| r == record_id) {
            self.records.push(record_id.to_string());
        }
    }

    /// URL the mock hands out for a token.
    pub fn url_for(token: &str) -> String {
        format!("mock://{token}")
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn resolve_calls(&self) -> Vec<Vec<String>> {
        self.resolve_calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HostStore for MockHostStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_record_ids(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.records.clone())
    }

    async fn list_attachment_fields(&self) -> Result<Vec<AttachmentField>, ServiceError> {
        Ok(self.fields.clone())
    }

    async fn read_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
    ) -> Result<Vec<AttachmentRef>, ServiceError> {
        if !self.records.iter().any(|r| r == record_id) {
            return Err(ServiceError::NotFound(format!("record {record_id}")));
        }
        match self.cells.get(&(record_id.to_string(), field_id.to_string())) {
            Some(Cell::Attachments(refs)) => Ok(refs.clone()),
            Some(Cell::Broken(msg)) => Err(ServiceError::Internal(msg.clone())),
            None => Ok(vec![]),
        }
    }

    async fn resolve_attachment_urls(
        &self,
        tokens: &[String],
        _field_id: &str,
        _record_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        if let Ok(mut calls) = self.resolve_calls.lock() {
            calls.push(tokens.to_vec());
        }
        Ok(tokens.iter().map(|t| Self::url_for(t)).collect())
    }

    async fn write_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        files: Vec<ProcessedFile>,
    ) -> Result<bool, ServiceError> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(WriteCall {
                record_id: record_id.to_string(),
                field_id: field_id.to_string(),
                files,
            });
        }
        Ok(self.acknowledge_writes)
    }
}

/// A downloader serving scripted responses keyed by URL.
/// Unknown URLs answer "404 Not Found".
#[derive(Default)]
pub struct MockDownloader {
    responses: HashMap<String, Result<Bytes, String>>,
    requests: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for the attachment `<record_id>:<name>` of a `MockHostStore`.
    pub fn with_blob(mut self, record_id: &str, name: &str, data: impl Into<Bytes>) -> Self {
        self.responses.insert(
            MockHostStore::url_for(&format!("{record_id}:{name}")),
            Ok(data.into()),
        );
        self
    }

    /// Answer the attachment `<record_id>:<name>` with a non-success status.
    pub fn with_status(mut self, record_id: &str, name: &str, status: &str) -> Self {
        self.responses.insert(
            MockHostStore::url_for(&format!("{record_id}:{name}")),
            Err(status.to_string()),
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(&self, url: &str) -> Result<Bytes, DownloadError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        match self.responses.get(url) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(status)) => Err(DownloadError::Status(status.clone())),
            None => Err(DownloadError::Status("404 Not Found".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cells_and_records_are_scripted() {
        let store = MockHostStore::new()
            .with_field("src", "Photos")
            .with_cell("r1", "src", &["a.jpg"])
            .with_record("r2")
            .with_broken_cell("r3", "src", "boom");

        assert_eq!(store.list_record_ids().await.unwrap(), vec!["r1", "r2", "r3"]);
        assert_eq!(
            store.read_attachment_cell("r1", "src").await.unwrap(),
            vec![AttachmentRef::new("r1:a.jpg", "a.jpg")]
        );
        assert!(store.read_attachment_cell("r2", "src").await.unwrap().is_empty());
        assert!(store.read_attachment_cell("r3", "src").await.is_err());
        assert!(matches!(
            store.read_attachment_cell("r9", "src").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_are_recorded_and_acknowledged() {
        let store = MockHostStore::new().with_record("r1");
        let ack = store
            .write_attachment_cell("r1", "dst", vec![ProcessedFile::jpeg("a_1x1.jpg".into(), vec![1u8])])
            .await
            .unwrap();
        assert!(ack);
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.writes()[0].files[0].name, "a_1x1.jpg");

        let rejecting = MockHostStore::new().rejecting_writes();
        assert!(!rejecting.write_attachment_cell("r1", "dst", vec![]).await.unwrap());
    }

    #[tokio::test]
    async fn downloader_serves_scripted_blobs() {
        let dl = MockDownloader::new()
            .with_blob("r1", "a.jpg", vec![7u8])
            .with_status("r1", "b.jpg", "500 Internal Server Error");

        let ok = dl.download(&MockHostStore::url_for("r1:a.jpg")).await.unwrap();
        assert_eq!(ok.as_ref(), &[7u8]);
        let err = dl.download(&MockHostStore::url_for("r1:b.jpg")).await.unwrap_err();
        assert_eq!(err.to_string(), "download failed: 500 Internal Server Error");
        assert!(dl.download("mock://nothing").await.is_err());
        assert_eq!(dl.requests().len(), 3);
    }
}
