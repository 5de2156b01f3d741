use async_trait::async_trait;
use reframe_core::{AttachmentField, AttachmentRef, ProcessedFile};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The tabular host data store the pipeline reads from and writes to.
///
/// The pipeline programs against this trait.
/// `HttpHostStore` talks to a remote store over REST.
/// `LocalHostStore` maps records and fields onto a directory tree.
#[async_trait]
pub trait HostStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Check that the store is reachable.
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    // -- Schema --
    async fn list_record_ids(&self) -> Result<Vec<String>, ServiceError>;
    async fn list_attachment_fields(&self) -> Result<Vec<AttachmentField>, ServiceError>;

    // -- Cells --

    /// Attachments in one cell. An empty cell yields an empty vec.
    async fn read_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
    ) -> Result<Vec<AttachmentRef>, ServiceError>;

    /// Turn attachment tokens into retrieval URLs, same order and length.
    async fn resolve_attachment_urls(
        &self,
        tokens: &[String],
        field_id: &str,
        record_id: &str,
    ) -> Result<Vec<String>, ServiceError>;

    /// Replace the content of a cell. `Ok(false)` means the store accepted
    /// the call but did not write anything.
    async fn write_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        files: Vec<ProcessedFile>,
    ) -> Result<bool, ServiceError>;
}
