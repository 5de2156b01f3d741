use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use reframe_core::{AttachmentRef, ProcessedFile, RecordOutcome, TransformSpec};
use reframe_service::{Downloader, HostStore, ServiceError};
use reframe_transform::ImageTransformer;
use tracing::{debug, error, info, warn};

use crate::error::ItemError;
use crate::fetcher::{AttachmentFetcher, ResolvedAttachment};

pub const NO_ATTACHMENT: &str = "no attachment found";
pub const NO_VALID_IMAGE: &str = "no valid image to process";
pub const WRITE_REJECTED: &str = "destination write rejected";

/// What happened to one attachment of a record.
#[derive(Debug)]
pub enum ItemEvent {
    Processed {
        name: String,
        output_name: String,
        size_bytes: usize,
    },
    NotImage {
        name: String,
    },
    Failed {
        name: String,
        error: ItemError,
    },
}

/// Outcome of a record plus the per-attachment events that led to it.
#[derive(Debug)]
pub struct RecordReport {
    pub outcome: RecordOutcome,
    pub items: Vec<ItemEvent>,
}

/// Runs the download → transform → upload pipeline for one record.
pub struct RecordProcessor<'a> {
    store: &'a dyn HostStore,
    fetcher: AttachmentFetcher<'a>,
    transformer: &'a dyn ImageTransformer,
}

impl<'a> RecordProcessor<'a> {
    pub fn new(
        store: &'a dyn HostStore,
        downloader: &'a dyn Downloader,
        transformer: &'a dyn ImageTransformer,
    ) -> Self {
        Self {
            store,
            fetcher: AttachmentFetcher::new(store, downloader),
            transformer,
        }
    }

    /// Process one record. Never fails: store errors become a `Failed`
    /// outcome, attachment errors become `ItemEvent::Failed`.
    pub async fn process(
        &self,
        record_index: usize,
        record_id: &str,
        source_field: &str,
        target_field: &str,
        spec: &TransformSpec,
    ) -> RecordReport {
        let mut items = Vec::new();
        let outcome = match self
            .try_process(record_index, record_id, source_field, target_field, spec, &mut items)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("record {record_id} failed: {e}");
                RecordOutcome::failed(record_index, record_id, e.to_string())
            }
        };
        RecordReport { outcome, items }
    }

    async fn try_process(
        &self,
        record_index: usize,
        record_id: &str,
        source_field: &str,
        target_field: &str,
        spec: &TransformSpec,
        items: &mut Vec<ItemEvent>,
    ) -> Result<RecordOutcome, ServiceError> {
        let attachments = self
            .store
            .read_attachment_cell(record_id, source_field)
            .await?;
        if attachments.is_empty() {
            debug!("record {record_id}: empty source cell");
            return Ok(RecordOutcome::skipped(record_index, record_id, NO_ATTACHMENT));
        }

        let (images, others): (Vec<AttachmentRef>, Vec<AttachmentRef>) =
            attachments.into_iter().partition(|a| a.is_image());
        for other in others {
            info!(
                "record {record_id}: ignoring non-image {} ({})",
                other.name,
                other.mime_hint()
            );
            items.push(ItemEvent::NotImage { name: other.name });
        }

        let resolved = self.fetcher.resolve(record_id, source_field, images).await?;

        let mut files = Vec::with_capacity(resolved.len());
        for attachment in &resolved {
            match self.process_attachment(attachment, spec).await {
                Ok(file) => {
                    items.push(ItemEvent::Processed {
                        name: attachment.attachment.name.clone(),
                        output_name: file.name.clone(),
                        size_bytes: file.size_bytes(),
                    });
                    files.push(file);
                }
                Err(error) => {
                    warn!(
                        "record {record_id}: {} failed: {error}",
                        attachment.attachment.name
                    );
                    items.push(ItemEvent::Failed {
                        name: attachment.attachment.name.clone(),
                        error,
                    });
                }
            }
        }

        if files.is_empty() {
            return Ok(RecordOutcome::skipped(record_index, record_id, NO_VALID_IMAGE));
        }

        let count = files.len();
        if self
            .store
            .write_attachment_cell(record_id, target_field, files)
            .await?
        {
            info!("record {record_id}: wrote {count} file(s) to {target_field}");
            Ok(RecordOutcome::success(
                record_index,
                record_id,
                format!("{count} image(s) written"),
            ))
        } else {
            warn!("record {record_id}: {WRITE_REJECTED}");
            Ok(RecordOutcome::failed(record_index, record_id, WRITE_REJECTED))
        }
    }

    async fn process_attachment(
        &self,
        resolved: &ResolvedAttachment,
        spec: &TransformSpec,
    ) -> Result<ProcessedFile, ItemError> {
        let bytes = self.fetcher.download(&resolved.url).await?;
        // A decoder panic stays scoped to this attachment.
        let output = panic::catch_unwind(AssertUnwindSafe(|| self.transformer.transform(&bytes, spec)))
            .map_err(|payload| ItemError::Panicked(panic_message(payload.as_ref())))??;
        Ok(ProcessedFile::jpeg(resolved.attachment.output_name(spec), output))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
