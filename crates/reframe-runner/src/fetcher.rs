use bytes::Bytes;
use reframe_core::AttachmentRef;
use reframe_service::{DownloadError, Downloader, HostStore, ServiceError};
use tracing::debug;

/// An attachment paired with the URL its bytes can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    pub attachment: AttachmentRef,
    pub url: String,
}

/// Turns attachment descriptors into bytes: one URL resolution round trip
/// per record, then one download per attachment.
pub struct AttachmentFetcher<'a> {
    store: &'a dyn HostStore,
    downloader: &'a dyn Downloader,
}

impl<'a> AttachmentFetcher<'a> {
    pub fn new(store: &'a dyn HostStore, downloader: &'a dyn Downloader) -> Self {
        Self { store, downloader }
    }

    /// Resolve all `attachments` of one cell in a single call, keeping order.
    pub async fn resolve(
        &self,
        record_id: &str,
        field_id: &str,
        attachments: Vec<AttachmentRef>,
    ) -> Result<Vec<ResolvedAttachment>, ServiceError> {
        if attachments.is_empty() {
            return Ok(vec![]);
        }
        let tokens: Vec<String> = attachments.iter().map(|a| a.token.clone()).collect();
        let urls = self
            .store
            .resolve_attachment_urls(&tokens, field_id, record_id)
            .await?;
        if urls.len() != attachments.len() {
            return Err(ServiceError::Internal(format!(
                "url resolution returned {} url(s) for {} attachment(s)",
                urls.len(),
                attachments.len()
            )));
        }
        debug!("resolved {} url(s) for record {record_id}", urls.len());
        Ok(attachments
            .into_iter()
            .zip(urls)
            .map(|(attachment, url)| ResolvedAttachment { attachment, url })
            .collect())
    }

    pub async fn download(&self, url: &str) -> Result<Bytes, DownloadError> {
        self.downloader.download(url).await
    }
}
