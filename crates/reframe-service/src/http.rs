use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reframe_core::{AttachmentField, AttachmentRef, ProcessedFile};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{HostStore, ServiceError};

#[derive(Debug, Serialize)]
struct ResolveUrlsRequest<'a> {
    tokens: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ResolveUrlsResponse {
    urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WriteCellRequest {
    files: Vec<UploadFile>,
}

#[derive(Debug, Serialize)]
struct UploadFile {
    name: String,
    mime_type: String,
    /// Base64 (standard alphabet, padded).
    data: String,
}

#[derive(Debug, Deserialize)]
struct WriteCellResponse {
    written: bool,
}

/// Async HTTP client implementation of HostStore.
/// Connects to a host store exposing the `/api/records` REST contract.
pub struct HttpHostStore {
    base_url: String,
    client: Client,
    api_key: Option<String>,
}

impl HttpHostStore {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            api_key: None,
        }
    }

    pub fn with_api_key(base_url: &str, key: String) -> Self {
        Self {
            api_key: Some(key),
            ..Self::new(base_url)
        }
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    /// Record and field ids are opaque and may contain `/`, `?` or `#`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::InvalidInput(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidInput(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn cell_endpoint(&self, record_id: &str, field_id: &str) -> Result<Url, ServiceError> {
        self.endpoint(&["api", "records", record_id, "cells", field_id])
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let builder = self.client.get(url);
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self.client.post(url).json(body);
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }

    async fn put_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self.client.put(url).json(body);
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        ServiceError::NotFound(msg)
    } else if status == StatusCode::BAD_REQUEST {
        ServiceError::InvalidInput(msg)
    } else {
        ServiceError::Internal(format!("{status}: {msg}"))
    }
}

#[async_trait]
impl HostStore for HttpHostStore {
    fn name(&self) -> &str {
        "http"
    }

    /// Health endpoint is NOT authenticated.
    async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(self.endpoint(&["api", "health"])?)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    async fn list_record_ids(&self) -> Result<Vec<String>, ServiceError> {
        self.get_json(self.endpoint(&["api", "records"])?).await
    }

    async fn list_attachment_fields(&self) -> Result<Vec<AttachmentField>, ServiceError> {
        self.get_json(self.endpoint(&["api", "fields"])?).await
    }

    async fn read_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
    ) -> Result<Vec<AttachmentRef>, ServiceError> {
        let cell: Option<Vec<AttachmentRef>> =
            self.get_json(self.cell_endpoint(record_id, field_id)?).await?;
        Ok(cell.unwrap_or_default())
    }

    async fn resolve_attachment_urls(
        &self,
        tokens: &[String],
        field_id: &str,
        record_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let resp: ResolveUrlsResponse = self
            .post_json(
                self.endpoint(&["api", "records", record_id, "cells", field_id, "urls"])?,
                &ResolveUrlsRequest { tokens },
            )
            .await?;
        Ok(resp.urls)
    }

    async fn write_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        files: Vec<ProcessedFile>,
    ) -> Result<bool, ServiceError> {
        let body = WriteCellRequest {
            files: files
                .into_iter()
                .map(|f| UploadFile {
                    data: STANDARD.encode(&f.bytes),
                    name: f.name,
                    mime_type: f.mime_type.to_string(),
                })
                .collect(),
        };
        debug!(
            "uploading {} file(s) to record {record_id} field {field_id}",
            body.files.len()
        );
        let resp: WriteCellResponse = self
            .put_json(self.cell_endpoint(record_id, field_id)?, &body)
            .await?;
        Ok(resp.written)
    }
}
