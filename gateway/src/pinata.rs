//! Pinata v3 file upload client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use market_types::ContentId;

use crate::error::GatewayError;
use crate::image::{ImageFile, ImageHost};

pub const DEFAULT_UPLOAD_URL: &str = "https://uploads.pinata.cloud/v3/files";
pub const DEFAULT_GATEWAY_HOST: &str = "ipfs.io";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
struct UploadResponse {
    data: UploadedFile,
}

#[derive(Deserialize)]
struct UploadedFile {
    cid: String,
}

/// Uploads images to Pinata's public network and resolves them through an
/// IPFS gateway host.
#[derive(Clone)]
pub struct PinataImageHost {
    http: reqwest::Client,
    jwt: String,
    upload_url: String,
    gateway_host: String,
}

impl PinataImageHost {
    pub fn new(jwt: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            jwt: jwt.into(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            gateway_host: DEFAULT_GATEWAY_HOST.to_string(),
        })
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Gateway host name, e.g. `ipfs.io` or `example.mypinata.cloud`.
    pub fn with_gateway_host(mut self, host: impl Into<String>) -> Self {
        self.gateway_host = host.into();
        self
    }

    pub fn gateway_host(&self) -> &str {
        &self.gateway_host
    }
}

#[async_trait]
impl ImageHost for PinataImageHost {
    async fn upload(&self, file: &ImageFile) -> Result<ContentId, GatewayError> {
        if file.bytes.is_empty() {
            return Err(GatewayError::Upload(format!("{} is empty", file.file_name)));
        }

        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| GatewayError::Upload(format!("invalid content type: {e}")))?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("network", "public");

        tracing::debug!(file = %file.file_name, size = file.bytes.len(), "uploading image");

        let response = self
            .http
            .post(&self.upload_url)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upload(format!("HTTP {status}: {body}")));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("invalid upload response: {e}")))?;
        let cid = ContentId::new(parsed.data.cid);
        if cid.is_empty() {
            return Err(GatewayError::Upload("upload returned no content id".into()));
        }
        tracing::info!(%cid, "image pinned");
        Ok(cid)
    }

    fn content_url(&self, cid: &ContentId) -> Result<String, GatewayError> {
        ipfs_url(&self.gateway_host, cid)
    }
}

/// `https://{host}/ipfs/{cid}`. A scheme on `host` is tolerated.
pub fn ipfs_url(host: &str, cid: &ContentId) -> Result<String, GatewayError> {
    if cid.is_empty() {
        return Err(GatewayError::Upload("empty content id".into()));
    }
    let host = host
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if host.is_empty() {
        return Err(GatewayError::Upload("no gateway host configured".into()));
    }
    Ok(format!("https://{host}/ipfs/{}", cid.as_str()))
}
