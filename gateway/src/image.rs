//! The image hosting seam.

use async_trait::async_trait;

use market_types::ContentId;

use crate::error::GatewayError;

/// A file picked or dropped by the user, ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Content-addressed storage for product images.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `file` and return its content identifier.
    async fn upload(&self, file: &ImageFile) -> Result<ContentId, GatewayError>;

    /// Public URL under which `cid` can be fetched.
    fn content_url(&self, cid: &ContentId) -> Result<String, GatewayError>;
}
