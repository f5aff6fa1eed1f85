//! Nullable image host: records uploads, hands out fake content ids.

use async_trait::async_trait;
use std::sync::Mutex;

use market_gateway::pinata::ipfs_url;
use market_gateway::{GatewayError, ImageFile, ImageHost};
use market_types::ContentId;

#[derive(Default)]
struct State {
    uploads: Vec<ImageFile>,
    failure: Option<GatewayError>,
}

/// An image host that keeps uploads in memory.
#[derive(Default)]
pub struct NullImageHost {
    state: Mutex<State>,
}

impl NullImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail with `error`.
    pub fn fail_uploads(&self, error: GatewayError) {
        self.lock().failure = Some(error);
    }

    /// Files uploaded so far (for assertions).
    pub fn uploads(&self) -> Vec<ImageFile> {
        self.lock().uploads.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.lock().uploads.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageHost for NullImageHost {
    async fn upload(&self, file: &ImageFile) -> Result<ContentId, GatewayError> {
        let mut state = self.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        state.uploads.push(file.clone());
        Ok(ContentId::new(format!("bafynull{}", state.uploads.len())))
    }

    fn content_url(&self, cid: &ContentId) -> Result<String, GatewayError> {
        ipfs_url("ipfs.null", cid)
    }
}
