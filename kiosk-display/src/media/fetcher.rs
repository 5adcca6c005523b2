//! Media fetching
//!
//! [`MediaFetcher`] is the seam between the preloader/controller and the
//! network. [`HttpFetcher`] is the production implementation on reqwest.

use crate::error::{Error, Result};
use crate::media::handle::{AudioHandle, ImageHandle};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// Source of image and audio resources
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch and validate an image
    ///
    /// # Returns
    /// * `Ok(ImageHandle)` - bytes fetched and header decoded
    /// * `Err(_)` - transport failure, non-success status, or undecodable bytes
    async fn fetch_image(&self, location: &str) -> Result<ImageHandle>;

    /// Start fetching audio
    ///
    /// Returns the handle immediately; bytes keep arriving in the background.
    /// Transport errors surface through the handle's status, never here.
    /// Must be called from within a Tokio runtime.
    fn open_audio(&self, location: &str) -> AudioHandle;
}

/// reqwest-backed fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kiosk-display/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, location: &str) -> Result<reqwest::Response> {
        let fetch_err = |reason: String| Error::Fetch {
            location: location.to_string(),
            reason,
        };

        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch_image(&self, location: &str) -> Result<ImageHandle> {
        debug!("Fetching image {}", location);
        let bytes = self
            .get(location)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Fetch {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
        ImageHandle::decode(location, bytes.to_vec())
    }

    fn open_audio(&self, location: &str) -> AudioHandle {
        debug!("Opening audio {}", location);
        let handle = AudioHandle::new(location);
        let fetcher = self.clone();
        let target = handle.clone();

        tokio::spawn(async move {
            let location = target.location().to_string();
            let response = match fetcher.get(&location).await {
                Ok(response) => response,
                Err(e) => {
                    target.fail(e.to_string());
                    return;
                }
            };

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => target.append(&chunk),
                    Err(e) => {
                        target.fail(format!("stream interrupted: {}", e));
                        return;
                    }
                }
            }
            target.finish();
        });

        handle
    }
}
