//! HTTP asset transfer wrapping reqwest.
//!
//! Retries once or twice on 5xx and backs off on 429; anything else that is
//! not a success fails the download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use article_harvest::{AssetTransfer, SurfaceError};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

const MAX_RETRIES: u32 = 2;

#[derive(Clone)]
pub struct HttpAssetTransfer {
    client: reqwest::Client,
}

impl HttpAssetTransfer {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, source: &str) -> Result<Vec<u8>, SurfaceError> {
        let mut retries = 0u32;
        loop {
            let resp = self
                .client
                .get(source)
                .send()
                .await
                .map_err(|e| SurfaceError::new("download", e.to_string()))?;
            let status = resp.status();

            if status.is_server_error() && retries < MAX_RETRIES {
                retries += 1;
                tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(retries - 1))).await;
                continue;
            }

            if status.as_u16() == 429 && retries < MAX_RETRIES {
                retries += 1;
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                continue;
            }

            if !status.is_success() {
                return Err(SurfaceError::new("download", format!("{source} returned {status}")));
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| SurfaceError::new("download", e.to_string()))?;
            return Ok(body.to_vec());
        }
    }
}

impl Default for HttpAssetTransfer {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl AssetTransfer for HttpAssetTransfer {
    async fn download(&self, source: &str, destination: &Path) -> Result<(), SurfaceError> {
        let bytes = self.fetch(source).await?;
        if let Some(dir) = destination.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SurfaceError::new("download", format!("{}: {e}", dir.display())))?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| SurfaceError::new("download", format!("{}: {e}", destination.display())))?;
        tracing::debug!("saved {} bytes to {}", bytes.len(), destination.display());
        Ok(())
    }
}
