//! Guarded interactions: dismiss a transient overlay, act, then settle.

use std::future::Future;
use std::time::Duration;

use crate::config::HarvestConfig;
use crate::locator::QueryLocator;
use crate::surface::{ElementHandle, Surface, SurfaceError};
use crate::types::{HarvestError, HarvestResult};
use crate::wait::WaitRetriever;

#[derive(Debug, Clone)]
pub struct InteractionGuard {
    overlay_close: QueryLocator,
    overlay_probe: WaitRetriever,
    settle_delay: Duration,
}

impl InteractionGuard {
    pub fn new(overlay_close: QueryLocator, overlay_probe: WaitRetriever, settle_delay: Duration) -> Self {
        Self {
            overlay_close,
            overlay_probe,
            settle_delay,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        let overlay_probe = WaitRetriever::from_config(config)
            .with_timeout(config.overlay_probe_timeout)
            .without_settle();
        Self::new(config.site.overlay_close.clone(), overlay_probe, config.settle_delay)
    }

    /// Run `action` after a best-effort overlay dismissal.
    ///
    /// Nothing in the dismissal step can fail the call. A failing action
    /// surfaces as [`HarvestError::InteractionFailed`].
    pub async fn perform<S, F, Fut>(&self, surface: &S, action: F) -> HarvestResult<()>
    where
        S: Surface,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), SurfaceError>>,
    {
        self.dismiss_overlay(surface).await;

        action()
            .await
            .map_err(|e| HarvestError::InteractionFailed {
                cause: e.to_string(),
            })?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    /// Click a resolved element under the guard.
    pub async fn click<S: Surface>(&self, surface: &S, element: &S::Handle) -> HarvestResult<()> {
        self.perform(surface, || element.click()).await
    }

    async fn dismiss_overlay<S: Surface>(&self, surface: &S) {
        match self.overlay_probe.probe(surface, None, &self.overlay_close).await {
            Ok(Some(close)) => {
                if let Err(e) = close.click().await {
                    tracing::debug!("overlay close button did not respond: {e}");
                } else {
                    tracing::debug!("dismissed overlay");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("overlay probe failed: {e}"),
        }
    }
}
