//! Wait-and-retrieve: poll a surface until a locator's condition holds.
//!
//! This is the only place where "slow to render" and "not there at all" are
//! told apart, and the only tool for that is the timeout. A failed probe is
//! treated like an empty one; a wait fails exactly once, when its budget runs
//! out, with [`HarvestError::ElementNotFound`].

use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::HarvestConfig;
use crate::locator::{MatchCondition, QueryLocator};
use crate::surface::{ElementHandle, Surface};
use crate::types::{HarvestError, HarvestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRetriever {
    timeout: Duration,
    settle_delay: Duration,
    poll_interval: Duration,
}

impl WaitRetriever {
    pub fn new(timeout: Duration, settle_delay: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            settle_delay,
            poll_interval,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.wait_timeout,
            config.settle_delay,
            config.poll_interval,
        )
    }

    /// Same retriever with a different timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self { timeout, ..*self }
    }

    /// Same retriever without the post-success pause.
    pub fn without_settle(&self) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            ..*self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until `locator` is satisfied under `root` (or the whole current
    /// context). Never returns an empty list.
    pub async fn retrieve<S: Surface>(
        &self,
        surface: &S,
        root: Option<&S::Handle>,
        locator: &QueryLocator,
    ) -> HarvestResult<Vec<S::Handle>> {
        let start = Instant::now();
        loop {
            match surface.find(root, locator).await {
                Ok(found) => {
                    if let Some(matched) = satisfy(found, &locator.condition).await {
                        tokio::time::sleep(self.settle_delay).await;
                        return Ok(matched);
                    }
                }
                Err(e) => tracing::debug!("probe for {locator} failed, treating as absent: {e}"),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(HarvestError::ElementNotFound {
                    locator: locator.clone(),
                });
            }
            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    /// Like [`retrieve`](Self::retrieve) but yields the first match only.
    pub async fn retrieve_one<S: Surface>(
        &self,
        surface: &S,
        root: Option<&S::Handle>,
        locator: &QueryLocator,
    ) -> HarvestResult<S::Handle> {
        self.retrieve(surface, root, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::ElementNotFound {
                locator: locator.clone(),
            })
    }

    /// For callers that expect absence: a timeout becomes `None`.
    pub async fn probe<S: Surface>(
        &self,
        surface: &S,
        root: Option<&S::Handle>,
        locator: &QueryLocator,
    ) -> HarvestResult<Option<S::Handle>> {
        match self.retrieve_one(surface, root, locator).await {
            Ok(handle) => Ok(Some(handle)),
            Err(HarvestError::ElementNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll an arbitrary check within this retriever's budget. Returns
    /// whether the check passed before the timeout. No settle delay.
    pub async fn poll_until<F, Fut>(&self, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        loop {
            if check().await {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return false;
            }
            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }
}

async fn satisfy<H: ElementHandle>(found: Vec<H>, condition: &MatchCondition) -> Option<Vec<H>> {
    match condition {
        MatchCondition::Present => found.into_iter().next().map(|h| vec![h]),
        MatchCondition::AllPresent => (!found.is_empty()).then_some(found),
        MatchCondition::Clickable => {
            for handle in found {
                if handle.is_interactable().await.unwrap_or(false) {
                    return Some(vec![handle]);
                }
            }
            None
        }
        MatchCondition::TextEquals(expected) => {
            for handle in found {
                if matches!(handle.text().await, Ok(text) if text == *expected) {
                    return Some(vec![handle]);
                }
            }
            None
        }
    }
}
