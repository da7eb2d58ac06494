//! Per-card extraction: fields, derived signals, the asset, and the
//! published date from the linked article.
//!
//! Deep fields only render after navigation, so the asset and the article are
//! opened in secondary viewing contexts. Whatever happens inside an
//! extraction, every context it opened is closed and the primary context is
//! current again when it returns.

use std::path::PathBuf;

use crate::config::HarvestConfig;
use crate::cutoff::DateCutoffPolicy;
use crate::locator::{MatchCondition, QueryLocator};
use crate::signals;
use crate::site::SiteProfile;
use crate::surface::{AssetTransfer, ElementHandle, Surface, ViewingContextHandle};
use crate::types::{HarvestError, HarvestResult, ItemRecord, ASSET_NAME_UNRESOLVED};
use crate::wait::WaitRetriever;

#[derive(Debug, Clone)]
pub struct ItemExtractor {
    site: SiteProfile,
    waiter: WaitRetriever,
    asset_wait: WaitRetriever,
    asset_dir: PathBuf,
    policy: DateCutoffPolicy,
}

/// Secondary contexts opened during one extraction and not yet closed.
#[derive(Default)]
struct OpenContexts(Vec<ViewingContextHandle>);

impl OpenContexts {
    async fn open<S: Surface>(&mut self, surface: &S, url: &str) -> HarvestResult<ViewingContextHandle> {
        let context = surface.open_context(url).await?;
        self.0.push(context.clone());
        Ok(context)
    }

    async fn close<S: Surface>(&mut self, surface: &S, context: ViewingContextHandle) -> HarvestResult<()> {
        self.0.retain(|c| c != &context);
        surface.close_context(context).await?;
        Ok(())
    }
}

impl ItemExtractor {
    pub fn new(config: &HarvestConfig) -> Self {
        let waiter = WaitRetriever::from_config(config);
        Self {
            site: config.site.clone(),
            waiter,
            asset_wait: waiter
                .with_timeout(config.asset_resolution_timeout)
                .without_settle(),
            asset_dir: config.asset_dir.clone(),
            policy: DateCutoffPolicy::new(),
        }
    }

    /// Extract one card into a record.
    ///
    /// Errors are item-local unless the surface could not be returned to the
    /// primary context afterwards, which is a session failure.
    pub async fn extract<S, A>(
        &self,
        surface: &S,
        assets: &A,
        card: &S::Handle,
        query: &str,
    ) -> HarvestResult<ItemRecord>
    where
        S: Surface,
        A: AssetTransfer,
    {
        let primary = surface.primary_context();
        let mut open = OpenContexts::default();
        let result = self
            .extract_fields(surface, assets, card, query, &primary, &mut open)
            .await;
        self.restore(surface, &primary, open).await?;
        result
    }

    async fn extract_fields<S, A>(
        &self,
        surface: &S,
        assets: &A,
        card: &S::Handle,
        query: &str,
        primary: &ViewingContextHandle,
        open: &mut OpenContexts,
    ) -> HarvestResult<ItemRecord>
    where
        S: Surface,
        A: AssetTransfer,
    {
        // 1. asset
        let image = self
            .waiter
            .retrieve_one(surface, Some(card), &self.site.card_image)
            .await?;
        let asset_reference = required_attribute(&image, "src", &self.site.card_image).await?;
        let asset_local_name = self
            .fetch_asset(surface, assets, &asset_reference, primary, open)
            .await?;

        // 2. open the article early; its date renders last
        let link = self
            .waiter
            .retrieve_one(surface, Some(card), &self.site.card_link)
            .await?;
        let href = required_attribute(&link, "href", &self.site.card_link).await?;
        let article = open.open(surface, &href).await?;

        // 3. card text and signals
        let title = self
            .waiter
            .retrieve_one(surface, Some(card), &self.site.card_title)
            .await?
            .text()
            .await?;
        let description = self
            .waiter
            .retrieve_one(surface, Some(card), &self.site.card_description)
            .await?
            .text()
            .await?;
        let combined = format!("{title}{description}");
        let phrase_count = signals::phrase_count(&combined, query);
        let has_currency_mention = signals::has_currency_mention(&combined);

        // 4. published date from the article
        surface.switch_to(&article).await?;
        let published_date = self.read_published_date(surface).await?;
        open.close(surface, article).await?;
        surface.switch_to(primary).await?;

        Ok(ItemRecord {
            title,
            description,
            published_date,
            asset_reference,
            asset_local_name,
            phrase_count,
            has_currency_mention,
        })
    }

    /// Open the asset, wait for it to leave the blank placeholder, and
    /// request the download. A placeholder that never resolves is not an
    /// error; the record keeps the sentinel name instead.
    async fn fetch_asset<S, A>(
        &self,
        surface: &S,
        assets: &A,
        reference: &str,
        primary: &ViewingContextHandle,
        open: &mut OpenContexts,
    ) -> HarvestResult<String>
    where
        S: Surface,
        A: AssetTransfer,
    {
        let context = open.open(surface, reference).await?;
        surface.switch_to(&context).await?;

        let blank = self.site.blank_location.as_str();
        let resolved = self
            .asset_wait
            .poll_until(move || async move {
                matches!(surface.current_location().await, Ok(location) if location != blank)
            })
            .await;

        let name = if resolved {
            let location = surface.current_location().await?;
            match self.site.asset_local_name(&location) {
                Some(name) => {
                    let destination = self.asset_dir.join(&name);
                    assets.download(reference, &destination).await.map_err(|e| {
                        HarvestError::AssetTransfer {
                            reference: reference.to_string(),
                            cause: e.to_string(),
                        }
                    })?;
                    tracing::debug!("requested asset {reference} -> {}", destination.display());
                    name
                }
                None => {
                    tracing::warn!("no usable file name in asset location {location}");
                    ASSET_NAME_UNRESOLVED.to_string()
                }
            }
        } else {
            let downgraded = HarvestError::AssetResolutionTimeout {
                reference: reference.to_string(),
            };
            tracing::warn!("{downgraded}; keeping the record without its asset");
            ASSET_NAME_UNRESOLVED.to_string()
        };

        open.close(surface, context).await?;
        surface.switch_to(primary).await?;
        Ok(name)
    }

    /// Read the published line once its text has stopped changing.
    async fn read_published_date<S: Surface>(&self, surface: &S) -> HarvestResult<chrono::NaiveDate> {
        let locator = &self.site.published_date;
        let element = self.waiter.retrieve_one(surface, None, locator).await?;
        let shown = element.text().await?;
        self.waiter
            .retrieve(surface, None, &locator.when(MatchCondition::TextEquals(shown)))
            .await?;
        let content = element.text_content().await?;
        self.policy.parse(&content)
    }

    /// Close anything left open and get back to the primary context.
    async fn restore<S: Surface>(
        &self,
        surface: &S,
        primary: &ViewingContextHandle,
        open: OpenContexts,
    ) -> HarvestResult<()> {
        for context in open.0 {
            if let Err(e) = surface.close_context(context.clone()).await {
                tracing::warn!("could not close {context}: {e}");
            }
        }
        let current = surface
            .current_context()
            .await
            .map_err(|e| e.into_session_failure())?;
        if &current != primary {
            surface
                .switch_to(primary)
                .await
                .map_err(|e| e.into_session_failure())?;
        }
        Ok(())
    }
}

async fn required_attribute<H: ElementHandle>(
    element: &H,
    name: &str,
    locator: &QueryLocator,
) -> HarvestResult<String> {
    element
        .attribute(name)
        .await?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| HarvestError::AttributeMissing {
            attribute: name.to_string(),
            locator: locator.clone(),
        })
}
