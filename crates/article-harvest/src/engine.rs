//! The outer harvest loop.
//!
//! Submits the query, enumerates cards, and walks them through the
//! extractor until the date cutoff is crossed, the list stops growing, or
//! the item cap is hit. Per-card failures are logged and skipped; anything
//! failing outside a single card aborts after a best-effort snapshot.

use chrono::{Local, NaiveDate};

use crate::config::HarvestConfig;
use crate::cutoff::DateCutoffPolicy;
use crate::extractor::ItemExtractor;
use crate::interaction::InteractionGuard;
use crate::locator::{MatchCondition, QueryLocator};
use crate::pagination::PaginationController;
use crate::surface::{AssetTransfer, ElementHandle, Surface, SurfaceError};
use crate::types::{HarvestError, HarvestReport, HarvestResult, HarvestWindow, StopReason};
use crate::wait::WaitRetriever;

pub struct HarvestEngine<S: Surface, A: AssetTransfer> {
    surface: S,
    assets: A,
    config: HarvestConfig,
    waiter: WaitRetriever,
    guard: InteractionGuard,
    extractor: ItemExtractor,
    policy: DateCutoffPolicy,
}

impl<S: Surface, A: AssetTransfer> HarvestEngine<S, A> {
    pub fn new(surface: S, assets: A, config: HarvestConfig) -> Self {
        Self {
            waiter: WaitRetriever::from_config(&config),
            guard: InteractionGuard::from_config(&config),
            extractor: ItemExtractor::new(&config),
            policy: DateCutoffPolicy::new(),
            surface,
            assets,
            config,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Give the surface back, e.g. to shut the browser down.
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Size the viewport and load the site's search page.
    pub async fn open_session(&self) -> HarvestResult<()> {
        if let Err(e) = self.load_start_page().await {
            return Err(self.fatal("session_error", e.into_session_failure()).await);
        }
        tracing::info!("opened {}", self.config.site.start_url);
        Ok(())
    }

    /// Harvest everything published within the last `months` months.
    pub async fn harvest(&self, query: &str, months: u32) -> HarvestResult<HarvestReport> {
        self.harvest_within(query, HarvestWindow::starting_now(months))
            .await
    }

    /// Harvest against an explicit, already-anchored window.
    pub async fn harvest_within(
        &self,
        query: &str,
        window: HarvestWindow,
    ) -> HarvestResult<HarvestReport> {
        tracing::info!(
            "searching for {query:?}, keeping items since {}",
            window.lower_bound().date()
        );

        let (list, mut cards) = match self.submit_search(query).await {
            Ok(found) => found,
            Err(e) => return Err(self.fatal("search_error", e).await),
        };
        let card_locator = self.card_locator();
        let mut pager = PaginationController::from_config(cards.len(), &self.config);
        tracing::info!("going through {} cards", cards.len());

        let mut records = Vec::new();
        let mut latest_seen: Option<NaiveDate> = None;
        let mut examined = 0;
        let mut skipped = 0;

        let stop_reason = loop {
            if let Some(latest) = latest_seen {
                if !self.policy.is_within_window(latest, &window) {
                    break StopReason::CutoffReached;
                }
            }

            if pager.take_growth_request() {
                if let Err(e) = self.load_more().await {
                    return Err(self.fatal("load_more_error", e).await);
                }
            }

            let Some(index) = pager.next_index() else {
                break StopReason::Exhausted;
            };
            if examined >= self.config.max_items {
                tracing::warn!("stopping after {examined} items (max_items)");
                break StopReason::MaxItemsReached;
            }
            examined += 1;
            tracing::info!("on card {index}");

            match self
                .extractor
                .extract(&self.surface, &self.assets, &cards[index], query)
                .await
            {
                Ok(record) => {
                    latest_seen = Some(record.published_date);
                    if self.policy.is_within_window(record.published_date, &window) {
                        tracing::debug!(
                            "card {index}: {:?} ({})",
                            record.title,
                            record.published_date
                        );
                        records.push(record);
                    } else {
                        tracing::debug!(
                            "card {index} published {} is outside the window",
                            record.published_date
                        );
                    }
                }
                Err(e) if e.is_item_local() => {
                    tracing::warn!("failed to process card {index}, skipping: {e}");
                    skipped += 1;
                }
                Err(e) => return Err(self.fatal("card_error", e).await),
            }

            if pager.at_end() {
                let requery = || {
                    self.waiter
                        .retrieve(&self.surface, Some(&list), &card_locator)
                };
                match pager.await_growth(requery).await {
                    Ok(Some(grown)) => {
                        tracing::debug!("list grew to {} cards", grown.len());
                        cards = grown;
                    }
                    Ok(None) => {
                        tracing::info!(
                            "no further cards after {} checks",
                            self.config.growth_poll_attempts
                        );
                        break StopReason::Exhausted;
                    }
                    Err(e) => return Err(self.fatal("pagination_error", e).await),
                }
            }
        };

        tracing::info!(
            "search complete for {query:?}: {} records, {examined} examined, {skipped} skipped ({stop_reason:?})",
            records.len()
        );
        Ok(HarvestReport {
            query: query.to_string(),
            window,
            records,
            stop_reason,
            items_examined: examined,
            items_skipped: skipped,
        })
    }

    async fn load_start_page(&self) -> Result<(), SurfaceError> {
        let (width, height) = self.config.site.viewport;
        self.surface.set_viewport(width, height).await?;
        self.surface.navigate(&self.config.site.start_url).await
    }

    fn card_locator(&self) -> QueryLocator {
        self.config.site.card.when(MatchCondition::AllPresent)
    }

    /// Type the query into the search input and wait for the first batch.
    async fn submit_search(&self, query: &str) -> HarvestResult<(S::Handle, Vec<S::Handle>)> {
        let site = &self.config.site;
        let input = self
            .waiter
            .retrieve_one(&self.surface, None, &site.search_input)
            .await?;
        self.guard.click(&self.surface, &input).await?;
        self.guard
            .perform(&self.surface, || input.type_text(query))
            .await?;
        self.guard
            .perform(&self.surface, || input.press_enter())
            .await?;

        let list = self
            .waiter
            .retrieve_one(&self.surface, None, &site.result_list)
            .await?;
        let cards = self
            .waiter
            .retrieve(&self.surface, Some(&list), &self.card_locator())
            .await?;
        Ok((list, cards))
    }

    /// Ask the list to grow. A missing trigger means the site has nothing
    /// more to offer and is not an error.
    async fn load_more(&self) -> HarvestResult<()> {
        let locator = self.config.site.load_more.when(MatchCondition::Clickable);
        let probe = self
            .waiter
            .with_timeout(self.config.growth_probe_timeout);
        match probe.probe(&self.surface, None, &locator).await? {
            Some(button) => {
                self.guard.click(&self.surface, &button).await?;
                tracing::debug!("requested more cards");
            }
            None => tracing::info!("no more cards to load"),
        }
        Ok(())
    }

    /// Capture a snapshot for diagnosis, then hand back the error.
    async fn fatal(&self, label: &str, error: HarvestError) -> HarvestError {
        tracing::error!("harvest aborted: {error}");
        let path = self.config.snapshot_dir.join(format!(
            "{label}-{}.png",
            Local::now().format("%Y%m%d-%H%M%S")
        ));
        match self.surface.snapshot(&path).await {
            Ok(()) => tracing::info!("saved snapshot to {}", path.display()),
            Err(e) => tracing::warn!("could not save snapshot: {e}"),
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        mount_search_page, CardFixture, RecordingAssetTransfer, ScriptedElement, ScriptedSurface,
    };
    use chrono::{Duration, NaiveDateTime};

    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        anchor().date() - Duration::days(days)
    }

    fn engine(surface: &ScriptedSurface) -> HarvestEngine<ScriptedSurface, RecordingAssetTransfer> {
        HarvestEngine::new(
            surface.clone(),
            RecordingAssetTransfer::new(),
            HarvestConfig::immediate(),
        )
    }

    #[tokio::test]
    async fn test_open_session_sizes_and_navigates() {
        let surface = ScriptedSurface::new();
        let engine = engine(&surface);
        engine.open_session().await.unwrap();
        assert_eq!(surface.viewports(), vec![(1024, 768)]);
        assert_eq!(surface.navigations(), vec![engine.config().site.start_url.clone()]);
    }

    #[tokio::test]
    async fn test_unreachable_start_page_is_session_failure_with_snapshot() {
        let surface = ScriptedSurface::new();
        surface.fail("navigate");
        let err = engine(&surface).open_session().await.unwrap_err();
        assert!(matches!(err, HarvestError::SessionFailure { .. }));
        assert!(!err.is_item_local());
        let snapshots = surface.snapshots();
        assert_eq!(snapshots.len(), 1);
        let name = snapshots[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_error-"));
    }

    #[tokio::test]
    async fn test_viewport_failure_skips_navigation() {
        let surface = ScriptedSurface::new();
        surface.fail("set_viewport");
        let err = engine(&surface).open_session().await.unwrap_err();
        assert!(matches!(err, HarvestError::SessionFailure { .. }));
        assert!(surface.navigations().is_empty());
        assert_eq!(surface.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_submits_query_through_search_input() {
        let surface = ScriptedSurface::new();
        let site = HarvestConfig::default().site;
        let (input, list) = mount_search_page(&surface, &site);
        surface.mount_card(&site, &list, &CardFixture::dated(1, days_ago(1)));

        let report = engine(&surface)
            .harvest_within("subway", HarvestWindow::anchored_at(anchor(), 1))
            .await
            .unwrap();
        assert_eq!(input.clicks(), 1);
        assert_eq!(input.typed(), vec!["subway".to_string()]);
        assert_eq!(input.enters(), 1);
        assert_eq!(report.records.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_search_input_is_fatal_with_snapshot() {
        let surface = ScriptedSurface::new();
        let err = engine(&surface)
            .harvest_within("subway", HarvestWindow::anchored_at(anchor(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::ElementNotFound { .. }));
        let snapshots = surface.snapshots();
        assert_eq!(snapshots.len(), 1);
        let name = snapshots[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("search_error-"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_max_items_caps_examined_cards() {
        let surface = ScriptedSurface::new();
        let site = HarvestConfig::default().site;
        let (_, list) = mount_search_page(&surface, &site);
        for n in 1..=4 {
            surface.mount_card(&site, &list, &CardFixture::dated(n, days_ago(n as i64)));
        }

        let mut config = HarvestConfig::immediate();
        config.max_items = 2;
        let engine = HarvestEngine::new(surface.clone(), RecordingAssetTransfer::new(), config);
        let report = engine
            .harvest_within("story", HarvestWindow::anchored_at(anchor(), 1))
            .await
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::MaxItemsReached);
        assert_eq!(report.items_examined, 2);
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_load_more_click_is_fatal() {
        let surface = ScriptedSurface::new();
        let site = HarvestConfig::default().site;
        let (_, list) = mount_search_page(&surface, &site);
        surface.mount_card(&site, &list, &CardFixture::dated(1, days_ago(1)));
        surface.place(&site.load_more, ScriptedElement::new().failing("click"));

        let err = engine(&surface)
            .harvest_within("story", HarvestWindow::anchored_at(anchor(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::InteractionFailed { .. }));
        assert_eq!(surface.snapshots().len(), 1);
    }
}
