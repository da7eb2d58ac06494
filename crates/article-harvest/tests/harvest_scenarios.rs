//! End-to-end harvest scenarios against the scripted surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use article_harvest::testing::{
    mount_search_page, CardFixture, RecordingAssetTransfer, ScriptedElement, ScriptedSurface,
};
use article_harvest::{
    HarvestConfig, HarvestEngine, HarvestError, HarvestWindow, SiteProfile, StopReason, ASSET_NAME_UNRESOLVED,
};

// ─────────────────────── helpers ───────────────────────

type Engine = HarvestEngine<ScriptedSurface, RecordingAssetTransfer>;

fn engine_with(surface: &ScriptedSurface, config: HarvestConfig) -> Engine {
    HarvestEngine::new(surface.clone(), RecordingAssetTransfer::new(), config)
}

fn engine(surface: &ScriptedSurface) -> Engine {
    engine_with(surface, HarvestConfig::immediate())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn days_ago(days: i64) -> NaiveDate {
    today() - chrono::Duration::days(days)
}

fn titles(records: &[article_harvest::ItemRecord]) -> Vec<String> {
    records.iter().map(|r| r.title.clone()).collect()
}

/// A search page with one card per date.
fn search_page(dates: &[NaiveDate]) -> (ScriptedSurface, SiteProfile, ScriptedElement) {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    let (_, list) = mount_search_page(&surface, &site);
    for (i, date) in dates.iter().enumerate() {
        surface.mount_card(&site, &list, &CardFixture::dated(i + 1, *date));
    }
    (surface, site, list)
}

// ─────────────────────── window and termination ───────────────────────

#[tokio::test]
async fn test_one_month_window_keeps_recent_items_and_exhausts() {
    let (surface, _, _) = search_page(&[today(), days_ago(10), days_ago(40)]);

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(titles(&report.records), vec!["Story 1", "Story 2"]);
    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.items_examined, 3);
    assert_eq!(report.items_skipped, 0);
}

#[tokio::test]
async fn test_stops_at_first_item_past_cutoff() {
    let (surface, _, _) = search_page(&[days_ago(1), days_ago(45), days_ago(2)]);

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(titles(&report.records), vec!["Story 1"]);
    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(report.items_examined, 2);
}

#[tokio::test]
async fn test_window_is_anchored_once() {
    let anchor = NaiveDate::from_ymd_opt(2024, 3, 31)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let window = HarvestWindow::anchored_at(anchor, 1);
    let (surface, _, _) = search_page(&[
        NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
    ]);

    let report = engine(&surface)
        .harvest_within("story", window)
        .await
        .unwrap();

    assert_eq!(titles(&report.records), vec!["Story 1", "Story 2"]);
    assert_eq!(report.window, window);
}

// ─────────────────────── failure isolation ───────────────────────

#[tokio::test]
async fn test_failed_item_is_skipped_and_order_kept() {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    let (_, list) = mount_search_page(&surface, &site);
    let broken = CardFixture::dated(2, days_ago(2));
    for fixture in [
        CardFixture::dated(1, days_ago(1)),
        broken.clone(),
        CardFixture::dated(3, days_ago(3)),
    ] {
        surface.mount_card(&site, &list, &fixture);
    }
    surface.fail_open(broken.link.clone());

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(titles(&report.records), vec!["Story 1", "Story 3"]);
    assert_eq!(report.items_skipped, 1);
    assert_eq!(report.items_examined, 3);
    assert_eq!(surface.open_contexts(), 1);
    assert_eq!(surface.current_id(), 0);
}

#[tokio::test]
async fn test_unparseable_date_does_not_escape() {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    let (_, list) = mount_search_page(&surface, &site);
    surface.mount_card(&site, &list, &CardFixture::new(1, "Updated 3 hours ago"));
    surface.mount_card(&site, &list, &CardFixture::dated(2, days_ago(1)));

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(titles(&report.records), vec!["Story 2"]);
    assert_eq!(report.items_skipped, 1);
}

#[tokio::test]
async fn test_unresolved_asset_keeps_record_with_sentinel() {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    let (_, list) = mount_search_page(&surface, &site);
    surface.mount_card(
        &site,
        &list,
        &CardFixture::dated(1, days_ago(1)).unresolved_image(),
    );
    surface.mount_card(&site, &list, &CardFixture::dated(2, days_ago(2)));

    let engine = engine(&surface);
    let report = engine.harvest("story", 1).await.unwrap();

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].asset_local_name, ASSET_NAME_UNRESOLVED);
    assert_eq!(report.records[1].asset_local_name, "story-2.jpg");
    assert_eq!(engine.assets().requests().len(), 1);
}

// ─────────────────────── pagination ───────────────────────

#[tokio::test]
async fn test_load_more_fires_once_per_growth_cycle() {
    let (surface, site, list) = search_page(&[days_ago(1), days_ago(2), days_ago(3)]);

    let grown = Arc::new(AtomicBool::new(false));
    let button = {
        let surface = surface.clone();
        let site = site.clone();
        let list = list.clone();
        let grown = grown.clone();
        ScriptedElement::new().on_click(move || {
            if !grown.swap(true, Ordering::SeqCst) {
                for n in 4..=5 {
                    surface.mount_card(&site, &list, &CardFixture::dated(n, days_ago(n as i64)));
                }
            }
        })
    };
    surface.place(&site.load_more, button.clone());

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(report.records.len(), 5);
    assert_eq!(report.stop_reason, StopReason::Exhausted);
    // one request for the initial batch, one for the grown batch
    assert_eq!(button.clicks(), 2);
}

#[tokio::test]
async fn test_missing_load_more_is_not_an_error() {
    let (surface, _, _) = search_page(&[days_ago(1), days_ago(2)]);

    let report = engine(&surface).harvest("story", 1).await.unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(surface.snapshots().is_empty());
}

#[tokio::test]
async fn test_list_vanishing_after_load_more_aborts_with_snapshot() {
    let (surface, site, list) = search_page(&[days_ago(1), days_ago(2)]);
    let button = {
        let site = site.clone();
        let list = list.clone();
        ScriptedElement::new().on_click(move || list.clear_children(&site.card))
    };
    surface.place(&site.load_more, button);

    let err = engine(&surface).harvest("story", 1).await.unwrap_err();

    assert!(matches!(err, HarvestError::ElementNotFound { .. }));
    let snapshots = surface.snapshots();
    assert_eq!(snapshots.len(), 1);
    let name = snapshots[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("pagination_error-"));
}

// ─────────────────────── waiting ───────────────────────

#[tokio::test]
async fn test_result_list_rendering_late_is_tolerated() {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    let input = ScriptedElement::new();
    let list = ScriptedElement::new();
    surface.place(&site.search_input, input);
    surface.place_after(&site.result_list, list.clone(), 3);
    surface.mount_card(&site, &list, &CardFixture::dated(1, days_ago(1)));

    let mut config = HarvestConfig::immediate();
    config.wait_timeout = Duration::from_secs(2);
    config.poll_interval = Duration::from_millis(1);
    let report = engine_with(&surface, config)
        .harvest("story", 1)
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert!(surface.probe_count(&site.result_list) >= 4);
}

#[tokio::test]
async fn test_missing_result_list_aborts_with_snapshot() {
    let surface = ScriptedSurface::new();
    let site = SiteProfile::default();
    surface.place(&site.search_input, ScriptedElement::new());

    let err = engine(&surface).harvest("story", 1).await.unwrap_err();

    assert!(matches!(err, HarvestError::ElementNotFound { .. }));
    assert_eq!(surface.snapshots().len(), 1);
}
