//! Core data types for a harvest run: records, the cutoff window, the run
//! report, and the error taxonomy.

use chrono::{Local, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::locator::QueryLocator;

/// Sentinel stored as the asset name when the asset never left the blank
/// placeholder location.
pub const ASSET_NAME_UNRESOLVED: &str = "failed to retrieve image name";

/// One harvested item, built by the extractor from a single card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub title: String,
    pub description: String,
    pub published_date: NaiveDate,
    /// Source URL of the card's image as rendered in the list.
    pub asset_reference: String,
    /// File name the asset was saved under, or [`ASSET_NAME_UNRESOLVED`].
    pub asset_local_name: String,
    /// Non-overlapping, case-sensitive occurrences of the query in title + description.
    pub phrase_count: usize,
    pub has_currency_mention: bool,
}

impl ItemRecord {
    /// Whether the asset was resolved and requested for download.
    pub fn asset_resolved(&self) -> bool {
        self.asset_local_name != ASSET_NAME_UNRESOLVED
    }
}

/// The retention window of a harvest, fixed at harvest start.
///
/// The lower bound is computed once in the constructor; walking items takes
/// real wall-clock time and the bound must not drift while it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarvestWindow {
    anchor: NaiveDateTime,
    retention_months: u32,
    lower_bound: NaiveDateTime,
}

impl HarvestWindow {
    /// Anchor a window at the current local time.
    pub fn starting_now(retention_months: u32) -> Self {
        Self::anchored_at(Local::now().naive_local(), retention_months)
    }

    /// Anchor a window at an explicit instant.
    pub fn anchored_at(anchor: NaiveDateTime, retention_months: u32) -> Self {
        let lower_bound = anchor
            .checked_sub_months(Months::new(retention_months))
            .unwrap_or(NaiveDateTime::MIN);
        Self {
            anchor,
            retention_months,
            lower_bound,
        }
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn retention_months(&self) -> u32 {
        self.retention_months
    }

    /// Inclusive lower bound: `anchor - retention`.
    pub fn lower_bound(&self) -> NaiveDateTime {
        self.lower_bound
    }
}

/// Why the outer harvest loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// An item dated before the window's lower bound was reached.
    CutoffReached,
    /// The list stopped growing and every known item was consumed.
    Exhausted,
    /// The configured item cap was hit.
    MaxItemsReached,
}

/// Outcome of one harvest call.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub query: String,
    pub window: HarvestWindow,
    /// Records inside the window, in encounter order.
    pub records: Vec<ItemRecord>,
    pub stop_reason: StopReason,
    pub items_examined: usize,
    pub items_skipped: usize,
}

/// All errors that can occur during a harvest.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("element not found: {locator}")]
    ElementNotFound { locator: QueryLocator },

    #[error("interaction failed: {cause}")]
    InteractionFailed { cause: String },

    #[error("no published date in {text:?}")]
    DateParseFailed { text: String },

    #[error("asset did not resolve away from the blank placeholder: {reference}")]
    AssetResolutionTimeout { reference: String },

    #[error("attribute `{attribute}` missing on {locator}")]
    AttributeMissing {
        attribute: String,
        locator: QueryLocator,
    },

    #[error("asset transfer failed for {reference}: {cause}")]
    AssetTransfer { reference: String, cause: String },

    #[error("session failure: {cause}")]
    SessionFailure { cause: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Errors that only spoil the item being extracted. The engine logs these
    /// and moves on to the next card.
    pub fn is_item_local(&self) -> bool {
        !matches!(self, HarvestError::SessionFailure { .. } | HarvestError::Io(_))
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_window_lower_bound_is_calendar_months() {
        let window = HarvestWindow::anchored_at(at(2024, 3, 31, 12), 1);
        // chrono clamps to the last valid day of the shorter month
        assert_eq!(window.lower_bound(), at(2024, 2, 29, 12));
        assert_eq!(window.anchor(), at(2024, 3, 31, 12));
        assert_eq!(window.retention_months(), 1);
    }

    #[test]
    fn test_window_is_fixed_once_built() {
        let window = HarvestWindow::starting_now(2);
        let first = window.lower_bound();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(window.lower_bound(), first);
    }

    #[test]
    fn test_item_local_classification() {
        assert!(HarvestError::InteractionFailed {
            cause: "stale".into()
        }
        .is_item_local());
        assert!(HarvestError::DateParseFailed { text: "x".into() }.is_item_local());
        assert!(!HarvestError::SessionFailure {
            cause: "gone".into()
        }
        .is_item_local());
    }

    #[test]
    fn test_unresolved_asset_flag() {
        let record = ItemRecord {
            title: "t".into(),
            description: "d".into(),
            published_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            asset_reference: "https://img/x.jpg".into(),
            asset_local_name: ASSET_NAME_UNRESOLVED.into(),
            phrase_count: 0,
            has_currency_mention: false,
        };
        assert!(!record.asset_resolved());
    }
}
