//! Harvest configuration, constructed once by the caller and handed to the
//! engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::site::SiteProfile;

/// Default wait for an element to appear.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default pause after a successful wait or action.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Default upper bound on items examined in one harvest.
pub const DEFAULT_MAX_ITEMS: usize = 500;

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// How long a wait polls before giving up.
    pub wait_timeout: Duration,
    /// Pause after a successful wait or interaction.
    pub settle_delay: Duration,
    /// Gap between probes inside a wait.
    pub poll_interval: Duration,
    /// Budget for spotting a dismissible overlay before an interaction.
    pub overlay_probe_timeout: Duration,
    /// Budget for a freshly opened asset context to leave the blank page.
    pub asset_resolution_timeout: Duration,
    /// Budget for finding the load-more trigger.
    pub growth_probe_timeout: Duration,
    /// Gap between list-length checks while waiting for growth.
    pub growth_poll_interval: Duration,
    /// Number of list-length checks before the list counts as exhausted.
    pub growth_poll_attempts: u32,
    /// Cap on items examined, regardless of outcome.
    pub max_items: usize,
    /// Where downloaded assets land.
    pub asset_dir: PathBuf,
    /// Where diagnostic snapshots land.
    pub snapshot_dir: PathBuf,
    pub site: SiteProfile,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: Duration::from_millis(100),
            overlay_probe_timeout: Duration::from_millis(100),
            asset_resolution_timeout: Duration::from_secs(10),
            growth_probe_timeout: Duration::from_secs(5),
            growth_poll_interval: Duration::from_secs(1),
            growth_poll_attempts: 10,
            max_items: DEFAULT_MAX_ITEMS,
            asset_dir: PathBuf::from("output/assets"),
            snapshot_dir: PathBuf::from("output/snapshots"),
            site: SiteProfile::default(),
        }
    }
}

impl HarvestConfig {
    /// A configuration with every delay collapsed to zero and every budget
    /// shrunk to a couple of probes. Used by tests and dry runs against
    /// in-memory surfaces.
    pub fn immediate() -> Self {
        Self {
            wait_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            overlay_probe_timeout: Duration::ZERO,
            asset_resolution_timeout: Duration::ZERO,
            growth_probe_timeout: Duration::ZERO,
            growth_poll_interval: Duration::ZERO,
            growth_poll_attempts: 2,
            ..Self::default()
        }
    }
}
