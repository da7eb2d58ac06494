//! Article Harvest: incremental harvesting of "load more" article lists with a date cutoff.

pub mod config;
pub mod cutoff;
pub mod engine;
pub mod extractor;
pub mod interaction;
pub mod locator;
pub mod pagination;
pub mod signals;
pub mod site;
pub mod surface;
pub mod testing;
pub mod types;
pub mod wait;

pub use config::HarvestConfig;
pub use cutoff::DateCutoffPolicy;
pub use engine::HarvestEngine;
pub use extractor::ItemExtractor;
pub use interaction::InteractionGuard;
pub use locator::{MatchCondition, QueryLocator, Strategy};
pub use pagination::{PaginationController, PaginationCursor, PaginationState};
pub use site::SiteProfile;
pub use surface::{AssetTransfer, ElementHandle, Surface, SurfaceError, ViewingContextHandle};
pub use types::*;
pub use wait::WaitRetriever;
