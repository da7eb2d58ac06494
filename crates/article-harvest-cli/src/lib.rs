//! Article Harvest CLI: the plumbing behind the `article-harvest` binary.

pub mod chromium;
pub mod export;
pub mod logging;
pub mod run;
pub mod settings;
pub mod transfer;

pub use chromium::ChromiumSurface;
pub use settings::{Environment, Settings};
pub use transfer::HttpAssetTransfer;
