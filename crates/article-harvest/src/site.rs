//! Locators and constants describing the target site.

use serde::{Deserialize, Serialize};

use crate::locator::QueryLocator;

/// Everything site-specific the engine needs to find its way around.
///
/// The default profile targets the Gothamist search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub start_url: String,
    pub viewport: (u32, u32),
    pub search_input: QueryLocator,
    pub result_list: QueryLocator,
    pub card: QueryLocator,
    pub load_more: QueryLocator,
    pub overlay_close: QueryLocator,
    pub card_image: QueryLocator,
    pub card_link: QueryLocator,
    pub card_title: QueryLocator,
    pub card_description: QueryLocator,
    pub published_date: QueryLocator,
    /// Prefix stripped from a resolved asset location to name the local file.
    pub asset_url_prefix: String,
    /// Location a freshly opened context reports before it has loaded.
    pub blank_location: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            start_url: "https://gothamist.com/search".to_string(),
            viewport: (1024, 768),
            search_input: QueryLocator::class("search-page-input"),
            result_list: QueryLocator::id("resultList"),
            card: QueryLocator::class("gothamist-card"),
            load_more: QueryLocator::xpath("//button/span[contains(text(), 'Load More')]"),
            overlay_close: QueryLocator::xpath(r#"//button[@title="Close"]"#),
            card_image: QueryLocator::css(".image.native-image.prime-img-class"),
            card_link: QueryLocator::class("image-with-caption-image-link"),
            card_title: QueryLocator::class("h2"),
            card_description: QueryLocator::class("desc"),
            published_date: QueryLocator::css(".date-published p.type-caption"),
            asset_url_prefix: "https://images-prod.gothamist.com/images/".to_string(),
            blank_location: "about:blank".to_string(),
        }
    }
}

impl SiteProfile {
    /// Local file name for an asset resolved at `location`.
    ///
    /// Strips the known prefix; otherwise falls back to the last path
    /// segment with any query or fragment removed.
    pub fn asset_local_name(&self, location: &str) -> Option<String> {
        if let Some(rest) = location.strip_prefix(&self.asset_url_prefix) {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
        let path = location.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(str::to_string)
    }
}
