//! Chromium-backed surface using chromiumoxide.
//!
//! Every viewing context is a browser page. Pages are tracked by the id of
//! the [`ViewingContextHandle`] that names them; the primary page is created
//! at launch and never closed through the surface.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;

use article_harvest::{
    ElementHandle, QueryLocator, Strategy, Surface, SurfaceError, ViewingContextHandle,
};

use crate::settings::{Environment, Settings};

const PRIMARY: u64 = 0;

const INTERACTABLE_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return !this.disabled && r.width > 0 && r.height > 0 && s.visibility !== 'hidden'; \
}";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ~/.article-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".article-harvest/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".article-harvest/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".article-harvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".article-harvest/chromium/chrome-linux64/chrome"),
                home.join(".article-harvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Browser arguments for an environment. Both run headless.
pub fn launch_args(environment: Environment) -> Vec<&'static str> {
    let mut args = vec!["--headless=new", "--disable-gpu", "--disable-extensions"];
    if environment == Environment::Local {
        args.extend(["--no-sandbox", "--disable-dev-shm-usage"]);
    }
    args
}

struct Contexts {
    pages: HashMap<u64, Page>,
    current: u64,
    next_id: u64,
}

pub struct ChromiumSurface {
    browser: Browser,
    handler: JoinHandle<()>,
    contexts: Mutex<Contexts>,
}

fn surface_err(operation: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> SurfaceError {
    move |e| SurfaceError::new(operation, e.to_string())
}

impl ChromiumSurface {
    /// Launch headless Chromium and open the primary page.
    pub async fn launch(settings: &Settings) -> Result<Self> {
        let chrome_path = match &settings.chromium_path {
            Some(path) => path.clone(),
            None => find_chromium()
                .context("Chromium not found; install it or set ARTICLE_HARVEST_CHROMIUM_PATH")?,
        };
        tracing::info!(
            "launching {} ({} environment)",
            chrome_path.display(),
            settings.environment
        );

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        for arg in launch_args(settings.environment) {
            builder = builder.arg(arg);
        }
        if settings.environment == Environment::Local {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let primary = browser
            .new_page("about:blank")
            .await
            .context("failed to create primary page")?;

        let mut pages = HashMap::new();
        pages.insert(PRIMARY, primary);
        Ok(Self {
            browser,
            handler,
            contexts: Mutex::new(Contexts {
                pages,
                current: PRIMARY,
                next_id: PRIMARY + 1,
            }),
        })
    }

    /// Close the browser and stop its event handler.
    pub async fn shutdown(mut self) -> Result<()> {
        self.browser.close().await.context("failed to close Chromium")?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    fn contexts(&self) -> Result<MutexGuard<'_, Contexts>, SurfaceError> {
        self.contexts
            .lock()
            .map_err(|_| SurfaceError::new("contexts", "context table poisoned"))
    }

    fn current_page(&self, operation: &'static str) -> Result<Page, SurfaceError> {
        let contexts = self.contexts()?;
        contexts
            .pages
            .get(&contexts.current)
            .cloned()
            .ok_or_else(|| SurfaceError::new(operation, "current context is closed"))
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    type Handle = ChromiumElement;

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let page = self.current_page("navigate")?;
        page.goto(url).await.map_err(surface_err("navigate"))?;
        page.wait_for_navigation()
            .await
            .map_err(surface_err("navigate"))?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), SurfaceError> {
        let page = self.current_page("set_viewport")?;
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        page.execute(params)
            .await
            .map_err(surface_err("set_viewport"))?;
        Ok(())
    }

    async fn find(
        &self,
        root: Option<&ChromiumElement>,
        locator: &QueryLocator,
    ) -> Result<Vec<ChromiumElement>, SurfaceError> {
        let found = match (root, locator.to_css()) {
            (Some(root), Some(css)) => root.0.find_elements(css).await,
            (Some(_), None) => {
                return Err(SurfaceError::new(
                    "find",
                    format!("{locator} cannot be scoped to an element"),
                ))
            }
            (None, css) => {
                let page = self.current_page("find")?;
                match (locator.strategy, css) {
                    (Strategy::XPath, _) => page.find_xpaths(locator.identifier.as_str()).await,
                    (_, Some(css)) => page.find_elements(css).await,
                    (_, None) => {
                        return Err(SurfaceError::new("find", format!("unsupported {locator}")))
                    }
                }
            }
        };
        let elements = found.map_err(surface_err("find"))?;
        Ok(elements
            .into_iter()
            .map(|e| ChromiumElement(Arc::new(e)))
            .collect())
    }

    fn primary_context(&self) -> ViewingContextHandle {
        ViewingContextHandle::new(PRIMARY)
    }

    async fn current_context(&self) -> Result<ViewingContextHandle, SurfaceError> {
        Ok(ViewingContextHandle::new(self.contexts()?.current))
    }

    async fn open_context(&self, url: &str) -> Result<ViewingContextHandle, SurfaceError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(surface_err("open_context"))?;
        let mut contexts = self.contexts()?;
        let id = contexts.next_id;
        contexts.next_id += 1;
        contexts.pages.insert(id, page);
        Ok(ViewingContextHandle::new(id))
    }

    async fn switch_to(&self, context: &ViewingContextHandle) -> Result<(), SurfaceError> {
        let page = {
            let mut contexts = self.contexts()?;
            let page = contexts
                .pages
                .get(&context.id())
                .cloned()
                .ok_or_else(|| SurfaceError::new("switch_to", format!("{context} is closed")))?;
            contexts.current = context.id();
            page
        };
        if let Err(e) = page.bring_to_front().await {
            tracing::debug!("could not bring {context} to front: {e}");
        }
        Ok(())
    }

    async fn close_context(&self, context: ViewingContextHandle) -> Result<(), SurfaceError> {
        if context.id() == PRIMARY {
            return Err(SurfaceError::new("close_context", "refusing to close primary"));
        }
        let page = self
            .contexts()?
            .pages
            .remove(&context.id())
            .ok_or_else(|| SurfaceError::new("close_context", format!("{context} is closed")))?;
        page.close().await.map_err(surface_err("close_context"))
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        let page = self.current_page("current_location")?;
        let url = page
            .url()
            .await
            .map_err(surface_err("current_location"))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn snapshot(&self, path: &Path) -> Result<(), SurfaceError> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SurfaceError::new("snapshot", e.to_string()))?;
        }
        let page = self.current_page("snapshot")?;
        page.save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(surface_err("snapshot"))?;
        Ok(())
    }
}

/// A resolved DOM element.
#[derive(Clone)]
pub struct ChromiumElement(Arc<Element>);

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn text(&self) -> Result<String, SurfaceError> {
        let text = self.0.inner_text().await.map_err(surface_err("text"))?;
        Ok(text.unwrap_or_default())
    }

    async fn text_content(&self) -> Result<String, SurfaceError> {
        let value = self
            .0
            .property("textContent")
            .await
            .map_err(surface_err("text_content"))?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, SurfaceError> {
        // Reflected properties carry absolute URLs for src/href.
        let property = self
            .0
            .property(name)
            .await
            .map_err(surface_err("attribute"))?;
        if let Some(value) = property.and_then(|v| v.as_str().map(str::to_string)) {
            return Ok(Some(value));
        }
        self.0.attribute(name).await.map_err(surface_err("attribute"))
    }

    async fn is_interactable(&self) -> Result<bool, SurfaceError> {
        let returns = self
            .0
            .call_js_fn(INTERACTABLE_JS, false)
            .await
            .map_err(surface_err("is_interactable"))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self) -> Result<(), SurfaceError> {
        self.0.click().await.map_err(surface_err("click"))?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.0.type_str(text).await.map_err(surface_err("type_text"))?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), SurfaceError> {
        self.0
            .press_key("Enter")
            .await
            .map_err(surface_err("press_enter"))?;
        Ok(())
    }
}
