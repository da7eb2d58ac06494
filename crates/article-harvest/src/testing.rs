// In-memory collaborators for exercising the engine without a browser.
//
// - ScriptedSurface (Surface): contexts, keyed elements, late elements,
//   flaky probes, pages opened by URL, failing page-level operations
// - ScriptedElement (ElementHandle): shared state, failure injection, click hooks
// - RecordingAssetTransfer (AssetTransfer): records requests, optional failures
//
// Plus fixtures for building a search page and article cards from a SiteProfile.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::locator::{QueryLocator, Strategy};
use crate::site::SiteProfile;
use crate::surface::{AssetTransfer, ElementHandle, Surface, SurfaceError, ViewingContextHandle};

type Key = (Strategy, String);

fn key(locator: &QueryLocator) -> Key {
    (locator.strategy, locator.identifier.clone())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An element slot: the element becomes visible once its key has been probed
/// more than `visible_after` times.
#[derive(Clone)]
struct Slot {
    element: ScriptedElement,
    visible_after: u32,
}

type ElementMap = HashMap<Key, Vec<Slot>>;

fn visible(map: &ElementMap, key: &Key, probes: u32) -> Vec<ScriptedElement> {
    map.get(key)
        .map(|slots| {
            slots
                .iter()
                .filter(|s| probes > s.visible_after)
                .map(|s| s.element.clone())
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ScriptedElement
// ---------------------------------------------------------------------------

type ClickHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ElementState {
    text: String,
    text_content: Option<String>,
    attributes: HashMap<String, String>,
    disabled: bool,
    failing: HashSet<&'static str>,
    children: ElementMap,
    child_probes: HashMap<Key, u32>,
    clicks: u32,
    typed: Vec<String>,
    enters: u32,
    on_click: Option<ClickHook>,
}

/// A scripted element. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedElement {
    state: Arc<Mutex<ElementState>>,
}

impl std::fmt::Debug for ScriptedElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedElement").finish_non_exhaustive()
    }
}

impl ScriptedElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        lock(&self.state).text = text.into();
        self
    }

    /// Raw text content, when it should differ from the rendered text.
    pub fn with_text_content(self, text: impl Into<String>) -> Self {
        lock(&self.state).text_content = Some(text.into());
        self
    }

    pub fn with_attribute(self, name: &str, value: impl Into<String>) -> Self {
        lock(&self.state)
            .attributes
            .insert(name.to_string(), value.into());
        self
    }

    pub fn disabled(self) -> Self {
        lock(&self.state).disabled = true;
        self
    }

    /// Make an operation (`"text"`, `"attribute"`, `"click"`, ...) fail.
    pub fn failing(self, operation: &'static str) -> Self {
        lock(&self.state).failing.insert(operation);
        self
    }

    /// Run `hook` after every successful click.
    pub fn on_click(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        lock(&self.state).on_click = Some(Arc::new(hook));
        self
    }

    pub fn set_text(&self, text: impl Into<String>) {
        lock(&self.state).text = text.into();
    }

    /// Place a child reachable by scoped finds under this element.
    pub fn place_child(&self, locator: &QueryLocator, child: ScriptedElement) {
        lock(&self.state)
            .children
            .entry(key(locator))
            .or_default()
            .push(Slot {
                element: child,
                visible_after: 0,
            });
    }

    /// Drop every child under `locator`, as when a list re-renders empty.
    pub fn clear_children(&self, locator: &QueryLocator) {
        lock(&self.state).children.remove(&key(locator));
    }

    pub fn with_child(self, locator: &QueryLocator, child: ScriptedElement) -> Self {
        self.place_child(locator, child);
        self
    }

    pub fn clicks(&self) -> u32 {
        lock(&self.state).clicks
    }

    pub fn typed(&self) -> Vec<String> {
        lock(&self.state).typed.clone()
    }

    pub fn enters(&self) -> u32 {
        lock(&self.state).enters
    }

    fn check(&self, operation: &'static str) -> Result<(), SurfaceError> {
        if lock(&self.state).failing.contains(operation) {
            return Err(SurfaceError::new(operation, "scripted failure"));
        }
        Ok(())
    }

    fn find_children(&self, locator: &QueryLocator) -> Vec<ScriptedElement> {
        let mut state = lock(&self.state);
        let k = key(locator);
        let probes = {
            let count = state.child_probes.entry(k.clone()).or_insert(0);
            *count += 1;
            *count
        };
        visible(&state.children, &k, probes)
    }
}

#[async_trait]
impl ElementHandle for ScriptedElement {
    async fn text(&self) -> Result<String, SurfaceError> {
        self.check("text")?;
        Ok(lock(&self.state).text.clone())
    }

    async fn text_content(&self) -> Result<String, SurfaceError> {
        self.check("text_content")?;
        let state = lock(&self.state);
        Ok(state.text_content.clone().unwrap_or_else(|| state.text.clone()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, SurfaceError> {
        self.check("attribute")?;
        Ok(lock(&self.state).attributes.get(name).cloned())
    }

    async fn is_interactable(&self) -> Result<bool, SurfaceError> {
        self.check("is_interactable")?;
        Ok(!lock(&self.state).disabled)
    }

    async fn click(&self) -> Result<(), SurfaceError> {
        self.check("click")?;
        let hook = {
            let mut state = lock(&self.state);
            state.clicks += 1;
            state.on_click.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.check("type_text")?;
        lock(&self.state).typed.push(text.to_string());
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), SurfaceError> {
        self.check("press_enter")?;
        lock(&self.state).enters += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedSurface
// ---------------------------------------------------------------------------

/// What a context opened at a given URL looks like.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    location: Option<String>,
    elements: ElementMap,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The location the context settles on (defaults to the opened URL).
    pub fn resolves_to(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_element(mut self, locator: &QueryLocator, element: ScriptedElement) -> Self {
        self.elements.entry(key(locator)).or_default().push(Slot {
            element,
            visible_after: 0,
        });
        self
    }
}

struct ContextState {
    location: String,
    elements: ElementMap,
}

struct SurfaceState {
    contexts: HashMap<u64, ContextState>,
    current: u64,
    next_id: u64,
    pages: HashMap<String, ScriptedPage>,
    probes: HashMap<Key, u32>,
    failing_probes: HashMap<Key, u32>,
    failing_opens: HashSet<String>,
    failing: HashSet<&'static str>,
    navigations: Vec<String>,
    viewports: Vec<(u32, u32)>,
    snapshots: Vec<PathBuf>,
    opened: Vec<String>,
    closed: u32,
}

/// An in-memory surface. Clones share state, so click hooks can mutate the
/// page they live on.
#[derive(Clone)]
pub struct ScriptedSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl Default for ScriptedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSurface {
    const PRIMARY: u64 = 0;

    pub fn new() -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(
            Self::PRIMARY,
            ContextState {
                location: "about:blank".to_string(),
                elements: HashMap::new(),
            },
        );
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                contexts,
                current: Self::PRIMARY,
                next_id: Self::PRIMARY + 1,
                pages: HashMap::new(),
                probes: HashMap::new(),
                failing_probes: HashMap::new(),
                failing_opens: HashSet::new(),
                failing: HashSet::new(),
                navigations: Vec::new(),
                viewports: Vec::new(),
                snapshots: Vec::new(),
                opened: Vec::new(),
                closed: 0,
            })),
        }
    }

    /// Place an element in the primary context.
    pub fn place(&self, locator: &QueryLocator, element: ScriptedElement) {
        self.place_after(locator, element, 0);
    }

    /// Place an element in the primary context that only shows up after
    /// `probes` unsuccessful probes of its locator.
    pub fn place_after(&self, locator: &QueryLocator, element: ScriptedElement, probes: u32) {
        let mut state = lock(&self.state);
        let already = state.probes.get(&key(locator)).copied().unwrap_or(0);
        if let Some(primary) = state.contexts.get_mut(&Self::PRIMARY) {
            primary
                .elements
                .entry(key(locator))
                .or_default()
                .push(Slot {
                    element,
                    visible_after: already + probes,
                });
        }
    }

    /// Make the next `count` probes of `locator` fail.
    pub fn fail_probes(&self, locator: &QueryLocator, count: u32) {
        lock(&self.state).failing_probes.insert(key(locator), count);
    }

    /// Describe what opening `url` in a new context produces.
    pub fn page(&self, url: impl Into<String>, page: ScriptedPage) {
        lock(&self.state).pages.insert(url.into(), page);
    }

    /// Make opening `url` fail.
    pub fn fail_open(&self, url: impl Into<String>) {
        lock(&self.state).failing_opens.insert(url.into());
    }

    /// Make a page-level operation (`"navigate"`, `"set_viewport"`) fail.
    pub fn fail(&self, operation: &'static str) {
        lock(&self.state).failing.insert(operation);
    }

    pub fn probe_count(&self, locator: &QueryLocator) -> u32 {
        lock(&self.state)
            .probes
            .get(&key(locator))
            .copied()
            .unwrap_or(0)
    }

    pub fn open_contexts(&self) -> usize {
        lock(&self.state).contexts.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.state).opened.clone()
    }

    pub fn closed_contexts(&self) -> u32 {
        lock(&self.state).closed
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.state).navigations.clone()
    }

    pub fn viewports(&self) -> Vec<(u32, u32)> {
        lock(&self.state).viewports.clone()
    }

    pub fn snapshots(&self) -> Vec<PathBuf> {
        lock(&self.state).snapshots.clone()
    }

    pub fn current_id(&self) -> u64 {
        lock(&self.state).current
    }
}

#[async_trait]
impl Surface for ScriptedSurface {
    type Handle = ScriptedElement;

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let mut state = lock(&self.state);
        state.navigations.push(url.to_string());
        if state.failing.contains("navigate") {
            return Err(SurfaceError::new("navigate", format!("cannot reach {url}")));
        }
        let current = state.current;
        match state.contexts.get_mut(&current) {
            Some(ctx) => {
                ctx.location = url.to_string();
                Ok(())
            }
            None => Err(SurfaceError::new("navigate", "current context is closed")),
        }
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), SurfaceError> {
        let mut state = lock(&self.state);
        if state.failing.contains("set_viewport") {
            return Err(SurfaceError::new("set_viewport", "scripted failure"));
        }
        state.viewports.push((width, height));
        Ok(())
    }

    async fn find(
        &self,
        root: Option<&ScriptedElement>,
        locator: &QueryLocator,
    ) -> Result<Vec<ScriptedElement>, SurfaceError> {
        if let Some(root) = root {
            return Ok(root.find_children(locator));
        }

        let mut state = lock(&self.state);
        let k = key(locator);
        let probes = {
            let count = state.probes.entry(k.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if let Some(remaining) = state.failing_probes.get_mut(&k) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SurfaceError::new("find", "scripted probe failure"));
            }
        }
        let current = state.current;
        let ctx = state
            .contexts
            .get(&current)
            .ok_or_else(|| SurfaceError::new("find", "current context is closed"))?;
        Ok(visible(&ctx.elements, &k, probes))
    }

    fn primary_context(&self) -> ViewingContextHandle {
        ViewingContextHandle::new(Self::PRIMARY)
    }

    async fn current_context(&self) -> Result<ViewingContextHandle, SurfaceError> {
        Ok(ViewingContextHandle::new(lock(&self.state).current))
    }

    async fn open_context(&self, url: &str) -> Result<ViewingContextHandle, SurfaceError> {
        let mut state = lock(&self.state);
        if state.failing_opens.contains(url) {
            return Err(SurfaceError::new("open_context", format!("cannot open {url}")));
        }
        let page = state.pages.get(url).cloned().unwrap_or_default();
        let id = state.next_id;
        state.next_id += 1;
        state.opened.push(url.to_string());
        state.contexts.insert(
            id,
            ContextState {
                location: page.location.unwrap_or_else(|| url.to_string()),
                elements: page.elements,
            },
        );
        Ok(ViewingContextHandle::new(id))
    }

    async fn switch_to(&self, context: &ViewingContextHandle) -> Result<(), SurfaceError> {
        let mut state = lock(&self.state);
        if !state.contexts.contains_key(&context.id()) {
            return Err(SurfaceError::new("switch_to", format!("{context} is closed")));
        }
        state.current = context.id();
        Ok(())
    }

    async fn close_context(&self, context: ViewingContextHandle) -> Result<(), SurfaceError> {
        let mut state = lock(&self.state);
        if context.id() == Self::PRIMARY {
            return Err(SurfaceError::new("close_context", "refusing to close primary"));
        }
        if state.contexts.remove(&context.id()).is_none() {
            return Err(SurfaceError::new("close_context", format!("{context} is closed")));
        }
        state.closed += 1;
        Ok(())
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        let state = lock(&self.state);
        state
            .contexts
            .get(&state.current)
            .map(|ctx| ctx.location.clone())
            .ok_or_else(|| SurfaceError::new("current_location", "current context is closed"))
    }

    async fn snapshot(&self, path: &Path) -> Result<(), SurfaceError> {
        lock(&self.state).snapshots.push(path.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingAssetTransfer
// ---------------------------------------------------------------------------

/// Records every download request. Sources registered with `fail_on` error.
#[derive(Default)]
pub struct RecordingAssetTransfer {
    requests: Mutex<Vec<(String, PathBuf)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingAssetTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, source: impl Into<String>) {
        lock(&self.failing).insert(source.into());
    }

    pub fn requests(&self) -> Vec<(String, PathBuf)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl AssetTransfer for RecordingAssetTransfer {
    async fn download(&self, source: &str, destination: &Path) -> Result<(), SurfaceError> {
        if lock(&self.failing).contains(source) {
            return Err(SurfaceError::new("download", format!("{source} unavailable")));
        }
        lock(&self.requests).push((source.to_string(), destination.to_path_buf()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Published-line text as the article page renders it.
pub fn published_line(date: NaiveDate) -> String {
    format!("Published {} at 10:15am", date.format("%B %-d, %Y"))
}

/// Place the search input and an empty result list on the primary context.
/// Returns `(search_input, result_list)`.
pub fn mount_search_page(
    surface: &ScriptedSurface,
    site: &SiteProfile,
) -> (ScriptedElement, ScriptedElement) {
    let input = ScriptedElement::new();
    let list = ScriptedElement::new();
    surface.place(&site.search_input, input.clone());
    surface.place(&site.result_list, list.clone());
    (input, list)
}

/// Everything one card shows, plus what its linked pages resolve to.
#[derive(Debug, Clone)]
pub struct CardFixture {
    pub title: String,
    pub description: String,
    pub published: String,
    pub image_src: String,
    /// Where the image context settles; `None` keeps it on the blank page.
    pub image_location: Option<String>,
    pub link: String,
}

impl CardFixture {
    pub fn new(n: usize, published: impl Into<String>) -> Self {
        Self {
            title: format!("Story {n}"),
            description: format!("Description of story {n}."),
            published: published.into(),
            image_src: format!("https://gothamist.com/img/{n}.jpg?w=640"),
            image_location: Some(format!(
                "https://images-prod.gothamist.com/images/story-{n}.jpg"
            )),
            link: format!("https://gothamist.com/news/story-{n}"),
        }
    }

    pub fn dated(n: usize, date: NaiveDate) -> Self {
        Self::new(n, published_line(date))
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn unresolved_image(mut self) -> Self {
        self.image_location = None;
        self
    }
}

impl ScriptedSurface {
    /// Build a card element, register its image and article pages, and
    /// return the card. The caller decides where the card lives.
    pub fn card(&self, site: &SiteProfile, fixture: &CardFixture) -> ScriptedElement {
        let image_page = ScriptedPage::new().resolves_to(
            fixture
                .image_location
                .clone()
                .unwrap_or_else(|| site.blank_location.clone()),
        );
        self.page(fixture.image_src.clone(), image_page);

        let date = ScriptedElement::new().with_text(fixture.published.clone());
        self.page(
            fixture.link.clone(),
            ScriptedPage::new().with_element(&site.published_date, date),
        );

        ScriptedElement::new()
            .with_child(
                &site.card_image,
                ScriptedElement::new().with_attribute("src", fixture.image_src.clone()),
            )
            .with_child(
                &site.card_link,
                ScriptedElement::new().with_attribute("href", fixture.link.clone()),
            )
            .with_child(
                &site.card_title,
                ScriptedElement::new().with_text(fixture.title.clone()),
            )
            .with_child(
                &site.card_description,
                ScriptedElement::new().with_text(fixture.description.clone()),
            )
    }

    /// Build a card and append it to `list`.
    pub fn mount_card(
        &self,
        site: &SiteProfile,
        list: &ScriptedElement,
        fixture: &CardFixture,
    ) -> ScriptedElement {
        let card = self.card(site, fixture);
        list.place_child(&site.card, card.clone());
        card
    }
}
