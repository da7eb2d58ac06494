//! Collaborator abstractions for the page-like surface and asset storage.
//!
//! The engine never sees how a page is rendered. It resolves locators into
//! opaque element handles, reads text and attributes from them, and juggles
//! viewing contexts (tabs) through explicit handles.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::locator::QueryLocator;
use crate::types::HarvestError;

/// A failure reported by a surface or one of its element handles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct SurfaceError {
    pub operation: &'static str,
    pub message: String,
}

impl SurfaceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Reclassify as a session-level failure. Without this, surface errors
    /// are item-local interaction failures.
    pub fn into_session_failure(self) -> HarvestError {
        HarvestError::SessionFailure {
            cause: self.to_string(),
        }
    }
}

impl From<SurfaceError> for HarvestError {
    fn from(e: SurfaceError) -> Self {
        HarvestError::InteractionFailed {
            cause: e.to_string(),
        }
    }
}

/// Identity of a viewing context (tab) on a surface.
///
/// Returned by [`Surface::open_context`] and consumed by
/// [`Surface::close_context`]; contexts are never addressed by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewingContextHandle(u64);

impl ViewingContextHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewingContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// An element resolved on a surface.
#[async_trait]
pub trait ElementHandle: Clone + Send + Sync + 'static {
    /// Rendered (visible) text.
    async fn text(&self) -> Result<String, SurfaceError>;
    /// Raw DOM text content, including text hidden from rendering.
    async fn text_content(&self) -> Result<String, SurfaceError>;
    /// Attribute or reflected property value, `None` when absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>, SurfaceError>;
    /// Whether the element is displayed and enabled.
    async fn is_interactable(&self) -> Result<bool, SurfaceError>;
    async fn click(&self) -> Result<(), SurfaceError>;
    async fn type_text(&self, text: &str) -> Result<(), SurfaceError>;
    async fn press_enter(&self) -> Result<(), SurfaceError>;
}

/// A browsing session the engine can drive.
///
/// One harvest owns a surface exclusively; implementations do not need to
/// make context switching atomic against other actors.
#[async_trait]
pub trait Surface: Send + Sync {
    type Handle: ElementHandle;

    /// Navigate the current context to a URL.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;
    /// Resize the viewport of the current context.
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), SurfaceError>;
    /// Probe once for elements matching `locator`, under `root` when given.
    ///
    /// Only the locator's strategy and identifier are used here; match
    /// conditions and waiting are the caller's business.
    async fn find(
        &self,
        root: Option<&Self::Handle>,
        locator: &QueryLocator,
    ) -> Result<Vec<Self::Handle>, SurfaceError>;
    /// The context the session started in.
    fn primary_context(&self) -> ViewingContextHandle;
    /// The context queries currently run against.
    async fn current_context(&self) -> Result<ViewingContextHandle, SurfaceError>;
    /// Open a new context at `url` without switching to it.
    async fn open_context(&self, url: &str) -> Result<ViewingContextHandle, SurfaceError>;
    async fn switch_to(&self, context: &ViewingContextHandle) -> Result<(), SurfaceError>;
    async fn close_context(&self, context: ViewingContextHandle) -> Result<(), SurfaceError>;
    /// Resolved location of the current context.
    async fn current_location(&self) -> Result<String, SurfaceError>;
    /// Capture the current context to an image file.
    async fn snapshot(&self, path: &Path) -> Result<(), SurfaceError>;
}

/// Persists a referenced binary asset to local storage.
#[async_trait]
pub trait AssetTransfer: Send + Sync {
    async fn download(&self, source: &str, destination: &Path) -> Result<(), SurfaceError>;
}
