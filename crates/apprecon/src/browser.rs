//! Browsing collaborator abstractions.
//!
//! Defines the [`BrowserPage`] trait that the scan driver uses to talk to
//! a live page, and the [`ArtifactSink`] trait that persists what was
//! captured. Concrete implementations live outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::survey::{AssetInventory, ComponentSurvey};
use crate::types::{ArtifactRefs, ReconResult};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code, when the browser reports one.
    pub status: Option<u16>,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A single live browser tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> ReconResult<NavigationResult>;
    /// The URL currently shown.
    async fn current_url(&self) -> ReconResult<String>;
    /// The serialized document tree.
    async fn current_document(&self) -> ReconResult<String>;
    /// Execute JavaScript in the page context and return the result.
    async fn evaluate(&self, script: &str) -> ReconResult<serde_json::Value>;
    /// Full-page PNG screenshot.
    async fn capture_screenshot(&self) -> ReconResult<Vec<u8>>;
}

/// Everything read from one page before it is persisted.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    pub name: String,
    pub url: String,
    pub screenshot: Vec<u8>,
    pub document: String,
    /// CSS variables, computed styles of key elements, and class names.
    pub styles: serde_json::Value,
    pub components: ComponentSurvey,
    pub assets: AssetInventory,
}

/// Persists captured pages somewhere.
pub trait ArtifactSink: Send {
    /// Store one page and report where its files went.
    fn store_page(&mut self, page: &CapturedPage) -> ReconResult<ArtifactRefs>;
}

/// A sink that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn store_page(&mut self, _page: &CapturedPage) -> ReconResult<ArtifactRefs> {
        Ok(ArtifactRefs::default())
    }
}
