//! Scan driver — visits pages through a [`BrowserPage`] and feeds a session.
//!
//! Every fallible step of a capture (reading the page, persisting its
//! artifacts) happens before the session is touched, so a failed visit
//! leaves no partial state behind. Visits are best-effort: a failure is
//! recorded as a skipped page and the crawl moves on.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::browser::{ArtifactSink, BrowserPage, CapturedPage};
use crate::dom::{HtmlDom, LayoutMap};
use crate::session::{ReconSession, TrafficEvent};
use crate::survey::{collect_assets, discover_navigation, AssetInventory, ComponentSurvey, Surveyor};
use crate::types::{NavLink, PageSnapshot, ReconError, ReconResult};

/// Collects `:root` CSS variables, computed styles of key elements, and up
/// to 500 distinct class names.
pub const STYLE_SUMMARY_SCRIPT: &str = r#"(() => {
  const result = { variables: {}, keyStyles: {}, allClasses: [] };
  for (const sheet of document.styleSheets) {
    try {
      for (const rule of sheet.cssRules) {
        if (rule.selectorText === ':root') {
          for (const prop of rule.style) {
            if (prop.startsWith('--')) {
              result.variables[prop] = rule.style.getPropertyValue(prop).trim();
            }
          }
        }
      }
    } catch (e) {}
  }
  const keyElements = [
    'button', 'input', 'select', 'textarea',
    '[class*="card"]', '[class*="modal"]', '[class*="header"]',
    '[class*="sidebar"]', '[class*="nav"]', '[class*="menu"]',
    '[class*="table"]', '[class*="form"]', '[class*="btn"]'
  ];
  for (const selector of keyElements) {
    const el = document.querySelector(selector);
    if (!el) continue;
    const c = getComputedStyle(el);
    result.keyStyles[selector] = {
      color: c.color,
      backgroundColor: c.backgroundColor,
      fontFamily: c.fontFamily,
      fontSize: c.fontSize,
      fontWeight: c.fontWeight,
      padding: c.padding,
      margin: c.margin,
      borderRadius: c.borderRadius,
      boxShadow: c.boxShadow
    };
  }
  const classes = new Set();
  document.querySelectorAll('*').forEach(el => el.classList.forEach(cls => classes.add(cls)));
  result.allClasses = Array.from(classes).slice(0, 500);
  return result;
})()"#;

/// Tuning for the scan driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Delay before reading a page, to let client-side rendering finish.
    pub settle_ms: u64,
    pub nav_timeout_ms: u64,
    /// Maximum navigation targets visited by [`Scanner::crawl`].
    pub max_pages: usize,
    /// Only follow links on the entry page's host.
    pub same_host_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            settle_ms: 2000,
            nav_timeout_ms: 30_000,
            max_pages: 25,
            same_host_only: true,
        }
    }
}

/// What a crawl did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub captured: usize,
    pub skipped: usize,
    /// Navigation targets left unvisited because of `max_pages`.
    pub not_visited: usize,
}

/// Drives one browser page and records what it sees into a session.
pub struct Scanner<P, S> {
    page: P,
    sink: S,
    options: ScanOptions,
    surveyor: Surveyor,
    traffic: Option<UnboundedReceiver<TrafficEvent>>,
}

impl<P: BrowserPage, S: ArtifactSink> Scanner<P, S> {
    pub fn new(page: P, sink: S, options: ScanOptions) -> Self {
        Self {
            page,
            sink,
            options,
            surveyor: Surveyor::default(),
            traffic: None,
        }
    }

    pub fn with_surveyor(mut self, surveyor: Surveyor) -> Self {
        self.surveyor = surveyor;
        self
    }

    /// Attach the channel a capture shim forwards intercepted traffic on.
    pub fn with_traffic(mut self, rx: UnboundedReceiver<TrafficEvent>) -> Self {
        self.traffic = Some(rx);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn into_parts(self) -> (P, S) {
        (self.page, self.sink)
    }

    /// Apply any traffic waiting on the channel.
    pub fn drain_traffic(&mut self, session: &mut ReconSession) -> usize {
        match self.traffic.as_mut() {
            Some(rx) => session.drain(rx),
            None => 0,
        }
    }

    /// Wait one settle period for traffic still in flight, then apply it.
    ///
    /// Response bodies are fetched after the response itself arrives, so the
    /// last page's API replies can trail the crawl.
    pub async fn flush_traffic(&mut self, session: &mut ReconSession) -> usize {
        if self.traffic.is_none() {
            return 0;
        }
        tokio::time::sleep(Duration::from_millis(self.options.settle_ms)).await;
        self.drain_traffic(session)
    }

    /// Capture the page currently shown under `name`.
    ///
    /// Returns the navigation links found on it.
    pub async fn capture(
        &mut self,
        session: &mut ReconSession,
        name: &str,
    ) -> ReconResult<Vec<NavLink>> {
        tokio::time::sleep(Duration::from_millis(self.options.settle_ms)).await;
        self.drain_traffic(session);

        let url = self.page.current_url().await?;
        let document = self.page.current_document().await?;
        let styles = self.page.evaluate(STYLE_SUMMARY_SCRIPT).await?;
        let layout = self.measure_layout().await;
        let screenshot = self.page.capture_screenshot().await?;

        let analysis = analyse(&self.surveyor, &document, layout, &url);

        let captured = CapturedPage {
            name: name.to_string(),
            url: url.clone(),
            screenshot,
            document,
            styles,
            components: analysis.components,
            assets: analysis.assets,
        };
        let artifacts = self.sink.store_page(&captured)?;

        session.add_page(PageSnapshot {
            name: captured.name,
            url,
            captured_at: Utc::now(),
            components: captured.components,
            artifacts,
        });
        self.drain_traffic(session);

        Ok(analysis.navigation)
    }

    /// Navigate to `url` and capture it. A failure is recorded as a skip.
    ///
    /// Returns whether the page was captured.
    pub async fn visit(&mut self, session: &mut ReconSession, name: &str, url: &str) -> bool {
        let result = match self.page.navigate(url, self.options.nav_timeout_ms).await {
            Ok(nav) => {
                tracing::debug!("Loaded {} in {}ms", nav.final_url, nav.load_time_ms);
                self.capture(session, name).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => true,
            Err(e) => {
                self.drain_traffic(session);
                session.skip_page(name, url, e.to_string());
                false
            }
        }
    }

    /// Capture the current page as `entry_name`, then visit its navigation targets.
    pub async fn crawl(&mut self, session: &mut ReconSession, entry_name: &str) -> CrawlSummary {
        let mut summary = CrawlSummary::default();

        let entry_url = self.page.current_url().await.unwrap_or_default();
        let links = match self.capture(session, entry_name).await {
            Ok(links) => links,
            Err(e) => {
                session.skip_page(entry_name, &entry_url, e.to_string());
                summary.skipped += 1;
                return summary;
            }
        };
        summary.captured += 1;

        let entry_url = session
            .pages()
            .last()
            .map(|p| p.url.clone())
            .unwrap_or(entry_url);
        tracing::info!("Found {} navigation items on {entry_name}", links.len());
        session.set_navigation(links.clone());

        let entry_host = host_of(&entry_url);
        let mut visited: HashSet<String> = HashSet::from([entry_url]);
        let mut budget = self.options.max_pages;

        for link in &links {
            if visited.contains(&link.href) {
                continue;
            }
            if self.options.same_host_only && host_of(&link.href) != entry_host {
                tracing::debug!("Not following off-site link {}", link.href);
                continue;
            }
            if budget == 0 {
                summary.not_visited += 1;
                continue;
            }
            budget -= 1;
            visited.insert(link.href.clone());

            let name = page_name(link);
            if self.visit(session, &name, &link.href).await {
                summary.captured += 1;
            } else {
                summary.skipped += 1;
            }
        }

        self.drain_traffic(session);
        summary
    }

    /// Bounding boxes for every surveyed selector, measured in the live page.
    async fn measure_layout(&self) -> LayoutMap {
        let selectors = self.surveyor.selectors().combined();
        let script = layout_script(&selectors);
        let measured = match self.page.evaluate(&script).await {
            Ok(value) => serde_json::from_value::<LayoutMap>(value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        measured.unwrap_or_else(|e| {
            tracing::debug!("Layout unavailable, sizes omitted: {e}");
            LayoutMap::new()
        })
    }
}

struct Analysis {
    components: ComponentSurvey,
    navigation: Vec<NavLink>,
    assets: AssetInventory,
}

fn analyse(surveyor: &Surveyor, document: &str, layout: LayoutMap, url: &str) -> Analysis {
    let dom = HtmlDom::parse(document).with_layout(layout);
    Analysis {
        components: surveyor.survey(&dom, url),
        navigation: discover_navigation(&dom, url),
        assets: collect_assets(&dom, url),
    }
}

fn layout_script(selectors: &[String]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  const selectors = {list};
  const out = {{}};
  for (const sel of selectors) {{
    try {{
      out[sel] = Array.from(document.querySelectorAll(sel)).map(el => {{
        const r = el.getBoundingClientRect();
        return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
      }});
    }} catch (e) {{}}
  }}
  return out;
}})()"#
    )
}

/// Check a user-supplied start URL. Only absolute web, file and `about:` URLs are opened.
pub fn validate_start_url(raw: &str) -> ReconResult<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ReconError::InvalidInput(format!("start URL {raw:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed.to_string()),
        "about" | "file" => Ok(parsed.to_string()),
        scheme => Err(ReconError::InvalidInput(format!(
            "start URL {raw:?}: unsupported scheme {scheme}"
        ))),
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Display name for a navigation target: its link text, else its last path segment.
fn page_name(link: &NavLink) -> String {
    let text = link.text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    url::Url::parse(&link.href)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(String::from))
                .or_else(|| u.host_str().map(String::from))
        })
        .unwrap_or_else(|| "unknown".to_string())
}
