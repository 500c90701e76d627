//! Chromium-backed browser page and network interceptor using chromiumoxide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, Headers as CdpHeaders,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use apprecon::{
    BrowserPage, Headers, NavigationResult, ObservedRequest, ObservedResponse, ReconError,
    ReconResult, TrafficEvent, TrafficFilter,
};

const CHROMIUM_ENV: &str = "APPRECON_CHROMIUM_PATH";
const SYSTEM_BROWSERS: [&str; 3] = ["google-chrome", "chromium", "chromium-browser"];
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

/// Executables a Chromium download unpacked under `<home>/chromium` may use.
fn bundled_candidates(home: &Path) -> Vec<PathBuf> {
    let root = home.join("chromium");
    let testing_app = "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
    let mut candidates = if cfg!(target_os = "macos") {
        vec![
            root.join("chrome-mac-arm64").join(testing_app),
            root.join("chrome-mac-x64").join(testing_app),
        ]
    } else {
        vec![root.join("chrome-linux64").join("chrome")]
    };
    candidates.push(root.join("chrome"));
    candidates
}

/// Locate a Chromium executable.
///
/// Tries `APPRECON_CHROMIUM_PATH`, then a browser bundled in the apprecon home,
/// then the system `PATH`, then the stock macOS install.
pub fn find_chromium(home: &Path) -> Option<PathBuf> {
    let explicit = std::env::var_os(CHROMIUM_ENV).map(PathBuf::from);
    let system = SYSTEM_BROWSERS
        .iter()
        .find_map(|name| which::which(name).ok());
    let macos = cfg!(target_os = "macos").then(|| PathBuf::from(MACOS_CHROME));

    explicit
        .into_iter()
        .chain(bundled_candidates(home))
        .chain(system)
        .chain(macos)
        .find(|path| path.exists())
}

/// Launch Chromium with a persistent profile directory.
///
/// Returns the browser and the task pumping its CDP handler.
pub async fn launch(
    home: &Path,
    profile_dir: &Path,
    headless: bool,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = find_chromium(home)
        .context("Chromium not found. Install Chrome or set APPRECON_CHROMIUM_PATH.")?;

    std::fs::create_dir_all(profile_dir)
        .with_context(|| format!("failed to create profile dir {}", profile_dir.display()))?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir)
        .window_size(1280, 800)
        .viewport(None)
        .arg("--no-first-run")
        .arg("--disable-dev-shm-usage");
    if !headless {
        builder = builder.with_head();
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("failed to launch Chromium")?;

    let pump = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("CDP handler error: {e}");
            }
        }
    });

    Ok((browser, pump))
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }
}

fn browser_err(context: &str, e: impl std::fmt::Display) -> ReconError {
    ReconError::Browser(format!("{context}: {e}"))
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> ReconResult<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    status: None,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(ReconError::Navigation(format!("navigation failed: {e}"))),
            Err(_) => Err(ReconError::Navigation(format!(
                "navigation timed out after {timeout_ms}ms"
            ))),
        }
    }

    async fn current_url(&self) -> ReconResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| browser_err("failed to get URL", e))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn current_document(&self) -> ReconResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("failed to get HTML", e))
    }

    async fn evaluate(&self, script: &str) -> ReconResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| browser_err("JS execution failed", e))?;

        result
            .into_value()
            .map_err(|e| browser_err("failed to convert JS result", format!("{e:?}")))
    }

    async fn capture_screenshot(&self) -> ReconResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| browser_err("screenshot failed", e))
    }
}

/// A response seen on the wire whose body has not finished loading.
struct PendingResponse {
    url: String,
    status: u16,
    headers: Headers,
}

/// Forward API traffic of `page` to `tx` until the page's event streams close.
///
/// Requests are forwarded as soon as they are sent. Responses are held until
/// their body has loaded, then forwarded with the body attached.
pub async fn spawn_interceptor(
    page: &Page,
    filter: TrafficFilter,
    tx: UnboundedSender<TrafficEvent>,
) -> Result<JoinHandle<()>> {
    page.execute(EnableParams::default())
        .await
        .context("failed to enable network events")?;

    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let mut failed = page.event_listener::<EventLoadingFailed>().await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        let mut pending: HashMap<String, PendingResponse> = HashMap::new();

        loop {
            let event = tokio::select! {
                Some(sent) = requests.next() => {
                    let request = &sent.request;
                    if !filter.retains(&request.url) {
                        continue;
                    }
                    TrafficEvent::Request(ObservedRequest {
                        url: request.url.clone(),
                        method: request.method.clone(),
                        headers: convert_headers(&request.headers),
                        body: request.post_data.clone(),
                    })
                }
                Some(received) = responses.next() => {
                    let response = &received.response;
                    if filter.retains(&response.url) {
                        pending.insert(
                            received.request_id.inner().clone(),
                            PendingResponse {
                                url: response.url.clone(),
                                status: u16::try_from(response.status).unwrap_or_default(),
                                headers: convert_headers(&response.headers),
                            },
                        );
                    }
                    continue;
                }
                Some(done) = finished.next() => {
                    let Some(response) = pending.remove(done.request_id.inner()) else {
                        continue;
                    };
                    let body = match page
                        .execute(GetResponseBodyParams::new(done.request_id.clone()))
                        .await
                    {
                        Ok(reply) => decode_body(&reply.result.body, reply.result.base64_encoded),
                        Err(e) => {
                            tracing::debug!("No body for {}: {e}", response.url);
                            String::new()
                        }
                    };
                    TrafficEvent::Response(ObservedResponse {
                        url: response.url,
                        status: response.status,
                        headers: response.headers,
                        body,
                    })
                }
                Some(lost) = failed.next() => {
                    if let Some(response) = pending.remove(lost.request_id.inner()) {
                        tracing::debug!("Loading failed for {}: {}", response.url, lost.error_text);
                    }
                    continue;
                }
                else => break,
            };

            if tx.send(event).is_err() {
                break;
            }
        }

        tracing::debug!("Network interceptor stopped");
    }))
}

fn convert_headers(headers: &CdpHeaders) -> Headers {
    match headers.inner() {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(name, value)| {
                let value = value
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| value.to_string());
                (name.as_str(), value)
            })
            .collect(),
        _ => Headers::new(),
    }
}

/// Response body as text. Binary bodies arrive base64-encoded.
fn decode_body(body: &str, base64_encoded: bool) -> String {
    if !base64_encoded {
        return body.to_string();
    }
    match base64::engine::general_purpose::STANDARD.decode(body) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!("Undecodable base64 body: {e}");
            String::new()
        }
    }
}
