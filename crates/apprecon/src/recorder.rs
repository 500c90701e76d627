//! Exchange recorder — joins intercepted requests with their responses.
//!
//! Requests are appended as pending exchanges. A response is attached to the
//! newest pending exchange with the exact same URL, so duplicate in-flight
//! requests resolve newest-first. Responses with no pending request are
//! dropped.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{CapturedBody, Exchange, ExchangeResponse, Headers};

/// Default response body ceiling in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 50_000;

/// Decides which URLs are API traffic worth keeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficFilter {
    /// Substrings marking API traffic, matched case-insensitively.
    pub include: Vec<String>,
    /// Path extensions of static assets that are never kept.
    pub static_extensions: Vec<String>,
}

impl Default for TrafficFilter {
    fn default() -> Self {
        Self {
            include: vec!["/api/".to_string(), "graphql".to_string()],
            static_extensions: [
                ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".woff", ".woff2",
                ".ttf", ".otf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl TrafficFilter {
    /// Whether the URL path ends in a static-asset extension.
    pub fn is_static_asset(&self, url: &str) -> bool {
        let path = url_path(url).to_ascii_lowercase();
        self.static_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Whether traffic to this URL should be recorded.
    pub fn retains(&self, url: &str) -> bool {
        if self.is_static_asset(url) {
            return false;
        }
        let lower = url.to_ascii_lowercase();
        self.include
            .iter()
            .any(|needle| lower.contains(&needle.to_ascii_lowercase()))
    }
}

/// Path portion of an absolute or relative URL, without query or fragment.
fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Accumulates exchanges for one session.
#[derive(Debug, Clone)]
pub struct ExchangeRecorder {
    exchanges: Vec<Exchange>,
    filter: TrafficFilter,
    body_limit: usize,
}

impl Default for ExchangeRecorder {
    fn default() -> Self {
        Self::new(TrafficFilter::default(), DEFAULT_BODY_LIMIT)
    }
}

impl ExchangeRecorder {
    pub fn new(filter: TrafficFilter, body_limit: usize) -> Self {
        Self {
            exchanges: Vec::new(),
            filter,
            body_limit,
        }
    }

    pub fn filter(&self) -> &TrafficFilter {
        &self.filter
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    /// Record an outgoing request. Returns `false` if the filter rejected it.
    pub fn record_request(
        &mut self,
        url: &str,
        method: &str,
        headers: Headers,
        body: Option<String>,
    ) -> bool {
        if !self.filter.retains(url) {
            return false;
        }

        self.exchanges.push(Exchange {
            url: url.to_string(),
            method: method.to_ascii_uppercase(),
            request_headers: headers,
            request_body: body,
            captured_at: Utc::now(),
            response: None,
        });
        true
    }

    /// Attach a response to the newest pending exchange for `url`.
    ///
    /// Returns the completed exchange, or `None` when nothing was pending.
    pub fn record_response(
        &mut self,
        url: &str,
        status: u16,
        headers: Headers,
        body: &str,
    ) -> Option<&Exchange> {
        let Some(idx) = self
            .exchanges
            .iter()
            .rposition(|e| e.url == url && e.response.is_none())
        else {
            tracing::debug!("Discarding response with no pending request: {url}");
            return None;
        };

        let captured = CapturedBody::capture(body, self.body_limit);
        if captured.truncated {
            tracing::debug!(
                "Truncated response body for {url}: {} of {} bytes kept",
                captured.text.len(),
                captured.original_len
            );
        }

        let exchange = &mut self.exchanges[idx];
        exchange.response = Some(ExchangeResponse {
            url: url.to_string(),
            status,
            headers,
            body: captured,
            received_at: Utc::now(),
        });
        Some(&self.exchanges[idx])
    }

    /// All exchanges in request order.
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Number of exchanges that received a response.
    pub fn answered_count(&self) -> usize {
        self.exchanges.iter().filter(|e| e.is_answered()).count()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.len() - self.answered_count()
    }
}
