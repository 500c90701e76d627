//! Reconnaissance session — the owned context every component writes into.
//!
//! A [`ReconSession`] holds the exchange log, entity catalog, endpoint
//! catalog, page list, and navigation for one browsing session. Traffic
//! arrives as [`TrafficEvent`]s; pages arrive fully built from the scan
//! driver. Nothing here is shared, so a session is driven by exactly one
//! task and independent sessions never interfere.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::aggregate::{aggregate, ArchitectureReport};
use crate::endpoints::EndpointCatalog;
use crate::inference::EntityCatalog;
use crate::recorder::{ExchangeRecorder, TrafficFilter, DEFAULT_BODY_LIMIT};
use crate::types::{Exchange, Headers, NavLink, PageSnapshot, SkippedPage};

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: Option<String>,
}

/// An intercepted response, with its full body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

/// One interception callback from the capture layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficEvent {
    Request(ObservedRequest),
    Response(ObservedResponse),
}

/// Session-wide tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub filter: TrafficFilter,
    /// Response body ceiling in bytes.
    pub body_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            filter: TrafficFilter::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// All state accumulated during one session.
#[derive(Debug, Clone)]
pub struct ReconSession {
    name: String,
    recorder: ExchangeRecorder,
    entities: EntityCatalog,
    endpoints: EndpointCatalog,
    pages: Vec<PageSnapshot>,
    navigation: Vec<NavLink>,
    skipped: Vec<SkippedPage>,
}

impl ReconSession {
    pub fn new(name: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            name: name.into(),
            recorder: ExchangeRecorder::new(config.filter, config.body_limit),
            entities: EntityCatalog::new(),
            endpoints: EndpointCatalog::new(),
            pages: Vec::new(),
            navigation: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route one traffic event.
    pub fn apply(&mut self, event: TrafficEvent) {
        match event {
            TrafficEvent::Request(request) => self.on_request(request),
            TrafficEvent::Response(response) => self.on_response(response),
        }
    }

    /// Apply every event already waiting on `rx`. Returns how many were applied.
    pub fn drain(&mut self, rx: &mut UnboundedReceiver<TrafficEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn on_request(&mut self, request: ObservedRequest) {
        let retained = self.recorder.record_request(
            &request.url,
            &request.method,
            request.headers,
            request.body,
        );
        if retained {
            self.endpoints.observe(&request.url, &request.method);
        }
    }

    /// Attach a response and, when its body is JSON, run entity inference on it.
    pub fn on_response(&mut self, response: ObservedResponse) {
        let matched = self
            .recorder
            .record_response(
                &response.url,
                response.status,
                response.headers,
                &response.body,
            )
            .is_some();
        if !matched {
            return;
        }

        self.endpoints.mark_response(&response.url);

        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(payload) => {
                let hits = self.entities.observe(&response.url, &payload);
                if hits > 0 {
                    tracing::debug!("Inferred {hits} entity records from {}", response.url);
                }
            }
            Err(e) => {
                tracing::debug!("Skipping inference for non-JSON body from {}: {e}", response.url);
            }
        }
    }

    /// Append a fully captured page.
    pub fn add_page(&mut self, page: PageSnapshot) {
        tracing::info!(
            "Captured page {} ({}): {} components",
            self.pages.len() + 1,
            page.name,
            page.components.total()
        );
        self.pages.push(page);
    }

    /// Record a page visit that failed.
    pub fn skip_page(&mut self, name: &str, url: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Skipping page {name} ({url}): {reason}");
        self.skipped.push(SkippedPage {
            name: name.to_string(),
            url: url.to_string(),
            reason,
        });
    }

    pub fn set_navigation(&mut self, links: Vec<NavLink>) {
        self.navigation = links;
    }

    pub fn exchanges(&self) -> &[Exchange] {
        self.recorder.exchanges()
    }

    pub fn recorder(&self) -> &ExchangeRecorder {
        &self.recorder
    }

    pub fn entities(&self) -> &EntityCatalog {
        &self.entities
    }

    pub fn endpoints(&self) -> &EndpointCatalog {
        &self.endpoints
    }

    pub fn pages(&self) -> &[PageSnapshot] {
        &self.pages
    }

    pub fn navigation(&self) -> &[NavLink] {
        &self.navigation
    }

    pub fn skipped(&self) -> &[SkippedPage] {
        &self.skipped
    }

    /// Build the final report from everything accumulated so far.
    pub fn report(&self) -> ArchitectureReport {
        aggregate(
            &self.recorder,
            &self.entities,
            &self.endpoints,
            &self.pages,
            &self.navigation,
            &self.skipped,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::ComponentSurvey;
    use crate::types::ArtifactRefs;
    use chrono::Utc;

    fn request(url: &str) -> TrafficEvent {
        TrafficEvent::Request(ObservedRequest {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: Headers::new(),
            body: None,
        })
    }

    fn response(url: &str, body: &str) -> TrafficEvent {
        TrafficEvent::Response(ObservedResponse {
            url: url.to_string(),
            status: 200,
            headers: Headers::new(),
            body: body.to_string(),
        })
    }

    fn session() -> ReconSession {
        ReconSession::new("test", SessionConfig::default())
    }

    #[test]
    fn test_json_response_feeds_inference_and_endpoints() {
        let mut s = session();
        let url = "https://app.test/api/clients/17";
        s.apply(request(url));
        s.apply(response(url, r#"{"id": 17, "name": "Jane", "phone": "555"}"#));

        assert_eq!(s.exchanges().len(), 1);
        assert!(s.entities().get("client").is_some());
        let ep = s.endpoints().get("https://app.test/api/clients/{id}").unwrap();
        assert_eq!(ep.call_count, 1);
        assert!(ep.has_example_response);
    }

    #[test]
    fn test_non_json_body_kept_without_inference() {
        let mut s = session();
        let url = "https://app.test/api/export";
        s.apply(request(url));
        s.apply(response(url, "<html>not json</html>"));

        assert!(s.entities().is_empty());
        let exchange = &s.exchanges()[0];
        assert_eq!(
            exchange.response.as_ref().unwrap().body.text,
            "<html>not json</html>"
        );
    }

    #[test]
    fn test_unmatched_response_ignored() {
        let mut s = session();
        s.apply(response("https://app.test/api/clients", r#"{"id": 1}"#));
        assert!(s.exchanges().is_empty());
        assert!(s.entities().is_empty());
        assert!(s.endpoints().is_empty());
    }

    #[test]
    fn test_non_api_traffic_not_counted() {
        let mut s = session();
        s.apply(request("https://app.test/dashboard"));
        s.apply(request("https://app.test/api/logo.png"));
        assert!(s.exchanges().is_empty());
        assert!(s.endpoints().is_empty());
    }

    #[test]
    fn test_inference_uses_full_body_when_truncated() {
        let config = SessionConfig {
            body_limit: 10,
            ..SessionConfig::default()
        };
        let mut s = ReconSession::new("small", config);
        let url = "https://app.test/api/staff";
        s.apply(request(url));
        s.apply(response(url, r#"{"id": 1, "role": "stylist"}"#));

        let body = &s.exchanges()[0].response.as_ref().unwrap().body;
        assert!(body.truncated);
        assert!(s.entities().get("staff").unwrap().fields.contains("role"));
    }

    #[tokio::test]
    async fn test_drain_applies_pending_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let url = "https://app.test/graphql";
        tx.send(request(url)).unwrap();
        tx.send(response(url, r#"{"data": {"items": [{"id": 1}]}}"#)).unwrap();

        let mut s = session();
        assert_eq!(s.drain(&mut rx), 2);
        assert_eq!(s.drain(&mut rx), 0);
        assert_eq!(s.recorder().answered_count(), 1);
        assert!(s.entities().get("graphql").is_some());
    }

    #[test]
    fn test_pages_and_skips_in_order() {
        let mut s = session();
        for name in ["dashboard", "calendar"] {
            s.add_page(PageSnapshot {
                name: name.to_string(),
                url: format!("https://app.test/{name}"),
                captured_at: Utc::now(),
                components: ComponentSurvey::default(),
                artifacts: ArtifactRefs::default(),
            });
        }
        s.skip_page("reports", "https://app.test/reports", "timed out");

        let names: Vec<_> = s.pages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dashboard", "calendar"]);
        assert_eq!(s.skipped()[0].reason, "timed out");
    }
}
