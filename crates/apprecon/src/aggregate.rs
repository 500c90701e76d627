//! Architecture aggregator — folds session state into one report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::endpoints::EndpointCatalog;
use crate::inference::EntityCatalog;
use crate::recorder::ExchangeRecorder;
use crate::types::{EndpointTemplate, EntityType, NavLink, PageSnapshot, SkippedPage};

/// Headline numbers for a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_pages: usize,
    pub total_exchanges: usize,
    pub answered_exchanges: usize,
    pub entity_names: Vec<String>,
    pub endpoint_count: usize,
    pub navigation_items: usize,
    pub skipped_pages: usize,
}

/// The complete output of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub navigation: Vec<NavLink>,
    pub entities: BTreeMap<String, EntityType>,
    /// Visited pages in visit order.
    pub pages: Vec<PageSnapshot>,
    pub endpoints: BTreeMap<String, EndpointTemplate>,
    pub skipped: Vec<SkippedPage>,
}

/// Merge accumulated state into a report. Performs no inference.
pub fn aggregate(
    recorder: &ExchangeRecorder,
    entities: &EntityCatalog,
    endpoints: &EndpointCatalog,
    pages: &[PageSnapshot],
    navigation: &[NavLink],
    skipped: &[SkippedPage],
) -> ArchitectureReport {
    let summary = ReportSummary {
        total_pages: pages.len(),
        total_exchanges: recorder.len(),
        answered_exchanges: recorder.answered_count(),
        entity_names: entities.names().map(String::from).collect(),
        endpoint_count: endpoints.len(),
        navigation_items: navigation.len(),
        skipped_pages: skipped.len(),
    };

    ArchitectureReport {
        generated_at: Utc::now(),
        summary,
        navigation: navigation.to_vec(),
        entities: entities.to_map(),
        pages: pages.to_vec(),
        endpoints: endpoints.to_map(),
        skipped: skipped.to_vec(),
    }
}

impl ArchitectureReport {
    /// Endpoints ordered by call count, busiest first. Ties keep template order.
    pub fn endpoints_by_traffic(&self) -> Vec<&EndpointTemplate> {
        let mut ranked: Vec<_> = self.endpoints.values().collect();
        ranked.sort_by(|a, b| b.call_count.cmp(&a.call_count));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Headers;
    use serde_json::json;

    #[test]
    fn test_aggregate_counts() {
        let mut recorder = ExchangeRecorder::default();
        let url = "https://app.test/api/clients/1";
        recorder.record_request(url, "GET", Headers::new(), None);
        recorder.record_request("https://app.test/api/staff", "GET", Headers::new(), None);
        recorder.record_response(url, 200, Headers::new(), "{}");

        let mut entities = EntityCatalog::new();
        entities.observe(url, &json!({"id": 1}));
        let mut endpoints = EndpointCatalog::new();
        endpoints.observe(url, "GET");
        endpoints.observe("https://app.test/api/staff", "GET");
        endpoints.observe("https://app.test/api/staff", "GET");

        let nav = vec![NavLink {
            text: "Calendar".into(),
            href: "https://app.test/calendar".into(),
            has_icon: false,
        }];
        let report = aggregate(&recorder, &entities, &endpoints, &[], &nav, &[]);

        assert_eq!(report.summary.total_exchanges, 2);
        assert_eq!(report.summary.answered_exchanges, 1);
        assert_eq!(report.summary.entity_names, vec!["client"]);
        assert_eq!(report.summary.endpoint_count, 2);
        assert_eq!(report.summary.navigation_items, 1);
        assert_eq!(report.summary.total_pages, 0);
        assert_eq!(
            report.endpoints_by_traffic()[0].template,
            "https://app.test/api/staff"
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = aggregate(
            &ExchangeRecorder::default(),
            &EntityCatalog::new(),
            &EndpointCatalog::new(),
            &[],
            &[],
            &[SkippedPage {
                name: "reports".into(),
                url: "https://app.test/reports".into(),
                reason: "timeout".into(),
            }],
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["skipped_pages"], 1);
        assert_eq!(value["skipped"][0]["reason"], "timeout");
        assert!(value["entities"].as_object().unwrap().is_empty());
    }
}
