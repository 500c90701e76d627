//! Endpoint normalizer — collapses concrete URLs into route templates.
//!
//! Path segments that look like opaque identifiers (20+ hex or hyphen
//! characters) become `{id}`, then purely numeric segments become `{id}`.
//! Scheme, host, and port are kept; query strings and fragments are not
//! part of a route.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::EndpointTemplate;

/// Placeholder substituted for identifier segments.
pub const ID_PLACEHOLDER: &str = "{id}";

fn opaque_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F-]{20,}$").expect("opaque id regex is valid"))
}

fn numeric_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").expect("numeric id regex is valid"))
}

/// Normalize a concrete URL (absolute or path-only) into its route template.
pub fn normalize(url: &str) -> String {
    let (origin, path) = match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => {
            let mut origin = format!(
                "{}://{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or_default()
            );
            if let Some(port) = parsed.port() {
                origin.push_str(&format!(":{port}"));
            }
            // `Url` percent-encodes `{` and `}`; undo that so templates stay idempotent.
            let path = parsed.path().replace("%7Bid%7D", ID_PLACEHOLDER);
            (origin, path)
        }
        _ => (
            String::new(),
            url.split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        ),
    };

    format!("{origin}{}", normalize_path(&path))
}

fn normalize_path(path: &str) -> String {
    let opaque: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if opaque_id_re().is_match(segment) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect();

    opaque
        .into_iter()
        .map(|segment| {
            if numeric_id_re().is_match(segment) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Endpoint templates seen so far, keyed by template string.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    endpoints: BTreeMap<String, EndpointTemplate>,
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one call to `url`. The first call of a template fixes its example URL and method.
    pub fn observe(&mut self, url: &str, method: &str) -> &EndpointTemplate {
        let template = normalize(url);
        let entry = self
            .endpoints
            .entry(template.clone())
            .or_insert_with(|| EndpointTemplate {
                template,
                example_url: url.to_string(),
                method: method.to_ascii_uppercase(),
                call_count: 0,
                has_example_response: false,
            });
        entry.call_count += 1;
        entry
    }

    /// Note that a call to `url` received a response.
    pub fn mark_response(&mut self, url: &str) {
        if let Some(entry) = self.endpoints.get_mut(&normalize(url)) {
            entry.has_example_response = true;
        }
    }

    /// Fold another catalog into this one. Counts add; response flags OR.
    pub fn merge(&mut self, other: &EndpointCatalog) {
        for (template, endpoint) in &other.endpoints {
            match self.endpoints.get_mut(template) {
                Some(existing) => {
                    existing.call_count += endpoint.call_count;
                    existing.has_example_response |= endpoint.has_example_response;
                }
                None => {
                    self.endpoints.insert(template.clone(), endpoint.clone());
                }
            }
        }
    }

    pub fn get(&self, template: &str) -> Option<&EndpointTemplate> {
        self.endpoints.get(template)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointTemplate> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Total calls across all templates.
    pub fn total_calls(&self) -> u64 {
        self.endpoints.values().map(|e| e.call_count).sum()
    }

    /// Snapshot of all templates by template string.
    pub fn to_map(&self) -> BTreeMap<String, EndpointTemplate> {
        self.endpoints.clone()
    }
}
