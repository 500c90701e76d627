//! Core data types for observed traffic, inferred entities, and visited pages.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::survey::ComponentSurvey;

/// Maximum number of example records kept per entity type.
pub const MAX_ENTITY_EXAMPLES: usize = 3;

/// HTTP headers with case-insensitive names.
///
/// Names are stored lower-cased; repeated names are joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, joining with any existing value for the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.0
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Look up a header by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// A response body cut to a byte ceiling.
///
/// `original_len` is the byte length before truncation, so consumers can
/// tell a complete body from a partial one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedBody {
    pub text: String,
    pub original_len: usize,
    pub truncated: bool,
}

impl CapturedBody {
    /// Capture `body`, truncating at the last character boundary within `ceiling` bytes.
    pub fn capture(body: &str, ceiling: usize) -> Self {
        if body.len() <= ceiling {
            return Self {
                text: body.to_string(),
                original_len: body.len(),
                truncated: false,
            };
        }

        let mut cut = ceiling;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }

        Self {
            text: body[..cut].to_string(),
            original_len: body.len(),
            truncated: true,
        }
    }
}

/// The response half of an [`Exchange`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// URL the response was delivered for. Always equal to the request URL.
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: CapturedBody,
    pub received_at: DateTime<Utc>,
}

/// One observed request, and its response once it arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub url: String,
    pub method: String,
    pub request_headers: Headers,
    pub request_body: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub response: Option<ExchangeResponse>,
}

impl Exchange {
    /// Whether a response has been attached.
    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }
}

/// An inferred domain concept ("appointment", "client", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Every field name ever observed on a record of this type.
    pub fields: BTreeSet<String>,
    /// Up to [`MAX_ENTITY_EXAMPLES`] records, first seen first.
    pub examples: Vec<Value>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeSet::new(),
            examples: Vec::new(),
        }
    }

    /// Fold one classified record into this type.
    pub fn absorb(&mut self, record: &Map<String, Value>) {
        self.fields.extend(record.keys().cloned());
        if self.examples.len() < MAX_ENTITY_EXAMPLES {
            self.examples.push(Value::Object(record.clone()));
        }
    }

    /// Merge another observation set of the same entity into this one.
    pub fn merge(&mut self, other: &EntityType) {
        self.fields.extend(other.fields.iter().cloned());
        for example in &other.examples {
            if self.examples.len() >= MAX_ENTITY_EXAMPLES {
                break;
            }
            self.examples.push(example.clone());
        }
    }
}

/// A normalized API route such as `/api/clients/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub template: String,
    /// First concrete URL seen for this template.
    pub example_url: String,
    /// Method of the first call seen for this template.
    pub method: String,
    pub call_count: u64,
    pub has_example_response: bool,
}

/// A navigation link discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub text: String,
    pub href: String,
    pub has_icon: bool,
}

/// A bounding box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where the files for a captured page were persisted, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRefs {
    pub folder: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub document: Option<PathBuf>,
    pub styles: Option<PathBuf>,
    pub components: Option<PathBuf>,
}

/// One visited screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub name: String,
    /// Final URL after navigation and redirects.
    pub url: String,
    pub captured_at: DateTime<Utc>,
    pub components: ComponentSurvey,
    pub artifacts: ArtifactRefs,
}

/// A page visit that failed and contributed nothing to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPage {
    pub name: String,
    pub url: String,
    pub reason: String,
}

/// Errors that can occur in the reconnaissance library.
#[derive(thiserror::Error, Debug)]
pub enum ReconError {
    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_case_insensitive() {
        let headers: Headers = [("Content-Type", "application/json"), ("X-Trace", "a")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("x-trace"), Some("a"));
        assert!(headers.get("accept").is_none());
    }

    #[test]
    fn test_headers_repeated_names_join() {
        let mut headers = Headers::new();
        headers.insert("Set-Cookie", "a=1");
        headers.insert("set-cookie", "b=2");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Set-Cookie"), Some("a=1, b=2"));
    }

    #[test]
    fn test_captured_body_under_ceiling() {
        let body = CapturedBody::capture("{\"ok\":true}", 100);
        assert!(!body.truncated);
        assert_eq!(body.text, "{\"ok\":true}");
        assert_eq!(body.original_len, 11);
    }

    #[test]
    fn test_captured_body_truncates_on_char_boundary() {
        // "é" is two bytes; a ceiling of 4 lands inside the second one.
        let body = CapturedBody::capture("aéé", 4);
        assert!(body.truncated);
        assert_eq!(body.text, "aé");
        assert_eq!(body.original_len, 5);
    }

    #[test]
    fn test_entity_examples_capped() {
        let mut entity = EntityType::new("client");
        for i in 0..5 {
            let record = json!({"id": i});
            entity.absorb(record.as_object().unwrap());
        }
        assert_eq!(entity.examples.len(), MAX_ENTITY_EXAMPLES);
        assert_eq!(entity.examples[0]["id"], 0);
        assert_eq!(entity.examples[2]["id"], 2);
    }

    #[test]
    fn test_entity_merge_unions_fields() {
        let mut a = EntityType::new("client");
        a.absorb(json!({"id": 1, "name": "A"}).as_object().unwrap());
        let mut b = EntityType::new("client");
        b.absorb(json!({"id": 2, "email": "b@x"}).as_object().unwrap());

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab.fields, ba.fields);
        assert_eq!(ab.fields.len(), 3);
        assert_eq!(ab.examples.len(), 2);
    }
}
