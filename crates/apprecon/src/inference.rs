//! Entity inference engine — proposes entity types from decoded API payloads.
//!
//! Walks a JSON value and classifies every record that carries an
//! identity-like key. The entity name comes from, in order: the record's own
//! `type` field, the first matching row of [`ENTITY_KEYWORDS`] against the
//! URL host and path, the last non-numeric path segment, or `"unknown"`.
//!
//! This is a heuristic. Synonyms that share a keyword row ("booking" and
//! "reservation") are merged into one entity on purpose.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::EntityType;

/// Keys whose presence marks a record as an entity instance.
pub const IDENTITY_KEYS: [&str; 5] = ["id", "uuid", "type", "name", "title"];

/// Ordered keyword table for URL-based naming. First match wins.
pub const ENTITY_KEYWORDS: &[(&str, &[&str])] = &[
    ("appointment", &["appointment", "booking", "reservation"]),
    ("client", &["client", "customer", "user", "member"]),
    ("service", &["service", "treatment", "product"]),
    ("staff", &["staff", "employee", "team", "worker"]),
    ("location", &["location", "venue", "branch", "salon"]),
    ("schedule", &["schedule", "calendar", "availability", "slot"]),
    ("payment", &["payment", "transaction", "invoice", "charge"]),
    ("notification", &["notification", "message", "alert"]),
];

/// Name used when nothing else identifies a record.
pub const UNKNOWN_ENTITY: &str = "unknown";

/// Maximum number of list elements inspected per list.
pub const LIST_SAMPLE_LIMIT: usize = 5;

/// The three shapes a payload node can take.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    Record(&'a Map<String, Value>),
    List(&'a [Value]),
    Scalar,
}

impl<'a> From<&'a Value> for Shape<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Shape::Record(map),
            Value::Array(items) => Shape::List(items),
            _ => Shape::Scalar,
        }
    }
}

/// Entity types inferred so far, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: BTreeMap<String, EntityType>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `payload` received from `url` and fold every entity-like record in.
    ///
    /// Returns the number of records classified.
    pub fn observe(&mut self, url: &str, payload: &Value) -> usize {
        self.walk(url, payload)
    }

    fn walk(&mut self, url: &str, value: &Value) -> usize {
        match Shape::from(value) {
            Shape::Record(record) => {
                let mut hits = 0;
                if is_entity_record(record) {
                    let name = classify(url, record);
                    self.entities
                        .entry(name.clone())
                        .or_insert_with(|| EntityType::new(name))
                        .absorb(record);
                    hits += 1;
                }
                for nested in record.values() {
                    hits += self.walk(url, nested);
                }
                hits
            }
            Shape::List(items) => items
                .iter()
                .take(LIST_SAMPLE_LIMIT)
                .map(|item| self.walk(url, item))
                .sum(),
            Shape::Scalar => 0,
        }
    }

    /// Fold another catalog into this one. Field sets are unioned.
    pub fn merge(&mut self, other: &EntityCatalog) {
        for (name, entity) in &other.entities {
            self.entities
                .entry(name.clone())
                .or_insert_with(|| EntityType::new(name.clone()))
                .merge(entity);
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot of all entity types by name.
    pub fn to_map(&self) -> BTreeMap<String, EntityType> {
        self.entities.clone()
    }
}

/// Whether a record carries any identity-like key.
pub fn is_entity_record(record: &Map<String, Value>) -> bool {
    IDENTITY_KEYS.iter().any(|key| record.contains_key(*key))
}

/// Decide the entity name for a record received from `url`.
pub fn classify(url: &str, record: &Map<String, Value>) -> String {
    if let Some(name) = record.get("type").and_then(type_field_name) {
        return name;
    }

    let (host, path) = split_url(url);
    let haystack = format!("{host}{path}").to_lowercase();
    for (entity, keywords) in ENTITY_KEYWORDS {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return (*entity).to_string();
        }
    }

    path.rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_ENTITY.to_string())
}

/// Usable entity name from a record's `type` field.
fn type_field_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

/// Host and path of a URL. Relative URLs yield an empty host.
fn split_url(url: &str) -> (String, String) {
    match url::Url::parse(url) {
        Ok(parsed) => (
            parsed.host_str().unwrap_or_default().to_string(),
            parsed.path().to_string(),
        ),
        Err(_) => (
            String::new(),
            url.split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        ),
    }
}
