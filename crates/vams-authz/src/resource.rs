//! Resource objects evaluated by constraint rules.
//!
//! # Purpose
//! Callers describe the record being accessed as a typed key-value bag. Every
//! bag declares an `object_type` (or, for route checks, a `route_path`).
//!
//! # How it fits
//! Before evaluation the engine widens the caller's object with
//! [`FieldDefaults`] so that rules referencing well-known fields never fail on
//! an absent attribute.
//!
//! # Key invariants
//! - Widening only fills absent fields; caller-supplied values always win.
//! - Legacy keys `object__type` / `route__path` are normalized on insert.
//!
//! # Examples
//! ```rust
//! use vams_authz::{AttrValue, FieldDefaults, ResourceObject};
//!
//! let asset = ResourceObject::new("asset").with("databaseId", "db1");
//! let widened = asset.widen(&FieldDefaults::standard());
//! assert_eq!(widened.get("databaseId"), Some(&AttrValue::from("db1")));
//! assert_eq!(widened.get("tags"), Some(&AttrValue::List(Vec::new())));
//! ```
//!
//! # Common pitfalls
//! - Nested JSON objects are flattened to their JSON text; criteria cannot
//!   reach inside them.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const OBJECT_TYPE_FIELD: &str = "object_type";
pub const ROUTE_PATH_FIELD: &str = "route_path";
pub const API_OBJECT_TYPE: &str = "api";

const LEGACY_FIELD_ALIASES: [(&str, &str); 2] = [
    ("object__type", OBJECT_TYPE_FIELD),
    ("route__path", ROUTE_PATH_FIELD),
];

fn canonical_field(field: &str) -> &str {
    LEGACY_FIELD_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == field)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(field)
}

/// Attribute value carried by a resource object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    List(Vec<String>),
}

impl AttrValue {
    pub fn empty_text() -> Self {
        Self::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::List(_) => None,
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::empty_text(),
            Value::String(text) => Self::Text(text.clone()),
            Value::Bool(_) | Value::Number(_) | Value::Object(_) => Self::Text(value.to_string()),
            Value::Array(items) => Self::List(items.iter().map(scalar_text).collect()),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for AttrValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Typed key-value description of the record being authorized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceObject {
    fields: BTreeMap<String, AttrValue>,
}

impl ResourceObject {
    /// Start a resource of the given kind (`asset`, `database`, `api`, ...).
    pub fn new(object_type: impl Into<String>) -> Self {
        let mut resource = Self::default();
        resource.insert(OBJECT_TYPE_FIELD, AttrValue::Text(object_type.into()));
        resource
    }

    /// Synthetic resource used for coarse API-route checks.
    pub fn api_route(route_path: impl Into<String>) -> Self {
        Self::new(API_OBJECT_TYPE).with(ROUTE_PATH_FIELD, AttrValue::Text(route_path.into()))
    }

    /// Build a resource from a JSON object, stringifying scalars.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidResource`] when `value` is not a JSON object.
    pub fn from_json(value: &Value) -> AuthzResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| AuthzError::InvalidResource("expected a JSON object".to_string()))?;
        let mut resource = Self::default();
        for (field, item) in map {
            resource.insert(field, AttrValue::from_json(item));
        }
        Ok(resource)
    }

    pub fn with(mut self, field: &str, value: impl Into<AttrValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: AttrValue) {
        self.fields.insert(canonical_field(field).to_string(), value);
    }

    pub fn get(&self, field: &str) -> Option<&AttrValue> {
        self.fields.get(canonical_field(field))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(canonical_field(field))
    }

    pub fn object_type(&self) -> Option<&str> {
        self.get(OBJECT_TYPE_FIELD).and_then(AttrValue::as_text)
    }

    pub fn route_path(&self) -> Option<&str> {
        self.get(ROUTE_PATH_FIELD).and_then(AttrValue::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Copy of this object with every absent default field filled in.
    pub fn widen(&self, defaults: &FieldDefaults) -> Self {
        let mut widened = self.clone();
        for (field, value) in defaults.iter() {
            widened
                .fields
                .entry(field.to_string())
                .or_insert_with(|| value.clone());
        }
        widened
    }

    /// Insert an empty-text value for `field` if it is absent.
    ///
    /// Returns `true` when the field was added.
    pub fn backfill(&mut self, field: &str) -> bool {
        if self.contains(field) {
            return false;
        }
        self.insert(field, AttrValue::empty_text());
        true
    }
}

/// Default-value table applied before evaluation.
///
/// # Summary
/// Maps well-known constraint fields to the value used when a caller omits
/// them: empty text, or an empty list for list-shaped fields such as `tags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefaults {
    fields: BTreeMap<String, AttrValue>,
}

const STANDARD_TEXT_FIELDS: [&str; 15] = [
    "databaseId",
    "assetName",
    "assetType",
    "tagName",
    "tagTypeName",
    "roleName",
    "userId",
    "pipelineId",
    "pipelineType",
    "pipelineExecutionType",
    "workflowId",
    "metadataSchemaName",
    "metadataSchemaEntityType",
    OBJECT_TYPE_FIELD,
    ROUTE_PATH_FIELD,
];

const STANDARD_LIST_FIELDS: [&str; 1] = ["tags"];

impl FieldDefaults {
    /// Empty table; nothing is widened.
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// The asset-management field set.
    pub fn standard() -> Self {
        let mut defaults = Self::empty();
        for field in STANDARD_TEXT_FIELDS {
            defaults = defaults.with_text(field);
        }
        for field in STANDARD_LIST_FIELDS {
            defaults = defaults.with_list(field);
        }
        defaults
    }

    pub fn with_text(mut self, field: &str) -> Self {
        self.fields
            .insert(canonical_field(field).to_string(), AttrValue::empty_text());
        self
    }

    pub fn with_list(mut self, field: &str) -> Self {
        self.fields
            .insert(canonical_field(field).to_string(), AttrValue::List(Vec::new()));
        self
    }

    pub fn get(&self, field: &str) -> Option<&AttrValue> {
        self.fields.get(canonical_field(field))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self::standard()
    }
}
