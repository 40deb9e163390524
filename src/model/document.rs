//! JSON-API wire shapes.
//!
//! See <http://jsonapi.org/format/>. Everything here is a plain serde mirror of
//! the document; graph semantics live in `logic::payload`.

use crate::model::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub jsonapi: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PrimaryData>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
}

impl Document {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    /// Wire type, e.g. "ImageTag". Tolerated as absent on input.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Persistence state, emitted on every resource this crate encodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Record>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, Relationship>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl ResourceObject {
    /// `{type, id, exists}` only
    pub fn reference(&self) -> ResourceObject {
        ResourceObject {
            kind: self.kind.clone(),
            id: self.id.clone(),
            exists: self.exists,
            ..Default::default()
        }
    }

    /// Resources with a full body carry attributes or relationships; bare
    /// references carry neither.
    pub fn has_body(&self) -> bool {
        self.attributes.is_some() || self.relationships.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Linkage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl Relationship {
    pub fn to_one(item: ResourceObject) -> Self {
        Self {
            data: Some(Linkage::One(Box::new(item))),
            ..Default::default()
        }
    }

    pub fn to_many(items: Vec<ResourceObject>) -> Self {
        Self {
            data: Some(Linkage::Many(items)),
            ..Default::default()
        }
    }
}

/// Relationship `data`: one resource (reference or inline) or an ordered list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
}

impl Linkage {
    pub fn is_many(&self) -> bool {
        matches!(self, Linkage::Many(_))
    }

    pub fn items(&self) -> Vec<&ResourceObject> {
        match self {
            Linkage::Many(items) => items.iter().collect(),
            Linkage::One(item) => vec![item.as_ref()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    /// Per-field messages, index-aligned for validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ErrorObject {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status: Some(status.to_string()),
            code: Some(Value::from(status)),
            title: Some(title.into()),
            ..Default::default()
        }
    }
}
