// src/document.rs
// Document model replayed into collections by the recovery engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A document (or edge) recovered from a DOCUMENT marker.
///
/// Mirrors the teacher crate's flatten-plus-manual-reinsertion trick for
/// `_id`/`_key`: `serde(flatten)` would otherwise swallow the key field
/// into `fields` without a dedicated accessor, so it is kept both as a
/// typed field and duplicated into `fields` on construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_key")]
    pub key: DocumentId,

    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// Document key. Untagged so it serializes as a bare scalar in `_key`,
/// matching ArangoDB's own key representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
}

impl DocumentId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocumentId::Int),
            Value::String(s) => Some(DocumentId::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentId::Int(i) => write!(f, "{i}"),
            DocumentId::String(s) => write!(f, "{s}"),
        }
    }
}

/// Distinguishes document collections from edge collections. Edge
/// collections additionally require `_from`/`_to` on every document but
/// replay treats both the same way from the recovery engine's vantage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl Document {
    pub fn new(key: DocumentId, fields: HashMap<String, Value>) -> Self {
        Document { key, fields }
    }

    /// Build a `Document` from a TBJSON payload object, pulling `_key`
    /// out if present or minting one from `_id`-less numeric fallback.
    pub fn from_payload(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let key = obj
            .get("_key")
            .and_then(DocumentId::from_value)
            .or_else(|| obj.get("_id").and_then(DocumentId::from_value))?;

        let mut fields: HashMap<String, Value> = obj
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.insert("_key".to_string(), serde_json::to_value(&key).ok()?);

        Some(Document { key, fields })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// In-place merge used by REMOVE-then-reinsert-as-update replay: the
    /// incoming payload's fields overwrite the existing ones, key untouched.
    pub fn merge_from(&mut self, other: &Document) {
        for (k, v) in &other.fields {
            if k == "_key" {
                continue;
            }
            self.fields.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_payload_extracts_key() {
        let payload = json!({"_key": "a", "v": 1});
        let doc = Document::from_payload(&payload).unwrap();
        assert_eq!(doc.key, DocumentId::String("a".to_string()));
        assert_eq!(doc.get("v"), Some(&json!(1)));
    }

    #[test]
    fn from_payload_falls_back_to_id() {
        let payload = json!({"_id": 7, "v": true});
        let doc = Document::from_payload(&payload).unwrap();
        assert_eq!(doc.key, DocumentId::Int(7));
    }

    #[test]
    fn from_payload_rejects_missing_key() {
        let payload = json!({"v": 1});
        assert!(Document::from_payload(&payload).is_none());
    }

    #[test]
    fn merge_overwrites_fields_but_not_key() {
        let mut a = Document::from_payload(&json!({"_key": "a", "v": 1})).unwrap();
        let b = Document::from_payload(&json!({"_key": "a", "v": 2, "w": 3})).unwrap();
        a.merge_from(&b);
        assert_eq!(a.get("v"), Some(&json!(2)));
        assert_eq!(a.get("w"), Some(&json!(3)));
        assert_eq!(a.key, DocumentId::String("a".to_string()));
    }
}
