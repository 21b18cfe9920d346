// catalog/index.rs
// Compact secondary-index abstraction (C7's rebuild target). The
// teacher's on-disk B+Tree is replaced here by an in-memory ordered
// map, since the recovery engine only needs to materialize an index's
// *contents* from scratch during replay, not manage its pages.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::DocumentId;
use crate::error::Result;

/// Ordering key extracted from an indexed field. Mirrors the teacher's
/// `IndexKey` enum and `Ord` impl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat),
    String(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use IndexKey::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Bool(_), _) => Ordering::Less,
            (_, Bool(_)) => Ordering::Greater,
            (Int(a), Int(b)) => a.cmp(b),
            (Int(_), _) => Ordering::Less,
            (_, Int(_)) => Ordering::Greater,
            (Float(a), Float(b)) => a.cmp(b),
            (Float(_), _) => Ordering::Less,
            (_, Float(_)) => Ordering::Greater,
            (String(a), String(b)) => a.cmp(b),
        }
    }
}

impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => IndexKey::Null,
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    IndexKey::Int(i)
                } else if let Some(f) = n.as_f64() {
                    IndexKey::Float(OrderedFloat(f))
                } else {
                    IndexKey::Null
                }
            }
            Value::String(s) => IndexKey::String(s.clone()),
            _ => IndexKey::Null,
        }
    }
}

/// A single secondary index on one field of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub iid: u64,
    pub field: String,
}

#[derive(Debug, Default)]
pub struct SecondaryIndex {
    pub definition: Option<IndexDefinition>,
    entries: BTreeMap<IndexKey, Vec<DocumentId>>,
}

impl SecondaryIndex {
    pub fn new(definition: IndexDefinition) -> Self {
        SecondaryIndex {
            definition: Some(definition),
            entries: BTreeMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, key: IndexKey, id: DocumentId) {
        self.entries.entry(key).or_default().push(id);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, key: &IndexKey) -> &[DocumentId] {
        self.entries.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Path convention from spec §6: `index-<iid>.json` inside the
/// collection's directory.
pub fn index_file_path(collection_dir: &Path, iid: u64) -> PathBuf {
    collection_dir.join(format!("index-{iid}.json"))
}

/// Writes (overwriting) the index definition file. Uses the same
/// bincode-first idiom as the teacher's metadata header, even though
/// the payload here is small enough not to need a reserved-space
/// scheme.
pub fn write_index_file(collection_dir: &Path, def: &IndexDefinition) -> Result<()> {
    std::fs::create_dir_all(collection_dir)?;
    let path = index_file_path(collection_dir, def.iid);
    let bytes = bincode::serialize(def)
        .map_err(|e| crate::error::RecoveryError::Serialization(e.to_string()))?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

pub fn read_index_file(collection_dir: &Path, iid: u64) -> Result<IndexDefinition> {
    let path = index_file_path(collection_dir, iid);
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    bincode::deserialize(&bytes)
        .map_err(|e| crate::error::RecoveryError::Corruption(format!("invalid index file: {e}")))
}

pub fn remove_index_file(collection_dir: &Path, iid: u64) -> Result<()> {
    let path = index_file_path(collection_dir, iid);
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_type_precedence() {
        assert!(IndexKey::Null < IndexKey::Bool(false));
        assert!(IndexKey::Bool(true) < IndexKey::Int(0));
        assert!(IndexKey::Int(5) < IndexKey::Float(OrderedFloat(0.1)));
        assert!(IndexKey::Float(OrderedFloat(9.9)) < IndexKey::String("a".into()));
    }

    #[test]
    fn nan_sorts_greatest() {
        let nan = OrderedFloat(f64::NAN);
        let one = OrderedFloat(1.0);
        assert!(one < nan);
    }

    #[test]
    fn index_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let def = IndexDefinition { iid: 5, field: "v".into() };
        write_index_file(dir.path(), &def).unwrap();
        let read_back = read_index_file(dir.path(), 5).unwrap();
        assert_eq!(read_back.iid, 5);
        assert_eq!(read_back.field, "v");
        remove_index_file(dir.path(), 5).unwrap();
        assert!(read_index_file(dir.path(), 5).is_err());
    }
}
