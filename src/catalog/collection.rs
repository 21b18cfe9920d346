// catalog/collection.rs
// A single collection's in-memory replay target: documents, tickMax,
// and the secondary indexes rebuilt by C7.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::index::{IndexDefinition, SecondaryIndex};
use crate::document::{CollectionKind, Document, DocumentId};

pub struct Collection {
    pub id: u64,
    pub name: String,
    pub kind: CollectionKind,
    pub is_system: bool,
    pub volatile: bool,
    pub force_sync_properties: bool,
    pub dir: PathBuf,
    /// Highest tick ever durably applied (I5).
    pub tick_max: u64,
    pub documents: HashMap<DocumentId, Document>,
    /// Secondary indexes disabled on first `useCollection` (C3), re-enabled by C7.
    pub secondary_indexes_enabled: bool,
    pub indexes: HashMap<u64, SecondaryIndex>,
}

impl Collection {
    pub fn new(id: u64, name: String, kind: CollectionKind, dir: PathBuf) -> Self {
        let is_system = name.starts_with('_');
        Collection {
            id,
            name,
            kind,
            is_system,
            volatile: false,
            force_sync_properties: true,
            dir,
            tick_max: 0,
            documents: HashMap::new(),
            secondary_indexes_enabled: true,
            indexes: HashMap::new(),
        }
    }

    /// Insert-or-update: tries an insert, falls back to an update on
    /// key collision, mirroring the unique-constraint-violation retry
    /// the replayer performs for DOCUMENT markers (spec §4.5).
    pub fn upsert_document(&mut self, doc: Document) {
        match self.documents.get_mut(&doc.key) {
            Some(existing) => existing.merge_from(&doc),
            None => {
                self.documents.insert(doc.key.clone(), doc);
            }
        }
    }

    /// REMOVE is idempotent: a missing key is a no-op, not an error.
    pub fn remove_document(&mut self, key: &DocumentId) {
        self.documents.remove(key);
    }

    pub fn add_index(&mut self, def: IndexDefinition) {
        self.indexes.insert(def.iid, SecondaryIndex::new(def));
    }

    pub fn drop_index(&mut self, iid: u64) {
        self.indexes.remove(&iid);
    }

    /// C7: rebuild every index's contents from the current document set.
    pub fn rebuild_indexes(&mut self) {
        for index in self.indexes.values_mut() {
            index.clear();
            let Some(def) = index.definition.clone() else { continue };
            for (id, doc) in &self.documents {
                if let Some(value) = doc.get(&def.field) {
                    index.insert((value).into(), id.clone());
                }
            }
        }
        self.secondary_indexes_enabled = true;
    }
}
