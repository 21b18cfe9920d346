// recovery/resources.rs (C3 Resource Cache)
//
// `useDatabase`/`useCollection` with release-on-scope-exit semantics.
// The explicit `Drop` impl stands in for the original's destructor,
// which releases every cached handle (collections before their owning
// database) no matter which exit path recovery takes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{Catalog, Collection, Database};
use crate::error::{RecoveryError, Result};

pub struct ResourceCache {
    opened_databases: HashMap<u64, Arc<RwLock<Database>>>,
    opened_collections: HashMap<u64, Arc<RwLock<Collection>>>,
    collections_by_database: HashMap<u64, Vec<u64>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        ResourceCache {
            opened_databases: HashMap::new(),
            opened_collections: HashMap::new(),
            collections_by_database: HashMap::new(),
        }
    }

    pub fn use_database(&mut self, catalog: &Catalog, db: u64) -> Result<Arc<RwLock<Database>>> {
        if let Some(handle) = self.opened_databases.get(&db) {
            return Ok(handle.clone());
        }
        let handle = catalog
            .lookup_database_by_id(db)
            .ok_or(RecoveryError::DatabaseNotFound(db))?;
        self.opened_databases.insert(db, handle.clone());
        Ok(handle)
    }

    /// On first open, disables secondary indexes so CRUD replay costs
    /// no index maintenance; C7 re-enables and rebuilds them later.
    pub fn use_collection(
        &mut self,
        catalog: &Catalog,
        db: u64,
        cid: u64,
    ) -> Result<Arc<RwLock<Collection>>> {
        if let Some(handle) = self.opened_collections.get(&cid) {
            return Ok(handle.clone());
        }
        let handle = catalog
            .get_collection(db, cid)
            .ok_or(RecoveryError::CollectionNotFound(cid))?;
        handle.write().secondary_indexes_enabled = false;
        self.opened_collections.insert(cid, handle.clone());
        self.collections_by_database.entry(db).or_default().push(cid);
        Ok(handle)
    }

    /// Releases every cached collection belonging to `db` first, then
    /// the database handle itself (spec §4.3).
    pub fn release_database(&mut self, db: u64) {
        if let Some(cids) = self.collections_by_database.remove(&db) {
            for cid in cids {
                self.opened_collections.remove(&cid);
            }
        }
        self.opened_databases.remove(&db);
    }

    pub fn release_collection(&mut self, cid: u64) {
        self.opened_collections.remove(&cid);
    }

    pub fn opened_collections(&self) -> impl Iterator<Item = (u64, &Arc<RwLock<Collection>>)> {
        self.opened_collections.iter().map(|(k, v)| (*k, v))
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        self.opened_collections.clear();
        self.opened_databases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CollectionKind;

    #[test]
    fn use_collection_disables_secondary_indexes_on_first_open() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        catalog.create_database(7, "d").unwrap();
        catalog
            .create_collection(7, 9, "c", CollectionKind::Document, true)
            .unwrap();

        let mut cache = ResourceCache::new();
        let handle = cache.use_collection(&catalog, 7, 9).unwrap();
        assert!(!handle.read().secondary_indexes_enabled);
    }

    #[test]
    fn release_database_releases_owned_collections_first() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        catalog.create_database(7, "d").unwrap();
        catalog
            .create_collection(7, 9, "c", CollectionKind::Document, true)
            .unwrap();

        let mut cache = ResourceCache::new();
        cache.use_database(&catalog, 7).unwrap();
        cache.use_collection(&catalog, 7, 9).unwrap();
        cache.release_database(7);
        assert_eq!(cache.opened_collections().count(), 0);
    }

    #[test]
    fn missing_database_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let mut cache = ResourceCache::new();
        assert!(matches!(
            cache.use_database(&catalog, 1),
            Err(RecoveryError::DatabaseNotFound(1))
        ));
    }
}
