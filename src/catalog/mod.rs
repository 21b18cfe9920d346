// catalog/mod.rs
// Multi-database catalog: the "collaborator" spec.md §6 names
// (`lookupDatabaseById/Name`, `createDatabase`, `dropDatabaseById/Name`,
// `lookupCollectionById/Name`, `createCollection`, `dropCollection`,
// `renameCollection`, `updateCollectionInfo`, `dropIndex`,
// `removeIndexFile`), implemented in-process rather than mocked, since
// the recovery engine is the thing under implementation here and the
// real storage engine's document operations are out of scope (spec §1).

pub mod collection;
pub mod database;
pub mod index;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::CollectionKind;
use crate::error::{RecoveryError, Result};

pub use collection::Collection;
pub use database::Database;
pub use index::{IndexDefinition, SecondaryIndex};

pub struct Catalog {
    base_dir: PathBuf,
    databases: RwLock<HashMap<u64, Arc<RwLock<Database>>>>,
    databases_by_name: RwLock<HashMap<String, u64>>,
}

impl Catalog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Catalog {
            base_dir: base_dir.into(),
            databases: RwLock::new(HashMap::new()),
            databases_by_name: RwLock::new(HashMap::new()),
        }
    }

    pub fn database_dir(&self, id: u64) -> PathBuf {
        self.base_dir.join(format!("database-{id}"))
    }

    pub fn lookup_database_by_id(&self, id: u64) -> Option<Arc<RwLock<Database>>> {
        self.databases.read().get(&id).cloned()
    }

    pub fn lookup_database_id_by_name(&self, name: &str) -> Option<u64> {
        self.databases_by_name.read().get(name).copied()
    }

    pub fn database_dir_exists(&self, id: u64) -> bool {
        self.database_dir(id).is_dir()
    }

    pub fn create_database(&self, id: u64, name: &str) -> Result<Arc<RwLock<Database>>> {
        let dir = self.database_dir(id);
        std::fs::create_dir_all(&dir)?;
        let db = Database::new(id, name.to_string(), dir);
        let handle = Arc::new(RwLock::new(db));
        self.databases.write().insert(id, handle.clone());
        self.databases_by_name.write().insert(name.to_string(), id);
        Ok(handle)
    }

    /// Best-effort: caller (replayer) decides whether directory removal
    /// failures are fatal.
    pub fn drop_database_by_id(&self, id: u64) -> Result<bool> {
        let removed = self.databases.write().remove(&id);
        if let Some(db) = &removed {
            let name = db.read().name.clone();
            self.databases_by_name.write().remove(&name);
        }
        let dir = self.database_dir(id);
        let _ = std::fs::remove_dir_all(dir);
        Ok(removed.is_some())
    }

    pub fn drop_database_by_name(&self, name: &str) -> Result<bool> {
        if let Some(id) = self.lookup_database_id_by_name(name) {
            self.drop_database_by_id(id)
        } else {
            Ok(false)
        }
    }

    pub fn create_collection(
        &self,
        db_id: u64,
        cid: u64,
        name: &str,
        kind: CollectionKind,
        force_sync_properties: bool,
    ) -> Result<Arc<RwLock<Collection>>> {
        let db_handle = self
            .lookup_database_by_id(db_id)
            .ok_or(RecoveryError::DatabaseNotFound(db_id))?;
        let mut db = db_handle.write();
        let dir = db.collection_dir(cid);
        std::fs::create_dir_all(&dir)?;
        let mut collection = Collection::new(cid, name.to_string(), kind, dir);
        collection.force_sync_properties = force_sync_properties;
        Ok(db.insert_collection(collection))
    }

    pub fn drop_collection_by_id(&self, db_id: u64, cid: u64) -> Result<bool> {
        let db_handle = self
            .lookup_database_by_id(db_id)
            .ok_or(RecoveryError::DatabaseNotFound(db_id))?;
        let mut db = db_handle.write();
        let removed = db.remove_collection(cid);
        if let Some(handle) = &removed {
            let dir = handle.read().dir.clone();
            let _ = std::fs::remove_dir_all(dir);
        }
        Ok(removed.is_some())
    }

    pub fn drop_collection_by_name(&self, db_id: u64, name: &str) -> Result<bool> {
        let cid = {
            let db_handle = self
                .lookup_database_by_id(db_id)
                .ok_or(RecoveryError::DatabaseNotFound(db_id))?;
            db_handle.read().lookup_collection_id_by_name(name)
        };
        match cid {
            Some(cid) => self.drop_collection_by_id(db_id, cid),
            None => Ok(false),
        }
    }

    pub fn lookup_collection_id_by_name(&self, db_id: u64, name: &str) -> Option<u64> {
        self.lookup_database_by_id(db_id)?
            .read()
            .lookup_collection_id_by_name(name)
    }

    pub fn get_collection(&self, db_id: u64, cid: u64) -> Option<Arc<RwLock<Collection>>> {
        self.lookup_database_by_id(db_id)?.read().collections.get(&cid).cloned()
    }

    pub fn rename_collection(&self, db_id: u64, cid: u64, new_name: &str) -> Result<()> {
        let db_handle = self
            .lookup_database_by_id(db_id)
            .ok_or(RecoveryError::DatabaseNotFound(db_id))?;

        // If the target name is already taken by a different collection,
        // drop that other collection first (spec §4.5 RENAME_COLLECTION).
        let conflicting = {
            let db = db_handle.read();
            db.lookup_collection_id_by_name(new_name).filter(|&id| id != cid)
        };
        if let Some(other_id) = conflicting {
            self.drop_collection_by_id(db_id, other_id)?;
        }

        let mut db = db_handle.write();
        let handle = db
            .collections
            .get(&cid)
            .cloned()
            .ok_or(RecoveryError::CollectionNotFound(cid))?;
        let old_name = {
            let mut col = handle.write();
            let old = col.name.clone();
            col.name = new_name.to_string();
            old
        };
        db.collections_by_name.remove(&old_name);
        db.collections_by_name.insert(new_name.to_string(), cid);
        Ok(())
    }

    pub fn update_collection_force_sync(&self, db_id: u64, cid: u64, force_sync: bool) -> Result<()> {
        let handle = self
            .get_collection(db_id, cid)
            .ok_or(RecoveryError::CollectionNotFound(cid))?;
        handle.write().force_sync_properties = force_sync;
        Ok(())
    }

    pub fn create_index(&self, db_id: u64, cid: u64, def: IndexDefinition) -> Result<()> {
        let handle = self
            .get_collection(db_id, cid)
            .ok_or(RecoveryError::CollectionNotFound(cid))?;
        let dir = handle.read().dir.clone();
        index::write_index_file(&dir, &def)?;
        handle.write().add_index(def);
        Ok(())
    }

    pub fn drop_index(&self, db_id: u64, cid: u64, iid: u64) -> Result<()> {
        let handle = self
            .get_collection(db_id, cid)
            .ok_or(RecoveryError::CollectionNotFound(cid))?;
        let dir = handle.read().dir.clone();
        index::remove_index_file(&dir, iid)?;
        handle.write().drop_index(iid);
        Ok(())
    }
}
