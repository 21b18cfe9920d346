// catalog/database.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::collection::Collection;

pub struct Database {
    pub id: u64,
    pub name: String,
    pub dir: PathBuf,
    pub force_sync_properties: bool,
    pub collections: HashMap<u64, Arc<RwLock<Collection>>>,
    pub collections_by_name: HashMap<String, u64>,
}

impl Database {
    pub fn new(id: u64, name: String, dir: PathBuf) -> Self {
        Database {
            id,
            name,
            dir,
            force_sync_properties: true,
            collections: HashMap::new(),
            collections_by_name: HashMap::new(),
        }
    }

    pub fn collection_dir(&self, cid: u64) -> PathBuf {
        self.dir.join(format!("collection-{cid}"))
    }

    pub fn lookup_collection_id_by_name(&self, name: &str) -> Option<u64> {
        self.collections_by_name.get(name).copied()
    }

    pub fn insert_collection(&mut self, collection: Collection) -> Arc<RwLock<Collection>> {
        let id = collection.id;
        let name = collection.name.clone();
        let handle = Arc::new(RwLock::new(collection));
        self.collections.insert(id, handle.clone());
        self.collections_by_name.insert(name, id);
        handle
    }

    pub fn remove_collection(&mut self, cid: u64) -> Option<Arc<RwLock<Collection>>> {
        let removed = self.collections.remove(&cid);
        if let Some(handle) = &removed {
            let name = handle.read().name.clone();
            self.collections_by_name.remove(&name);
        }
        removed
    }
}
