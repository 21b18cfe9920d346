// recovery/index_builder.rs (C7 Index Builder)
//
// For every collection present in `openedCollections` at end of replay:
// re-enable secondary indexes and rebuild them from the collection's
// current documents (spec §4.7). A real storage engine would run this
// inside a single-collection write transaction; the in-memory catalog
// here needs no transactional wrapper of its own since nothing else is
// ever concurrently mutating it (spec §5).

use crate::error::Result;
use crate::log_info;

use super::resources::ResourceCache;

pub fn build_indexes(resources: &ResourceCache) -> Result<u32> {
    let mut rebuilt = 0u32;
    for (cid, handle) in resources.opened_collections() {
        let mut collection = handle.write();
        collection.rebuild_indexes();
        log_info!("rebuilt {} secondary indexes for collection {cid}", collection.indexes.len());
        rebuilt += 1;
    }
    Ok(rebuilt)
}
