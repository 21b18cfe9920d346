// recovery/replayer.rs (C5 Replayer / Pass 2)

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::catalog::{Catalog, IndexDefinition};
use crate::document::{CollectionKind, Document};
use crate::error::{RecoveryError, Result};
use crate::wal::marker::{numeric_value, string_value};
use crate::wal::{LogfileSet, Marker, MarkerKind};
use crate::{log_debug, log_info, log_warn};

use super::resources::ResourceCache;
use super::state::RecoveryState;
use super::RecoveryOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrudOp {
    Document,
    Remove,
}

pub fn replay(
    logfiles: &LogfileSet,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
    options: &RecoveryOptions,
) -> Result<()> {
    state.start_pass2();

    for logfile in logfiles.iter() {
        logfile.advise_sequential()?;
        state.clear_collection_context();

        for marker in logfile.markers() {
            let marker = marker?;
            replay_marker(&marker, state, catalog, resources, options)?;
            if !state.can_continue() {
                return Err(RecoveryError::Recovery {
                    error_count: state.error_count,
                });
            }
        }

        logfile.advise_random()?;
    }
    Ok(())
}

/// One outer try/catch around the whole per-marker dispatch, mirroring
/// `RecoverState.cpp::ReplayMarker`'s single enclosing try/catch: any
/// uncaught error from payload decoding, catalog manipulation, or the
/// storage-engine call is logged and counted rather than aborting the
/// whole replay (spec §4.5/§7), except `CorruptedCollection`, which is
/// fatal unless `ignoreRecoveryErrors` is set.
fn replay_marker(
    marker: &Marker,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
    options: &RecoveryOptions,
) -> Result<()> {
    match dispatch_marker(marker, state, catalog, resources, options) {
        Ok(()) => Ok(()),
        Err(RecoveryError::DatabaseNotFound(_))
        | Err(RecoveryError::CollectionNotFound(_))
        | Err(RecoveryError::Conflict(_)) => Ok(()),
        Err(RecoveryError::CorruptedCollection(id)) => {
            if state.ignore_recovery_errors {
                state.record_error();
                Ok(())
            } else {
                Err(RecoveryError::CorruptedCollection(id))
            }
        }
        Err(e) => {
            log_warn!("replay error at tick {}: {e}", marker.tick());
            state.record_error();
            Ok(())
        }
    }
}

fn dispatch_marker(
    marker: &Marker,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
    options: &RecoveryOptions,
) -> Result<()> {
    match marker.kind() {
        MarkerKind::Header | MarkerKind::Footer => {
            state.clear_collection_context();
        }
        MarkerKind::Prologue => {
            let (db, col) = marker.prologue()?;
            state.reset_collection(db, col);
        }
        MarkerKind::Document => replay_crud(marker, CrudOp::Document, state, catalog, resources)?,
        MarkerKind::Remove => replay_crud(marker, CrudOp::Remove, state, catalog, resources)?,
        MarkerKind::CreateDatabase => replay_create_database(marker, state, catalog, options)?,
        MarkerKind::DropDatabase => replay_drop_database(marker, state, catalog, resources)?,
        MarkerKind::CreateCollection => replay_create_collection(marker, state, catalog)?,
        MarkerKind::DropCollection => replay_drop_collection(marker, state, catalog, resources)?,
        MarkerKind::RenameCollection => replay_rename_collection(marker, catalog)?,
        MarkerKind::ChangeCollection => replay_change_collection(marker, catalog)?,
        MarkerKind::CreateIndex => replay_create_index(marker, catalog)?,
        MarkerKind::DropIndex => replay_drop_index(marker, catalog)?,
        _ => {
            log_debug!("pass 2: ignoring marker kind {:?}", marker.kind());
        }
    }
    Ok(())
}

fn replay_crud(
    marker: &Marker,
    op: CrudOp,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
) -> Result<()> {
    let db = state.last_database_id;
    let col = state.last_collection_id;
    if db == 0 && col == 0 {
        log_warn!("CRUD marker at tick {} has no preceding PROLOGUE in this datafile, rejecting", marker.tick());
        return Ok(());
    }

    let (tid, payload) = marker.crud_payload()?;

    if state.is_dropped_database(db) || state.is_dropped_collection(col) || state.ignore_transaction(tid) {
        return Ok(());
    }

    execute_single_operation(catalog, resources, db, col, marker, op, &payload)
}

/// Mirrors `RecoverState.cpp::executeSingleOperation` (spec §4.5).
fn execute_single_operation(
    catalog: &Catalog,
    resources: &mut ResourceCache,
    db: u64,
    col: u64,
    marker: &Marker,
    op: CrudOp,
    payload: &Value,
) -> Result<()> {
    resources.use_database(catalog, db)?;
    let collection = resources.use_collection(catalog, db, col)?;

    {
        let guard = collection.read();
        if guard.tick_max >= marker.tick() {
            // I5: already durable, no-op.
            return Ok(());
        }
        if guard.volatile {
            return Ok(());
        }
    }

    let mut guard = collection.write();
    match op {
        CrudOp::Document => {
            let doc = Document::from_payload(payload)
                .ok_or_else(|| RecoveryError::Serialization("DOCUMENT payload missing _key".into()))?;
            // Insert-or-update retry on unique-constraint violation (spec §4.5).
            guard.upsert_document(doc);
        }
        CrudOp::Remove => {
            let key = payload
                .get("_key")
                .and_then(crate::document::DocumentId::from_value)
                .ok_or_else(|| RecoveryError::Serialization("REMOVE payload missing _key".into()))?;
            guard.remove_document(&key);
        }
    }
    guard.tick_max = marker.tick();
    Ok(())
}

fn replay_create_database(
    marker: &Marker,
    state: &mut RecoveryState,
    catalog: &Catalog,
    options: &RecoveryOptions,
) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let id = numeric_value(&obj, "database")?;
    let name = string_value(
        obj.get("data").ok_or_else(|| RecoveryError::Serialization("missing data".into()))?,
        "name",
    )?
    .to_string();

    state.dropped_databases.remove(&id);

    if catalog.lookup_database_by_id(id).is_some() {
        catalog.drop_database_by_id(id)?;
        wait_for_deletion(catalog, id, false, options)?;
    }
    if let Some(existing_by_name) = catalog.lookup_database_id_by_name(&name) {
        catalog.drop_database_by_id(existing_by_name)?;
        wait_for_deletion(catalog, existing_by_name, false, options)?;
    }

    catalog.create_database(id, &name)?;
    Ok(())
}

fn replay_drop_database(
    marker: &Marker,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let id = numeric_value(&obj, "database")?;
    state.dropped_databases.insert(id);
    resources.release_database(id);
    // Best-effort per spec §4.5.
    let _ = catalog.drop_database_by_id(id);
    Ok(())
}

fn replay_create_collection(marker: &Marker, state: &mut RecoveryState, catalog: &Catalog) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    let name = string_value(
        obj.get("data").ok_or_else(|| RecoveryError::Serialization("missing data".into()))?,
        "name",
    )?
    .to_string();

    state.dropped_collections.remove(&cid);

    if catalog.get_collection(db, cid).is_some() {
        catalog.drop_collection_by_id(db, cid)?;
    }
    if let Some(existing) = catalog.lookup_collection_id_by_name(db, &name) {
        catalog.drop_collection_by_id(db, existing)?;
    }

    // isSystem is name-derived, not carried in the payload (spec §4.5 (c)).
    let kind = if obj
        .get("data")
        .and_then(|d| d.get("isEdge"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        CollectionKind::Edge
    } else {
        CollectionKind::Document
    };

    // (e) collections fated to be dropped skip the durable-property sync.
    let force_sync_properties = !state.will_be_dropped(cid);

    catalog.create_collection(db, cid, &name, kind, force_sync_properties)?;
    Ok(())
}

fn replay_drop_collection(
    marker: &Marker,
    state: &mut RecoveryState,
    catalog: &Catalog,
    resources: &mut ResourceCache,
) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    state.dropped_collections.insert(cid);
    resources.release_collection(cid);
    let _ = catalog.drop_collection_by_id(db, cid);
    Ok(())
}

fn replay_rename_collection(marker: &Marker, catalog: &Catalog) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    let new_name = string_value(
        obj.get("data").ok_or_else(|| RecoveryError::Serialization("missing data".into()))?,
        "name",
    )?;
    catalog.rename_collection(db, cid, new_name)?;
    Ok(())
}

fn replay_change_collection(marker: &Marker, catalog: &Catalog) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    // `forceSyncProperties` is a database-level runtime setting, never a
    // marker attribute (spec §4.5 CHANGE_COLLECTION).
    let force_sync = catalog
        .lookup_database_by_id(db)
        .ok_or(RecoveryError::DatabaseNotFound(db))?
        .read()
        .force_sync_properties;
    catalog.update_collection_force_sync(db, cid, force_sync)?;
    Ok(())
}

fn replay_create_index(marker: &Marker, catalog: &Catalog) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    // CREATE_INDEX reads the index id from `iid` (spec §9 Open Question b).
    let iid = numeric_value(&obj, "iid")?;
    let field = obj
        .get("data")
        .and_then(|d| d.get("field"))
        .and_then(Value::as_str)
        .unwrap_or("_key")
        .to_string();
    catalog.create_index(db, cid, IndexDefinition { iid, field })?;
    Ok(())
}

fn replay_drop_index(marker: &Marker, catalog: &Catalog) -> Result<()> {
    let obj = marker.ddl_payload()?;
    let db = numeric_value(&obj, "database")?;
    let cid = numeric_value(&obj, "cid")?;
    // DROP_INDEX reads the index id from `id`, not `iid` (spec §9 Open Question b).
    let iid = numeric_value(&obj, "id")?;
    catalog.drop_index(db, cid, iid)?;
    Ok(())
}

/// Preserved exactly as observed in the original: forces removal on the
/// first polling iteration unless the prior drop attempt was forbidden.
/// This is flagged in the spec as suspicious but intentionally kept
/// as-is rather than "corrected" (spec §9 Open Question a).
pub fn wait_for_deletion(
    catalog: &Catalog,
    db: u64,
    forbidden: bool,
    options: &RecoveryOptions,
) -> Result<()> {
    let dir = catalog.database_dir(db);

    if !forbidden {
        let _ = std::fs::remove_dir_all(&dir);
    }

    let start = Instant::now();
    let mut warned = false;
    loop {
        if !dir.exists() {
            return Ok(());
        }
        let elapsed = start.elapsed();
        if elapsed >= options.wait_for_deletion_timeout {
            return Err(RecoveryError::Internal(format!(
                "timed out waiting for database {db} directory to disappear"
            )));
        }
        if !warned && elapsed >= Duration::from_secs(5) {
            log_info!("still waiting for database {db} directory to disappear");
            warned = true;
        }
        std::thread::sleep(options.wait_for_deletion_poll_interval);
    }
}
