// Integration tests exercising the recovery pipeline end to end through
// the public API, plus property-based checks for idempotence and tick
// monotonicity.

use std::io::Write;
use std::path::Path;

use proptest::prelude::*;
use serde_json::json;

use wal_recover::catalog::Catalog;
use wal_recover::document::CollectionKind;
use wal_recover::recovery::{RecoveryCoordinator, RecoveryOptions};
use wal_recover::wal::{FakeWalWriter, Logfile, LogfileSet, Marker, MarkerKind};

fn write_log(path: &Path, markers: &[Marker]) {
    let mut file = std::fs::File::create(path).unwrap();
    for m in markers {
        file.write_all(&m.serialize()).unwrap();
    }
}

fn prologue(db: u64, col: u64) -> Vec<u8> {
    let mut p = db.to_le_bytes().to_vec();
    p.extend_from_slice(&col.to_le_bytes());
    p
}

fn crud(tid: u64, doc: serde_json::Value) -> Vec<u8> {
    let mut p = tid.to_le_bytes().to_vec();
    p.extend_from_slice(&serde_json::to_vec(&doc).unwrap());
    p
}

/// P2 (shadow correctness): once a collection is in droppedIds after
/// Pass 1, no Pass-2 CRUD marker targeting it may mutate anything.
#[test]
fn p2_dropped_collection_rejects_later_crud() {
    let base = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(base.path());
    let log_dir = tempfile::tempdir().unwrap();
    let path = log_dir.path().join("0.log");

    let markers = vec![
        Marker::with_json(MarkerKind::CreateDatabase, 1, &json!({"database": 7, "data": {"name": "d"}})).unwrap(),
        Marker::with_json(
            MarkerKind::CreateCollection,
            2,
            &json!({"database": 7, "cid": 9, "data": {"name": "c"}}),
        )
        .unwrap(),
        Marker::new(MarkerKind::Prologue, 3, prologue(7, 9)),
        Marker::with_json(MarkerKind::DropCollection, 4, &json!({"database": 7, "cid": 9})).unwrap(),
        Marker::new(MarkerKind::Document, 5, crud(0, json!({"_key": "a", "v": 1}))),
    ];
    write_log(&path, &markers);

    let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);
    let mut wal = FakeWalWriter::default();
    RecoveryCoordinator::run(&set, &catalog, &mut wal, &RecoveryOptions::default()).unwrap();

    assert!(catalog.get_collection(7, 9).is_none());
}

/// P3 (abort completeness): an open transaction with no local commit
/// gets exactly one appended ABORT_TRANSACTION marker.
#[test]
fn p3_exactly_one_abort_per_open_transaction() {
    let base = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(base.path());
    let log_dir = tempfile::tempdir().unwrap();
    let path = log_dir.path().join("0.log");

    let markers = vec![
        Marker::with_json(MarkerKind::CreateDatabase, 1, &json!({"database": 7, "data": {"name": "d"}})).unwrap(),
        Marker::with_json(
            MarkerKind::CreateCollection,
            2,
            &json!({"database": 7, "cid": 9, "data": {"name": "c"}}),
        )
        .unwrap(),
        Marker::new(MarkerKind::Prologue, 3, prologue(7, 9)),
        Marker::with_json(MarkerKind::BeginTransaction, 4, &json!({"database": 7, "tid": 55})).unwrap(),
        Marker::new(MarkerKind::Document, 5, crud(55, json!({"_key": "a", "v": 1}))),
    ];
    write_log(&path, &markers);

    let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);
    let mut wal = FakeWalWriter::default();
    RecoveryCoordinator::run(&set, &catalog, &mut wal, &RecoveryOptions::default()).unwrap();

    let aborts: Vec<_> = wal
        .appended
        .iter()
        .filter(|m| m.kind() == MarkerKind::AbortTransaction)
        .collect();
    assert_eq!(aborts.len(), 1);
    let (db, tid) = aborts[0].local_txn().unwrap();
    assert_eq!((db, tid), (7, 55));
}

/// P5 (no-op on volatile): CRUD markers never change a volatile
/// collection's document count. The public API has no volatile-flagging
/// DDL marker, so this drives the catalog directly and replays through
/// the collection-level apply path exercised by the replayer.
#[test]
fn p5_volatile_collection_is_untouched_by_crud() {
    let base = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(base.path());
    catalog.create_database(7, "d").unwrap();
    catalog
        .create_collection(7, 9, "c", CollectionKind::Document, true)
        .unwrap();
    catalog.get_collection(7, 9).unwrap().write().volatile = true;

    let log_dir = tempfile::tempdir().unwrap();
    let path = log_dir.path().join("0.log");
    let markers = vec![
        Marker::new(MarkerKind::Prologue, 1, prologue(7, 9)),
        Marker::new(MarkerKind::Document, 2, crud(0, json!({"_key": "a", "v": 1}))),
    ];
    write_log(&path, &markers);

    let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);
    let mut wal = FakeWalWriter::default();
    RecoveryCoordinator::run(&set, &catalog, &mut wal, &RecoveryOptions::default()).unwrap();

    let collection = catalog.get_collection(7, 9).unwrap();
    assert!(collection.read().documents.is_empty());
}

/// P6 (prologue binding): a CRUD marker always applies against the
/// most recent PROLOGUE's [database, collection] pair, even across an
/// intervening HEADER/FOOTER boundary that resets context.
#[test]
fn p6_crud_binds_to_most_recent_prologue() {
    let base = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(base.path());
    let log_dir = tempfile::tempdir().unwrap();
    let path = log_dir.path().join("0.log");

    let markers = vec![
        Marker::with_json(MarkerKind::CreateDatabase, 1, &json!({"database": 7, "data": {"name": "d"}})).unwrap(),
        Marker::with_json(
            MarkerKind::CreateCollection,
            2,
            &json!({"database": 7, "cid": 9, "data": {"name": "first"}}),
        )
        .unwrap(),
        Marker::with_json(
            MarkerKind::CreateCollection,
            3,
            &json!({"database": 7, "cid": 10, "data": {"name": "second"}}),
        )
        .unwrap(),
        Marker::new(MarkerKind::Prologue, 4, prologue(7, 9)),
        Marker::new(MarkerKind::Prologue, 5, prologue(7, 10)),
        Marker::new(MarkerKind::Document, 6, crud(0, json!({"_key": "a", "v": 1}))),
    ];
    write_log(&path, &markers);

    let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);
    let mut wal = FakeWalWriter::default();
    RecoveryCoordinator::run(&set, &catalog, &mut wal, &RecoveryOptions::default()).unwrap();

    assert!(catalog.get_collection(7, 9).unwrap().read().documents.is_empty());
    assert_eq!(catalog.get_collection(7, 10).unwrap().read().documents.len(), 1);
}

/// Index rebuild (C7) after a representative insert/update/remove mix.
#[test]
fn index_rebuild_reflects_final_document_set() {
    let base = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(base.path());
    let log_dir = tempfile::tempdir().unwrap();
    let path = log_dir.path().join("0.log");

    let markers = vec![
        Marker::with_json(MarkerKind::CreateDatabase, 1, &json!({"database": 7, "data": {"name": "d"}})).unwrap(),
        Marker::with_json(
            MarkerKind::CreateCollection,
            2,
            &json!({"database": 7, "cid": 9, "data": {"name": "c"}}),
        )
        .unwrap(),
        Marker::with_json(MarkerKind::CreateIndex, 3, &json!({"database": 7, "cid": 9, "iid": 1, "data": {"field": "v"}})).unwrap(),
        Marker::new(MarkerKind::Prologue, 4, prologue(7, 9)),
        Marker::new(MarkerKind::Document, 5, crud(0, json!({"_key": "a", "v": 1}))),
        Marker::new(MarkerKind::Document, 6, crud(0, json!({"_key": "b", "v": 2}))),
        Marker::new(MarkerKind::Remove, 7, crud(0, json!({"_key": "a"}))),
    ];
    write_log(&path, &markers);

    let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);
    let mut wal = FakeWalWriter::default();
    let report = RecoveryCoordinator::run(&set, &catalog, &mut wal, &RecoveryOptions::default()).unwrap();
    assert_eq!(report.indexes_rebuilt, 1);

    let collection = catalog.get_collection(7, 9).unwrap();
    let guard = collection.read();
    assert_eq!(guard.documents.len(), 1);
    assert!(guard.documents.values().next().unwrap().get("v") == Some(&json!(2)));
}

fn build_insert_log(path: &Path, doc_count: u32) -> (u64, u64) {
    let db = 1u64;
    let col = 1u64;
    let mut tick = 1u64;
    let mut markers = vec![
        Marker::with_json(MarkerKind::CreateDatabase, tick, &json!({"database": db, "data": {"name": "d"}})).unwrap(),
    ];
    tick += 1;
    markers.push(
        Marker::with_json(
            MarkerKind::CreateCollection,
            tick,
            &json!({"database": db, "cid": col, "data": {"name": "c"}}),
        )
        .unwrap(),
    );
    tick += 1;
    markers.push(Marker::new(MarkerKind::Prologue, tick, prologue(db, col)));
    for i in 0..doc_count {
        tick += 1;
        markers.push(Marker::new(
            MarkerKind::Document,
            tick,
            crud(0, json!({"_key": format!("k{i}"), "v": i})),
        ));
    }
    write_log(path, &markers);
    (db, col)
}

proptest! {
    /// P4 (tick monotonicity) and P1 (idempotence) across randomly
    /// sized insert logs.
    #[test]
    fn p1_and_p4_hold_for_varied_log_sizes(doc_count in 0u32..40) {
        let base = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(base.path());
        let log_dir = tempfile::tempdir().unwrap();
        let path = log_dir.path().join("0.log");
        let (db, col) = build_insert_log(&path, doc_count);

        let set = LogfileSet::new(vec![Logfile::open(&path).unwrap()]);

        let mut wal1 = FakeWalWriter::default();
        let report1 = RecoveryCoordinator::run(&set, &catalog, &mut wal1, &RecoveryOptions::default()).unwrap();
        prop_assert_eq!(report1.error_count, 0);

        let collection = catalog.get_collection(db, col).unwrap();
        let count_after_first = collection.read().documents.len();
        prop_assert_eq!(count_after_first as u32, doc_count);

        let mut wal2 = FakeWalWriter::default();
        let report2 = RecoveryCoordinator::run(&set, &catalog, &mut wal2, &RecoveryOptions::default()).unwrap();
        prop_assert_eq!(report2.error_count, 0);

        let count_after_second = collection.read().documents.len();
        prop_assert_eq!(count_after_first, count_after_second);

        for logfile in set.iter() {
            let mut last_tick = 0u64;
            for marker in logfile.markers() {
                let marker = marker.unwrap();
                prop_assert!(marker.tick() >= last_tick);
                last_tick = marker.tick();
            }
        }
    }
}
