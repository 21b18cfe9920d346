// recovery/scanner.rs (C4 Initial Scanner / Pass 1)
//
// Single linear walk over every log file in tick order, populating the
// failed-transaction table and the dropped-collection set without
// mutating user data (spec §4.4).

use crate::error::Result;
use crate::log_debug;
use crate::recovery::state::RecoveryState;
use crate::wal::{LogfileSet, MarkerKind};

pub fn scan(logfiles: &LogfileSet, state: &mut RecoveryState) -> Result<()> {
    for logfile in logfiles.iter() {
        logfile.advise_sequential()?;
        if logfile.is_empty_logfile() {
            state.empty_logfiles.push(logfile.path().to_path_buf());
        }

        for marker in logfile.markers() {
            let marker = marker?;
            state.advance_tick(marker.tick());

            match marker.kind() {
                MarkerKind::BeginTransaction => {
                    let (db, tid) = marker.local_txn()?;
                    state.failed_transactions.insert(tid, (db, false));
                }
                MarkerKind::CommitTransaction => {
                    let (_db, tid) = marker.local_txn()?;
                    state.failed_transactions.remove(&tid);
                }
                MarkerKind::AbortTransaction => {
                    let (db, tid) = marker.local_txn()?;
                    state.failed_transactions.insert(tid, (db, true));
                }
                MarkerKind::BeginRemoteTransaction => {
                    let (db, tid) = marker.remote_txn()?;
                    state.failed_transactions.insert(tid, (db, false));
                }
                MarkerKind::CommitRemoteTransaction => {
                    let (_db, tid) = marker.remote_txn()?;
                    state.failed_transactions.remove(&tid);
                }
                MarkerKind::AbortRemoteTransaction => {
                    let (db, tid) = marker.remote_txn()?;
                    state.failed_transactions.remove(&tid);
                    state.failed_transactions.insert(tid, (db, true));
                }
                MarkerKind::DropCollection => {
                    let obj = marker.ddl_payload()?;
                    if let Some(cid) = crate::wal::marker::numeric_value_opt(&obj, "cid")? {
                        state.dropped_collections.insert(cid);
                    }
                }
                _ => {
                    log_debug!("pass 1: ignoring marker kind {:?}", marker.kind());
                }
            }
        }

        logfile.advise_random()?;
    }
    Ok(())
}
