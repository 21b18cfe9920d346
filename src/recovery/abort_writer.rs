// recovery/abort_writer.rs (C6 Abort Writer)
//
// After replay completes, append a compensating ABORT_TRANSACTION
// marker for every transaction still open (spec §4.6).

use serde_json::json;

use crate::error::{RecoveryError, Result};
use crate::wal::{Marker, MarkerKind, WalAppender};

use super::state::RecoveryState;

pub fn write_aborts(state: &mut RecoveryState, wal: &mut impl WalAppender) -> Result<u32> {
    let mut written = 0u32;
    let pending: Vec<(u64, u64)> = state
        .failed_transactions
        .iter()
        .filter(|(_, (_, aborted))| !aborted)
        .map(|(&tid, &(db, _))| (tid, db))
        .collect();

    for (tid, db) in pending {
        state.last_tick += 1;
        let payload = json!({"database": db, "tid": tid});
        let marker = Marker::with_json(MarkerKind::AbortTransaction, state.last_tick, &payload)?;
        wal.allocate_and_write(&marker, false)
            .map_err(|e| RecoveryError::WalAppend(e.to_string()))?;
        if let Some(entry) = state.failed_transactions.get_mut(&tid) {
            entry.1 = true;
        }
        written += 1;
    }
    Ok(written)
}
