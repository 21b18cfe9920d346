// recovery/reaper.rs (C8 Empty-Logfile Reaper)
//
// Best-effort removal of every logfile the scanner classified empty
// (spec §4.8). Failure to remove one file does not stop the others.

use crate::log_warn;

use super::state::RecoveryState;

pub fn reap(state: &mut RecoveryState) -> u32 {
    let mut removed = 0u32;
    for path in state.empty_logfiles.drain(..) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log_warn!("failed to remove empty logfile {}: {e}", path.display()),
        }
    }
    removed
}
