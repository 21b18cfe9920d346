// recovery/mod.rs
// Orchestrates the two-pass recovery pipeline: C4 (scan) -> C5 (replay)
// -> C6 (abort writer) -> C7 (index builder) -> C8 (reaper).

pub mod abort_writer;
pub mod index_builder;
pub mod reaper;
pub mod replayer;
pub mod resources;
pub mod scanner;
pub mod state;

use std::time::Duration;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::log_info;
use crate::wal::{LogfileSet, WalAppender};

pub use resources::ResourceCache;
pub use state::RecoveryState;

/// Knobs the embedding binary controls (spec §6: "the embedding binary
/// chooses which log-file list to hand in and whether to set
/// `ignoreRecoveryErrors`").
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub ignore_recovery_errors: bool,
    pub wait_for_deletion_timeout: Duration,
    pub wait_for_deletion_poll_interval: Duration,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        RecoveryOptions {
            ignore_recovery_errors: false,
            wait_for_deletion_timeout: Duration::from_secs(30),
            wait_for_deletion_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Summary of one recovery run, the "single error code plus a count of
/// individual replay failures that were tolerated" spec §7 describes.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub last_tick: u64,
    pub transactions_aborted: u32,
    pub indexes_rebuilt: u32,
    pub logfiles_reaped: u32,
    pub error_count: u32,
    /// Wall-clock time recovery finished, for the embedding server's own
    /// startup log/audit trail (not consulted by the engine itself).
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

pub struct RecoveryCoordinator;

impl RecoveryCoordinator {
    /// Runs the full pipeline against an already-open log-file set and
    /// catalog, appending abort markers through `wal`.
    pub fn run(
        logfiles: &LogfileSet,
        catalog: &Catalog,
        wal: &mut impl WalAppender,
        options: &RecoveryOptions,
    ) -> Result<RecoveryReport> {
        let mut state = RecoveryState::new(options.ignore_recovery_errors);
        let mut resources = ResourceCache::new();

        log_info!("pass 1: scanning {} logfile(s)", logfiles.len());
        scanner::scan(logfiles, &mut state)?;

        log_info!(
            "pass 2: replaying, {} failed transaction(s) discovered",
            state.failed_transactions.len()
        );
        replayer::replay(logfiles, &mut state, catalog, &mut resources, options)?;

        let transactions_aborted = abort_writer::write_aborts(&mut state, wal)?;
        let indexes_rebuilt = index_builder::build_indexes(&resources)?;
        let logfiles_reaped = reaper::reap(&mut state);

        log_info!(
            "recovery complete: {transactions_aborted} abort(s) written, \
             {indexes_rebuilt} collection(s) reindexed, {logfiles_reaped} logfile(s) reaped, \
             {} tolerated error(s)",
            state.error_count
        );

        Ok(RecoveryReport {
            last_tick: state.last_tick,
            transactions_aborted,
            indexes_rebuilt,
            logfiles_reaped,
            error_count: state.error_count,
            finished_at: chrono::Utc::now(),
        })
        // `resources` (and every handle it cached) is dropped here, releasing
        // all remaining database/collection handles (spec §3 "Lifecycle").
    }
}
