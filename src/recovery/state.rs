// recovery/state.rs (C2 State Tracker)

use std::path::PathBuf;

use ahash::{AHashMap, AHashSet};

/// Process-wide recovery state, scoped to one recovery run (spec §3).
pub struct RecoveryState {
    pub last_tick: u64,
    pub last_database_id: u64,
    pub last_collection_id: u64,

    /// `tid -> (databaseId, aborted)`. Built fully by Pass 1 (C4); read
    /// only (never mutated) during Pass 2.
    pub failed_transactions: AHashMap<u64, (u64, bool)>,

    /// Live, rebuilt-during-Pass-2 shadow sets (I4/§4.5): cleared once
    /// at the start of the whole Pass 2 run, then repopulated as DROP
    /// markers are encountered in tick order.
    pub dropped_databases: AHashSet<u64>,
    pub dropped_collections: AHashSet<u64>,

    /// Pass-1 snapshot of dropped collections, consulted by
    /// `will_be_dropped` and never mutated after Pass 1 completes.
    pub dropped_collections_pass1: AHashSet<u64>,

    pub empty_logfiles: Vec<PathBuf>,

    pub error_count: u32,
    pub ignore_recovery_errors: bool,
}

impl RecoveryState {
    pub fn new(ignore_recovery_errors: bool) -> Self {
        RecoveryState {
            last_tick: 0,
            last_database_id: 0,
            last_collection_id: 0,
            failed_transactions: AHashMap::new(),
            dropped_databases: AHashSet::new(),
            dropped_collections: AHashSet::new(),
            dropped_collections_pass1: AHashSet::new(),
            empty_logfiles: Vec::new(),
            error_count: 0,
            ignore_recovery_errors,
        }
    }

    pub fn advance_tick(&mut self, tick: u64) {
        if tick > self.last_tick {
            self.last_tick = tick;
        }
    }

    /// True iff `tid != 0` and the transaction is in the failed table
    /// (no local commit seen, or explicitly aborted).
    pub fn ignore_transaction(&self, tid: u64) -> bool {
        tid != 0 && self.failed_transactions.contains_key(&tid)
    }

    pub fn is_dropped_database(&self, db: u64) -> bool {
        self.dropped_databases.contains(&db)
    }

    pub fn is_dropped_collection(&self, col: u64) -> bool {
        self.dropped_collections.contains(&col)
    }

    /// Consults the Pass-1 snapshot, not the live Pass-2 set.
    pub fn will_be_dropped(&self, col: u64) -> bool {
        self.dropped_collections_pass1.contains(&col)
    }

    pub fn reset_collection(&mut self, db: u64, col: u64) {
        self.last_database_id = db;
        self.last_collection_id = col;
    }

    pub fn clear_collection_context(&mut self) {
        self.last_database_id = 0;
        self.last_collection_id = 0;
    }

    /// Begin Pass 2: snapshot Pass 1's dropped-collections set, then
    /// clear the live sets so they can be rebuilt deterministically in
    /// tick order (spec §4.5).
    pub fn start_pass2(&mut self) {
        self.dropped_collections_pass1 = self.dropped_collections.clone();
        self.dropped_databases.clear();
        self.dropped_collections.clear();
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    pub fn can_continue(&self) -> bool {
        self.ignore_recovery_errors || self.error_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_transaction_zero_is_never_ignored() {
        let mut state = RecoveryState::new(false);
        state.failed_transactions.insert(0, (1, false));
        assert!(!state.ignore_transaction(0));
    }

    #[test]
    fn start_pass2_snapshots_then_clears() {
        let mut state = RecoveryState::new(false);
        state.dropped_collections.insert(9);
        state.start_pass2();
        assert!(state.will_be_dropped(9));
        assert!(!state.is_dropped_collection(9));
    }

    #[test]
    fn can_continue_reflects_error_count_and_flag() {
        let mut state = RecoveryState::new(false);
        assert!(state.can_continue());
        state.record_error();
        assert!(!state.can_continue());

        let mut lenient = RecoveryState::new(true);
        lenient.record_error();
        assert!(lenient.can_continue());
    }
}
