// wal/mod.rs
// Write-Ahead Log module
//
// This module provides:
// - `Marker`/`MarkerKind`: the fixed header + typed payload codec (C1)
// - `Logfile`/`LogfileSet`/`MarkerEnumerator`: mmap-backed datafile enumeration
// - `WalAppender`: the live WAL writer's collaborator contract, plus a
//   concrete file-backed implementation and an in-memory fake for tests

pub mod logfile;
pub mod marker;
pub mod writer;

pub use logfile::{Logfile, LogfileSet, MarkerEnumerator};
pub use marker::{Marker, MarkerHeader, MarkerKind, HEADER_SIZE, MAX_MARKER_SIZE};
pub use writer::{FakeWalWriter, FileWalWriter, WalAppender};
