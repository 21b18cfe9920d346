// wal/writer.rs
// The live WAL writer is an external collaborator (spec §1/§6); this
// module defines the narrow contract the recovery engine needs from it
// (C6's abort-marker append) plus a concrete append-only implementation
// grounded on the teacher's `WriteAheadLog::append`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::wal::marker::Marker;

/// The collaborator contract spec.md §6 names: `allocateAndWrite`.
/// Implementors append a marker and report where it landed.
pub trait WalAppender {
    fn allocate_and_write(&mut self, marker: &Marker, wait_for_sync: bool) -> Result<u64>;
}

/// Append-only writer over a single active log file, used by C6 to
/// emit compensating abort markers once replay finishes.
pub struct FileWalWriter {
    file: File,
    path: PathBuf,
}

impl FileWalWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        Ok(FileWalWriter { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WalAppender for FileWalWriter {
    fn allocate_and_write(&mut self, marker: &Marker, wait_for_sync: bool) -> Result<u64> {
        let bytes = marker.serialize();
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&bytes)?;
        if wait_for_sync {
            self.file.sync_all()?;
        }
        Ok(offset)
    }
}

/// In-memory fake used by tests (and by embedders that want to inspect
/// what recovery would have appended without touching disk).
#[derive(Default)]
pub struct FakeWalWriter {
    pub appended: Vec<Marker>,
}

impl WalAppender for FakeWalWriter {
    fn allocate_and_write(&mut self, marker: &Marker, _wait_for_sync: bool) -> Result<u64> {
        let offset = self.appended.len() as u64;
        self.appended.push(marker.clone());
        Ok(offset)
    }
}
