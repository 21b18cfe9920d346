// wal/logfile.rs
// Memory-mapped datafile enumerator (generalizes the teacher's
// WALEntryIterator from a buffered reader to an mmap'd slice, per
// the advise requirements in the spec's concurrency section).

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Advice, Mmap};

use crate::error::{RecoveryError, Result};
use crate::wal::marker::{Marker, HEADER_SIZE};

/// One on-disk log file, bracketed by HEADER/FOOTER markers.
pub struct Logfile {
    path: PathBuf,
    mmap: Mmap,
}

impl Logfile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Logfile { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// A logfile with no markers at all, or only a HEADER/FOOTER pair
    /// and nothing between them, is reclaimable by C8.
    pub fn is_empty_logfile(&self) -> bool {
        let markers = self.markers();
        let mut saw_content = false;
        for marker in markers {
            let marker = match marker {
                Ok(m) => m,
                Err(_) => return false,
            };
            use crate::wal::marker::MarkerKind::*;
            if !matches!(marker.kind(), Header | Footer) {
                saw_content = true;
                break;
            }
        }
        !saw_content
    }

    /// Advise the OS the file will be read sequentially end to end.
    pub fn advise_sequential(&self) -> Result<()> {
        self.mmap.advise(Advice::Sequential)?;
        self.mmap.advise(Advice::WillNeed)?;
        Ok(())
    }

    /// Revert to the random-access hint once sequential iteration ends.
    pub fn advise_random(&self) -> Result<()> {
        self.mmap.advise(Advice::Random)?;
        Ok(())
    }

    /// Stream all markers in this file in on-disk (tick) order.
    pub fn markers(&self) -> MarkerEnumerator<'_> {
        MarkerEnumerator {
            bytes: &self.mmap[..],
            offset: 0,
            done: false,
        }
    }
}

/// Yields borrowed-then-owned markers from a single datafile's bytes.
/// `Marker` owns its payload (copied out of the mmap) so callers can
/// hold markers past the enumerator's lifetime if needed; the mmap
/// itself is never copied wholesale.
pub struct MarkerEnumerator<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Iterator for MarkerEnumerator<'a> {
    type Item = Result<Marker>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.offset >= self.bytes.len() {
            self.done = true;
            return None;
        }
        if self.bytes.len() - self.offset < HEADER_SIZE {
            self.done = true;
            return Some(Err(RecoveryError::Corruption(
                "trailing bytes too short for a marker header".into(),
            )));
        }
        match Marker::deserialize(&self.bytes[self.offset..]) {
            Ok((marker, consumed)) => {
                self.offset += consumed;
                Some(Ok(marker))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// An ordered set of datafiles making up the full log, already sorted
/// by the embedding binary (log-file allocation/ordering is an external
/// collaborator per the spec's scope).
pub struct LogfileSet {
    files: Vec<Logfile>,
}

impl LogfileSet {
    pub fn new(files: Vec<Logfile>) -> Self {
        LogfileSet { files }
    }

    pub fn open_ordered(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for p in paths {
            files.push(Logfile::open(p)?);
        }
        Ok(LogfileSet { files })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Logfile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::marker::MarkerKind;
    use std::io::Write;

    fn write_markers(path: &Path, markers: &[Marker]) {
        let mut file = File::create(path).unwrap();
        for m in markers {
            file.write_all(&m.serialize()).unwrap();
        }
    }

    #[test]
    fn enumerates_markers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let markers = vec![
            Marker::new(MarkerKind::Header, 1, vec![]),
            Marker::new(MarkerKind::Footer, 2, vec![]),
        ];
        write_markers(&path, &markers);

        let logfile = Logfile::open(&path).unwrap();
        let decoded: Vec<_> = logfile.markers().map(|m| m.unwrap()).collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].kind(), MarkerKind::Header);
        assert_eq!(decoded[1].kind(), MarkerKind::Footer);
    }

    #[test]
    fn detects_empty_logfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let markers = vec![
            Marker::new(MarkerKind::Header, 1, vec![]),
            Marker::new(MarkerKind::Footer, 2, vec![]),
        ];
        write_markers(&path, &markers);
        let logfile = Logfile::open(&path).unwrap();
        assert!(logfile.is_empty_logfile());
    }

    #[test]
    fn logfile_with_content_is_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.log");
        let markers = vec![
            Marker::new(MarkerKind::Header, 1, vec![]),
            Marker::new(MarkerKind::CreateDatabase, 2, br#"{"database":1}"#.to_vec()),
            Marker::new(MarkerKind::Footer, 3, vec![]),
        ];
        write_markers(&path, &markers);
        let logfile = Logfile::open(&path).unwrap();
        assert!(!logfile.is_empty_logfile());
    }
}
