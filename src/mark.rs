//! The mark file: one 16-byte `(raw_offset, frame_offset)` pair per mark (§3, §4.2, §6).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::Hasher;
use crate::error::{io_err, Result};

/// A physical locator for the first row of a granule: the byte offset in the `.bin` file
/// where its compression frame begins, and the offset of the row within the decompressed
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub raw_offset: u64,
    pub frame_offset: u64,
}

impl Mark {
    pub fn to_le_bytes(self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.raw_offset.to_le_bytes());
        buf[8..].copy_from_slice(&self.frame_offset.to_le_bytes());
        buf
    }
}

/// Append-only `.mrk` writer, opened with truncate+create semantics (§4.2).
#[derive(Debug)]
pub struct MarkLog {
    path: PathBuf,
    writer: BufWriter<File>,
    hasher: Hasher,
}

impl MarkLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| io_err(path.clone(), e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            hasher: Hasher::new(),
        })
    }

    /// Appends one mark, 16 little-endian bytes.
    pub fn append(&mut self, mark: Mark) -> Result<()> {
        let bytes = mark.to_le_bytes();
        self.writer
            .write_all(&bytes)
            .map_err(|e| io_err(self.path.clone(), e))?;
        self.hasher.update(&bytes);
        Ok(())
    }

    /// Total bytes emitted so far; equals `16 * marks_count` once finalized (invariant I2).
    pub fn count(&self) -> u64 {
        self.hasher.count()
    }

    /// Digest over every emitted byte.
    pub fn hash(&self) -> String {
        self.hasher.hex_digest()
    }

    /// Flushes the buffer. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| io_err(self.path.clone(), e))
    }

    pub fn sync(&self) -> Result<()> {
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| io_err(self.path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mark_at_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.mrk");
        let mut log = MarkLog::create(&path).unwrap();
        log.append(Mark {
            raw_offset: 0,
            frame_offset: 0,
        })
        .unwrap();
        log.finalize().unwrap();
        assert_eq!(log.count(), 16);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, [0u8; 16]);
    }

    #[test]
    fn count_matches_16_times_marks() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = MarkLog::create(dir.path().join("n.mrk")).unwrap();
        for i in 0..5u64 {
            log.append(Mark {
                raw_offset: i * 100,
                frame_offset: i,
            })
            .unwrap();
        }
        log.finalize().unwrap();
        assert_eq!(log.count(), 16 * 5);
    }
}
