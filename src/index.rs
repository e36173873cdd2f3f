//! `primary.idx` (§3, §4.6 step 4, §6): the concatenation, for each mark, of each sort-key
//! column's binary encoding of its value at that row. No delimiters; a reader recovers
//! structure from `columns.txt` plus the declared sort-key order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::Hasher;
use crate::error::{io_err, Result};
use crate::serialize::ColumnValues;

/// Writes `primary.idx` and keeps an in-memory copy of each emitted row, so a caller can hand
/// index rows to a reader without reopening the file (§4.6 step 4).
pub struct PrimaryIndexWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    hasher: Hasher,
    /// One entry per mark: the concatenated sort-key encoding written for that mark.
    index_rows: Vec<Vec<u8>>,
}

impl PrimaryIndexWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| io_err(path.clone(), e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            hasher: Hasher::new(),
            index_rows: Vec::new(),
        })
    }

    /// Appends one mark's worth of sort-key values, row `row` of each column in `sort_key_columns`,
    /// in declaration order.
    pub fn write_row(
        &mut self,
        sort_key_columns: &[&dyn ColumnValues],
        row: usize,
    ) -> Result<()> {
        let mut encoded = Vec::new();
        for column in sort_key_columns {
            column.write_range(&mut encoded, row, row + 1)?;
        }
        self.writer
            .write_all(&encoded)
            .map_err(|e| io_err(self.path.clone(), e))?;
        self.hasher.update(&encoded);
        self.index_rows.push(encoded);
        Ok(())
    }

    /// Number of marks written so far.
    pub fn marks_count(&self) -> u64 {
        self.index_rows.len() as u64
    }

    /// Every emitted row, in mark order, available without reopening the file.
    pub fn index_rows(&self) -> &[Vec<u8>] {
        &self.index_rows
    }

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

    pub fn file_size(&self) -> u64 {
        self.hasher.count()
    }

    pub fn file_hash(&self) -> String {
        self.hasher.hex_digest()
    }
}
