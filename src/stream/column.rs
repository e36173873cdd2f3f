//! [`ColumnStream`], component C3 (§4.3): one physical file's worth of data plus its marks.

use std::path::Path;

use crate::compression::CompressionMethod;
use crate::error::Result;
use crate::manifest::{Manifest, ManifestEntry};
use crate::mark::{Mark, MarkLog};

use super::framed::FramedOutputStream;

/// Pairs a `.bin`/`FramedOutputStream` with its `.mrk`/`MarkLog` (§3, §4.3).
pub struct ColumnStream {
    data: FramedOutputStream,
    marks: MarkLog,
}

impl ColumnStream {
    pub fn create(
        data_path: impl AsRef<Path>,
        mark_path: impl AsRef<Path>,
        compression_method: CompressionMethod,
        max_frame_bytes: usize,
    ) -> Result<Self> {
        Ok(Self {
            data: FramedOutputStream::create(data_path, compression_method, max_frame_bytes)?,
            marks: MarkLog::create(mark_path)?,
        })
    }

    pub fn data_mut(&mut self) -> &mut FramedOutputStream {
        &mut self.data
    }

    pub fn append_mark(&mut self, mark: Mark) -> Result<()> {
        self.marks.append(mark)
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.data.finalize()?;
        self.marks.finalize()
    }

    pub fn sync(&self) -> Result<()> {
        self.data.sync()?;
        self.marks.sync()
    }

    /// Appends this stream's `.bin`/`.mrk` entries to `manifest`, keyed by `name` (§4.3).
    pub fn add_to_manifest(&self, name: &str, manifest: &mut Manifest) {
        manifest.insert(
            format!("{}.bin", name),
            ManifestEntry::compressed(
                self.data.raw_byte_count(),
                self.data.raw_hash(),
                self.data.uncompressed_byte_count(),
                self.data.uncompressed_hash(),
            ),
        );
        manifest.insert(
            format!("{}.mrk", name),
            ManifestEntry::uncompressed(self.marks.count(), self.marks.hash()),
        );
    }
}
