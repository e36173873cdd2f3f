//! [`FramedOutputStream`], component C1 (§4.1): buffered raw file → hash_A → framed
//! compressor → hash_B → (logical serializer writes here) → filesystem, read right to left.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::Hasher;
use crate::compression::{create_codec, Codec, CompressionMethod};
use crate::error::{io_err, Result};
use crate::mark::Mark;

/// One compression frame's header: lengths needed to decompress it in isolation.
/// `uncompressed_len == compressed_len` whenever the stream's codec is `None`.
struct FrameHeader {
    uncompressed_len: u32,
    compressed_len: u32,
}

impl FrameHeader {
    const SIZE: usize = 8;

    fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..4].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        buf[4..].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf
    }
}

/// A buffered raw file fed through an optional compressor, one frame at a time.
pub struct FramedOutputStream {
    path: PathBuf,
    raw: BufWriter<File>,
    codec: Option<Box<dyn Codec>>,
    max_frame_bytes: usize,
    frame_buffer: Vec<u8>,
    hash_a: Hasher,
    hash_b: Hasher,
    finalized: bool,
}

impl FramedOutputStream {
    pub fn create(
        path: impl AsRef<Path>,
        compression_method: CompressionMethod,
        max_frame_bytes: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| io_err(path.clone(), e))?;
        let codec = create_codec(compression_method)?;
        Ok(Self {
            path,
            raw: BufWriter::new(file),
            codec,
            max_frame_bytes: max_frame_bytes.max(1),
            frame_buffer: Vec::new(),
            hash_a: Hasher::new(),
            hash_b: Hasher::new(),
            finalized: false,
        })
    }

    /// Appends `bytes` to the in-flight frame, forcing a close if it would exceed
    /// `max_frame_bytes` (a memory bound; §3 only requires that frames don't straddle marks,
    /// this is the additional safety valve for an unbounded single write).
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.hash_b.update(bytes);
        self.frame_buffer.extend_from_slice(bytes);
        if self.frame_buffer.len() >= self.max_frame_bytes {
            self.close_frame()?;
        }
        Ok(())
    }

    /// Bytes buffered in the current, not-yet-flushed frame.
    pub fn buffered_bytes_in_current_frame(&self) -> usize {
        self.frame_buffer.len()
    }

    /// Closes the current frame if it has reached `min`, so a mark about to be taken never
    /// straddles a frame boundary (§3 Frame, §4.5).
    pub fn frame_boundary_if_threshold(&mut self, min: usize) -> Result<()> {
        if self.buffered_bytes_in_current_frame() >= min {
            self.close_frame()?;
        }
        Ok(())
    }

    /// Forces a new frame if the current one is exactly at `max_frame_bytes`; a mark whose
    /// `frame_offset` lands exactly at the frame's end is ambiguous with the next frame's
    /// `(raw_offset_next, 0)` (§4.5).
    pub fn next_if_at_end(&mut self) -> Result<()> {
        if !self.frame_buffer.is_empty() && self.frame_buffer.len() >= self.max_frame_bytes {
            self.close_frame()?;
        }
        Ok(())
    }

    /// `(raw_offset, frame_offset)` for a row written right now.
    pub fn mark_cursor(&self) -> Mark {
        Mark {
            raw_offset: self.hash_a.count(),
            frame_offset: self.frame_buffer.len() as u64,
        }
    }

    fn close_frame(&mut self) -> Result<()> {
        if self.frame_buffer.is_empty() {
            return Ok(());
        }
        let uncompressed_len = self.frame_buffer.len() as u32;
        let payload = match &mut self.codec {
            Some(codec) => {
                let mut compressed = Vec::new();
                codec.compress(&self.frame_buffer, &mut compressed)?;
                compressed
            }
            None => std::mem::take(&mut self.frame_buffer),
        };
        let header = FrameHeader {
            uncompressed_len,
            compressed_len: payload.len() as u32,
        };
        let header_bytes = header.to_le_bytes();
        self.raw
            .write_all(&header_bytes)
            .map_err(|e| io_err(self.path.clone(), e))?;
        self.raw
            .write_all(&payload)
            .map_err(|e| io_err(self.path.clone(), e))?;
        self.hash_a.update(&header_bytes);
        self.hash_a.update(&payload);
        self.frame_buffer.clear();
        Ok(())
    }

    /// Flushes the in-flight frame and the raw buffer. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.close_frame()?;
        self.raw.flush().map_err(|e| io_err(self.path.clone(), e))?;
        self.finalized = true;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.raw
            .get_ref()
            .sync_all()
            .map_err(|e| io_err(self.path.clone(), e))
    }

    /// Bytes written to the raw `.bin` file (invariant I1: equals sum of frame sizes).
    pub fn raw_byte_count(&self) -> u64 {
        self.hash_a.count()
    }

    pub fn raw_hash(&self) -> String {
        self.hash_a.hex_digest()
    }

    pub fn uncompressed_byte_count(&self) -> u64 {
        self.hash_b.count()
    }

    pub fn uncompressed_hash(&self) -> String {
        self.hash_b.hex_digest()
    }
}

/// Lets a [`crate::serialize::ColumnValues`] impl write straight into the pipeline without
/// knowing about frames or hashing.
impl Write for FramedOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        FramedOutputStream::write(self, buf)
            .map(|_| buf.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
