//! Configuration surface (§6, §4.8): `granularity`, frame-size thresholds, compression
//! method, the direct-I/O size hint, and the append-assembler's `sync_on_finalize` flag.

use crate::compression::CompressionMethod;
use crate::error::{Error, Result};

/// Options shared by [`PartAssembler`](crate::part::PartAssembler) and
/// [`AppendAssembler`](crate::append::AppendAssembler).
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Rows per mark. Must be positive.
    pub granularity: u64,
    /// A frame is only closed at a mark boundary once it holds at least this many bytes.
    pub min_frame_bytes: usize,
    /// Soft upper bound on frame size; exceeding it forces a close even off a mark boundary.
    pub max_frame_bytes: usize,
    /// Codec applied to every frame.
    pub compression_method: CompressionMethod,
    /// Files at or above this size use a direct-I/O-capable writer. `0` disables the hint.
    pub aio_threshold: u64,
}

impl WriterOptions {
    /// Builds options, validating the configuration-error cases from §7.
    pub fn new(
        granularity: u64,
        min_frame_bytes: usize,
        max_frame_bytes: usize,
        compression_method: CompressionMethod,
        aio_threshold: u64,
    ) -> Result<Self> {
        if granularity == 0 {
            return Err(Error::InvalidConfig("granularity must be positive".into()));
        }
        if min_frame_bytes > max_frame_bytes {
            return Err(Error::InvalidConfig(format!(
                "min_frame_bytes ({}) must not exceed max_frame_bytes ({})",
                min_frame_bytes, max_frame_bytes
            )));
        }
        Ok(Self {
            granularity,
            min_frame_bytes,
            max_frame_bytes,
            compression_method,
            aio_threshold,
        })
    }
}

/// Options specific to [`AppendAssembler`](crate::append::AppendAssembler).
#[derive(Debug, Clone)]
pub struct AppendOptions {
    pub writer: WriterOptions,
    /// `fsync` every stream before the manifest is returned.
    pub sync_on_finalize: bool,
}

impl AppendOptions {
    pub fn new(writer: WriterOptions, sync_on_finalize: bool) -> Self {
        Self {
            writer,
            sync_on_finalize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_granularity() {
        let err = WriterOptions::new(0, 0, 1024, CompressionMethod::None, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_contradictory_thresholds() {
        let err = WriterOptions::new(8192, 2048, 1024, CompressionMethod::None, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn accepts_sane_config() {
        assert!(WriterOptions::new(8192, 0, 1 << 20, CompressionMethod::Lz4, 0).is_ok());
    }
}
