//! Codecs used to compress and decompress the bytes of one [`Frame`](crate::stream::framed).
//!
//! `colpart` treats compression as an opaque, feature-gated service: the
//! [`GranularityController`](crate::granularity) and
//! [`FramedOutputStream`](crate::stream::framed::FramedOutputStream) never see codec internals,
//! only the [`Codec`] trait.

use crate::error::{Error, Result};

/// Opaque token selecting which codec frames are compressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    None,
    Lz4,
    Zstd,
    Snappy,
    Gzip,
}

/// Compresses and decompresses one frame's worth of bytes at a time.
pub trait Codec: std::fmt::Debug {
    /// Compresses `input_buf`, appending the result to `output_buf`.
    fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()>;

    /// Decompresses `input_buf` into `output_buf`, which must already be sized to the
    /// known uncompressed length.
    fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()>;
}

/// Returns the codec for `method`, or `None` if `method` is [`CompressionMethod::None`].
pub fn create_codec(method: CompressionMethod) -> Result<Option<Box<dyn Codec>>> {
    match method {
        #[cfg(feature = "snappy")]
        CompressionMethod::Snappy => Ok(Some(Box::new(snappy_codec::SnappyCodec::new()))),
        #[cfg(feature = "gzip")]
        CompressionMethod::Gzip => Ok(Some(Box::new(gzip_codec::GzipCodec::new()))),
        #[cfg(feature = "lz4")]
        CompressionMethod::Lz4 => Ok(Some(Box::new(lz4_codec::Lz4Codec::new()))),
        #[cfg(feature = "zstd")]
        CompressionMethod::Zstd => Ok(Some(Box::new(zstd_codec::ZstdCodec::new()))),
        CompressionMethod::None => Ok(None),
        #[allow(unreachable_patterns)]
        other => Err(Error::Compression(format!(
            "compression method {:?} is not installed (missing cargo feature)",
            other
        ))),
    }
}

#[cfg(feature = "snappy")]
mod snappy_codec {
    use snap::raw::{decompress_len, max_compress_len, Decoder, Encoder};

    use crate::compression::Codec;
    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub struct SnappyCodec {
        decoder: Decoder,
        encoder: Encoder,
    }

    impl SnappyCodec {
        pub(crate) fn new() -> Self {
            Self {
                decoder: Decoder::new(),
                encoder: Encoder::new(),
            }
        }
    }

    impl Codec for SnappyCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let len = decompress_len(input_buf)
                .map_err(|e| Error::Compression(format!("snappy: {}", e)))?;
            assert!(len <= output_buf.len());
            self.decoder
                .decompress(input_buf, output_buf)
                .map_err(|e| Error::Compression(format!("snappy: {}", e)))
                .map(|_| ())
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let output_buf_len = output_buf.len();
            let required_len = max_compress_len(input_buf.len());
            output_buf.resize(output_buf_len + required_len, 0);
            let n = self
                .encoder
                .compress(input_buf, &mut output_buf[output_buf_len..])
                .map_err(|e| Error::Compression(format!("snappy: {}", e)))?;
            output_buf.truncate(output_buf_len + n);
            Ok(())
        }
    }
}

#[cfg(feature = "gzip")]
mod gzip_codec {
    use std::io::{Read, Write};

    use flate2::{read, write, Compression};

    use crate::compression::Codec;
    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub struct GzipCodec {}

    impl GzipCodec {
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    impl Codec for GzipCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = read::GzDecoder::new(input_buf);
            decoder
                .read_exact(output_buf)
                .map_err(|e| Error::Compression(format!("gzip: {}", e)))
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder = write::GzEncoder::new(output_buf, Compression::default());
            encoder
                .write_all(input_buf)
                .map_err(|e| Error::Compression(format!("gzip: {}", e)))?;
            encoder
                .try_finish()
                .map_err(|e| Error::Compression(format!("gzip: {}", e)))
        }
    }
}

#[cfg(feature = "lz4")]
mod lz4_codec {
    use lz4_flex::frame::{FrameDecoder, FrameEncoder};
    use std::io::{Read, Write};

    use crate::compression::Codec;
    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub struct Lz4Codec {}

    impl Lz4Codec {
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    impl Codec for Lz4Codec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = FrameDecoder::new(input_buf);
            decoder
                .read_exact(output_buf)
                .map_err(|e| Error::Compression(format!("lz4: {}", e)))
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder = FrameEncoder::new(output_buf);
            encoder
                .write_all(input_buf)
                .map_err(|e| Error::Compression(format!("lz4: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| Error::Compression(format!("lz4: {}", e)))?;
            Ok(())
        }
    }
}

#[cfg(feature = "zstd")]
mod zstd_codec {
    use std::io::{Read, Write};

    use crate::compression::Codec;
    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub struct ZstdCodec {}

    impl ZstdCodec {
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    /// Compression level (1-21); 1 favors write throughput over ratio.
    const ZSTD_COMPRESSION_LEVEL: i32 = 1;

    impl Codec for ZstdCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = zstd::Decoder::new(input_buf)
                .map_err(|e| Error::Compression(format!("zstd: {}", e)))?;
            decoder
                .read_exact(output_buf)
                .map_err(|e| Error::Compression(format!("zstd: {}", e)))
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder = zstd::Encoder::new(output_buf, ZSTD_COMPRESSION_LEVEL)
                .map_err(|e| Error::Compression(format!("zstd: {}", e)))?;
            encoder
                .write_all(input_buf)
                .map_err(|e| Error::Compression(format!("zstd: {}", e)))?;
            encoder
                .finish()
                .map(|_| ())
                .map_err(|e| Error::Compression(format!("zstd: {}", e)))
        }
    }
}
