//! Streaming digest used to populate `checksums.txt` entries (§4.1, §4.3, §6).
//!
//! Every byte written through a [`ColumnStream`](crate::stream::column::ColumnStream) passes
//! two counting hashers: one over the raw, on-disk bytes (`hash_A`) and one over the
//! uncompressed, pre-framing bytes (`hash_B`). Both use the same digest, `xxh3`, already a
//! dependency of the teacher crate for its bloom filter.

use xxhash_rust::xxh3::Xxh3;

/// A byte counter paired with an incremental digest.
#[derive(Debug, Default)]
pub struct Hasher {
    count: u64,
    hasher: Xxh3,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `bytes` into the digest and advances the byte counter.
    pub fn update(&mut self, bytes: &[u8]) {
        self.count += bytes.len() as u64;
        self.hasher.update(bytes);
    }

    /// Total bytes fed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The digest of all bytes fed so far, as a fixed-width lower-case hex string.
    pub fn hex_digest(&self) -> String {
        format!("{:016x}", self.hasher.digest())
    }
}
