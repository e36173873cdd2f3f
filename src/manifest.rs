//! `checksums.txt`: the per-file integrity manifest a part is valid iff it matches (§3, §6).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{io_err, Error, Result};

/// One artifact's recorded size/hash pair. `uncompressed_*` is only meaningful when
/// `compressed` is true (§4.3); for `.mrk` and `primary.idx` it is zero/empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub compressed: bool,
    pub file_size: u64,
    pub file_hash: String,
    pub uncompressed_size: u64,
    pub uncompressed_hash: String,
}

impl ManifestEntry {
    pub fn uncompressed(file_size: u64, file_hash: String) -> Self {
        Self {
            compressed: false,
            file_size,
            file_hash,
            uncompressed_size: 0,
            uncompressed_hash: String::new(),
        }
    }

    pub fn compressed(
        file_size: u64,
        file_hash: String,
        uncompressed_size: u64,
        uncompressed_hash: String,
    ) -> Self {
        Self {
            compressed: true,
            file_size,
            file_hash,
            uncompressed_size,
            uncompressed_hash,
        }
    }
}

/// The manifest keyed by artifact file name, in insertion order on write (BTreeMap keeps
/// the file deterministic for tests and diffing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(file_name.into(), entry);
    }

    pub fn get(&self, file_name: &str) -> Option<&ManifestEntry> {
        self.entries.get(file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
        self.entries.iter()
    }

    /// Writes the `<file-name>\t<compressed>\t<file_size>\t<file_hash>\t<uncompressed_size>\t<uncompressed_hash>`
    /// grammar from SPEC_FULL §6.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|e| io_err(path, e))?;
        for (name, entry) in &self.entries {
            writeln!(
                file,
                "{}\t{}\t{}\t{}\t{}\t{}",
                name,
                entry.compressed as u8,
                entry.file_size,
                entry.file_hash,
                entry.uncompressed_size,
                entry.uncompressed_hash
            )
            .map_err(|e| io_err(path, e))?;
        }
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut manifest = Manifest::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_err(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 6 {
                return Err(Error::InvalidConfig(format!(
                    "malformed checksums.txt line: {:?}",
                    line
                )));
            }
            let parse_u64 = |s: &str| {
                s.parse::<u64>()
                    .map_err(|_| Error::InvalidConfig(format!("invalid integer {:?}", s)))
            };
            let entry = ManifestEntry {
                compressed: fields[1] == "1",
                file_size: parse_u64(fields[2])?,
                file_hash: fields[3].to_string(),
                uncompressed_size: parse_u64(fields[4])?,
                uncompressed_hash: fields[5].to_string(),
            };
            manifest.insert(fields[0].to_string(), entry);
        }
        Ok(manifest)
    }

    /// Re-reads every listed file and checks its hash against the manifest (P5).
    pub fn verify(&self, dir: impl AsRef<Path>) -> Result<bool> {
        let dir = dir.as_ref();
        for (name, entry) in &self.entries {
            let path = dir.join(name);
            let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
            if bytes.len() as u64 != entry.file_size {
                return Ok(false);
            }
            let mut hasher = crate::checksum::Hasher::new();
            hasher.update(&bytes);
            if hasher.hex_digest() != entry.file_hash {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
