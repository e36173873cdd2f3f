//! [`AppendAssembler`], component C7 (§4.7): a narrower facade over the same engine as
//! [`PartAssembler`](crate::part::PartAssembler), used by merges that add columns to an
//! existing part rather than writing one from scratch. It never emits `primary.idx`,
//! `columns.txt`, or `checksums.txt` — the caller merges the returned manifest fragment into
//! the target part's own `checksums.txt`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::config::AppendOptions;
use crate::error::{Error, Result};
use crate::granularity;
use crate::layout::{array_sizes_slot, null_slot, value_slot, StreamSlot};
use crate::manifest::Manifest;
use crate::serialize::{compose_physical, ArraySizes, ColumnData, ColumnValues, NullMask};
use crate::stream::column::ColumnStream;
use crate::types::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
}

/// A naming override for `escape`'s input, per §4.4: "the logical name itself is used as the
/// escape input for every recursion", letting the new files slot into an existing part's
/// naming convention instead of `colpart`'s own. `Arc`-wrapped (rather than `Box`, as
/// `part::PartAssembler`'s fixed `escape` needs no such indirection) so resolving it per call
/// never has to hold a borrow of `self` across the `&mut self` calls that follow.
pub type NameOverride = Arc<dyn Fn(&str) -> String>;

/// Writes a subset of columns into an existing part directory (C7). Streams are initialized
/// lazily on the first `write` call and torn down on `finalize_and_get_manifest`; a fresh
/// instance is expected per merge step, matching §4.7 "one-block-per-instance is sufficient".
pub struct AppendAssembler {
    dir: PathBuf,
    options: AppendOptions,
    name_override: Option<NameOverride>,
    streams: HashMap<String, ColumnStream>,
    stream_names: HashMap<String, String>,
    known_sizes: HashSet<String>,
    index_offset: u64,
    marks_count: u64,
    state: State,
}

impl AppendAssembler {
    /// Opens an append session rooted at `dir`, an existing part's directory. `name_override`,
    /// when given, replaces `colpart`'s own `escape` as the naming function (§4.4).
    pub fn create(
        dir: impl AsRef<Path>,
        options: AppendOptions,
        name_override: Option<NameOverride>,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        debug!("opening append session at {}", dir.display());
        Ok(Self {
            dir,
            options,
            name_override,
            streams: HashMap::new(),
            stream_names: HashMap::new(),
            known_sizes: HashSet::new(),
            index_offset: 0,
            marks_count: 0,
            state: State::Open,
        })
    }

    /// A clone of the current naming function, independent of any borrow of `self` (see
    /// [`NameOverride`]'s doc comment).
    fn escape_name_owned(&self) -> Option<NameOverride> {
        self.name_override.clone()
    }

    fn stream_for(&mut self, slot: &StreamSlot) -> Result<&mut ColumnStream> {
        if !self.streams.contains_key(&slot.key) {
            let (data_ext, mark_ext) = slot.kind.extensions();
            let data_path = self.dir.join(format!("{}{}", slot.file_stem, data_ext));
            let mark_path = self.dir.join(format!("{}{}", slot.file_stem, mark_ext));
            let stream = ColumnStream::create(
                data_path,
                mark_path,
                self.options.writer.compression_method,
                self.options.writer.max_frame_bytes,
            )?;
            self.streams.insert(slot.key.clone(), stream);
            self.stream_names
                .insert(slot.key.clone(), slot.file_stem.clone());
        }
        Ok(self.streams.get_mut(&slot.key).unwrap())
    }

    fn write_stream(
        &mut self,
        slot: &StreamSlot,
        view: &dyn ColumnValues,
        rows_in_block: usize,
    ) -> Result<()> {
        let granularity = self.options.writer.granularity;
        let index_offset = self.index_offset;
        let min_frame_bytes = self.options.writer.min_frame_bytes;
        let stream = self.stream_for(slot)?;
        granularity::write_granules(
            stream,
            view,
            rows_in_block,
            granularity,
            index_offset,
            min_frame_bytes,
        )
    }

    fn write_logical_column<'b>(
        &mut self,
        name: &str,
        ty: &ColumnType,
        data: &ColumnData<'b>,
        chain: &mut Vec<&'b [u64]>,
        rows_in_block: usize,
    ) -> Result<()> {
        let escape_override = self.escape_name_owned();
        let escape_name: &dyn Fn(&str) -> String = match &escape_override {
            Some(f) => f.as_ref(),
            None => &crate::types::escape,
        };
        match (ty, data) {
            (ColumnType::Nullable(inner_ty), ColumnData::Nullable { mask, inner }) => {
                let slot = null_slot(name, escape_name);
                let leaf = NullMask(*mask);
                let view = compose_physical(chain, &leaf, None);
                self.write_stream(&slot, view.as_ref(), rows_in_block)?;
                self.write_logical_column(name, inner_ty, inner, chain, rows_in_block)
            }
            (ColumnType::Array(inner_ty), ColumnData::Array { sizes, inner }) => {
                if let Some(slot) =
                    array_sizes_slot(name, chain.len(), &mut self.known_sizes, escape_name)
                {
                    let leaf = ArraySizes(*sizes);
                    let view = compose_physical(chain, &leaf, None);
                    self.write_stream(&slot, view.as_ref(), rows_in_block)?;
                }
                chain.push(*sizes);
                let result = self.write_logical_column(name, inner_ty, inner, chain, rows_in_block);
                chain.pop();
                result
            }
            (ColumnType::Nested(fields_ty), ColumnData::Nested { sizes, fields }) => {
                if fields_ty.len() != fields.len() {
                    return Err(Error::InvalidConfig(format!(
                        "column {:?}: Nested type declares {} fields but data has {}",
                        name,
                        fields_ty.len(),
                        fields.len()
                    )));
                }
                if let Some(slot) =
                    array_sizes_slot(name, chain.len(), &mut self.known_sizes, escape_name)
                {
                    let leaf = ArraySizes(*sizes);
                    let view = compose_physical(chain, &leaf, None);
                    self.write_stream(&slot, view.as_ref(), rows_in_block)?;
                }
                chain.push(*sizes);
                let mut result = Ok(());
                for ((field_name, field_ty), (data_name, field_data)) in
                    fields_ty.iter().zip(fields.iter())
                {
                    if field_name != data_name {
                        result = Err(Error::InvalidConfig(format!(
                            "column {:?}: field order mismatch ({:?} vs {:?})",
                            name, field_name, data_name
                        )));
                        break;
                    }
                    let child_name = format!("{}.{}", name, field_name);
                    if let Err(e) =
                        self.write_logical_column(&child_name, field_ty, field_data, chain, rows_in_block)
                    {
                        result = Err(e);
                        break;
                    }
                }
                chain.pop();
                result
            }
            (ColumnType::Primitive(_), ColumnData::Primitive(values)) => {
                let slot = value_slot(name, escape_name);
                let view = compose_physical(chain, *values, None);
                self.write_stream(&slot, view.as_ref(), rows_in_block)
            }
            _ => Err(Error::InvalidConfig(format!(
                "column {:?}: data shape does not match its declared type",
                name
            ))),
        }
    }

    /// Writes one block of `columns` (name, type, data triples); streams are created on first
    /// call and reused on subsequent calls with the same names (§4.7).
    pub fn write(
        &mut self,
        rows_in_block: usize,
        columns: &[(String, ColumnType, ColumnData<'_>)],
    ) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::AlreadyFinalized);
        }
        if rows_in_block == 0 {
            return Ok(());
        }
        for (name, ty, data) in columns {
            let mut chain = Vec::new();
            self.write_logical_column(name, ty, data, &mut chain, rows_in_block)?;
        }
        self.marks_count +=
            granularity::marks_in_block(rows_in_block as u64, self.index_offset, self.options.writer.granularity);
        self.index_offset = granularity::next_index_offset(
            self.index_offset,
            rows_in_block as u64,
            self.options.writer.granularity,
        );
        Ok(())
    }

    /// Finalizes every stream opened this session and returns their manifest fragment; the
    /// caller merges it into the target part's `checksums.txt` (§4.7).
    pub fn finalize_and_get_manifest(&mut self) -> Result<Manifest> {
        if self.state != State::Open {
            return Err(Error::AlreadyFinalized);
        }
        let mut manifest = Manifest::new();
        for (key, stream) in self.streams.iter_mut() {
            stream.finalize()?;
            if self.options.sync_on_finalize {
                stream.sync()?;
            }
            let name = self
                .stream_names
                .get(key)
                .expect("stream_names in sync with streams");
            stream.add_to_manifest(name, &mut manifest);
        }
        if self.marks_count == 0 {
            warn!("append session at {} produced no marks", self.dir.display());
        } else {
            debug!(
                "append session at {} finalized with {} marks",
                self.dir.display(),
                self.marks_count
            );
        }
        self.state = State::Committed;
        self.streams.clear();
        Ok(manifest)
    }

    pub fn marks_count(&self) -> u64 {
        self.marks_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionMethod;
    use crate::config::WriterOptions;
    use crate::types::PrimitiveType;
    use std::fs;

    fn options(granularity: u64) -> AppendOptions {
        AppendOptions::new(
            WriterOptions::new(granularity, 0, 1 << 20, CompressionMethod::None, 0).unwrap(),
            false,
        )
    }

    #[test]
    fn writes_only_the_given_columns_no_index_or_manifest_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let mut append = AppendAssembler::create(dir.path(), options(8192), None).unwrap();

        let values: Vec<u32> = vec![1, 2, 3];
        let columns = vec![(
            "n2".to_string(),
            ColumnType::Primitive(PrimitiveType::U32),
            ColumnData::Primitive(&values),
        )];
        append.write(3, &columns).unwrap();
        let manifest = append.finalize_and_get_manifest().unwrap();

        assert_eq!(append.marks_count(), 1);
        assert!(manifest.get("n2.bin").is_some());
        assert!(manifest.get("n2.mrk").is_some());
        assert!(!dir.path().join("columns.txt").exists());
        assert!(!dir.path().join("checksums.txt").exists());
        assert!(!dir.path().join("primary.idx").exists());
    }

    #[test]
    fn name_override_uses_logical_name_as_escape_input() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let override_fn: NameOverride = Arc::new(|name: &str| format!("merged_{}", name));
        let mut append = AppendAssembler::create(dir.path(), options(8192), Some(override_fn)).unwrap();

        let values: Vec<u8> = vec![5];
        let columns = vec![(
            "x".to_string(),
            ColumnType::Primitive(PrimitiveType::U8),
            ColumnData::Primitive(&values),
        )];
        append.write(1, &columns).unwrap();
        append.finalize_and_get_manifest().unwrap();

        assert!(dir.path().join("merged_x.bin").exists());
        assert!(dir.path().join("merged_x.mrk").exists());
    }

    #[test]
    fn write_after_finalize_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let mut append = AppendAssembler::create(dir.path(), options(8192), None).unwrap();
        append.finalize_and_get_manifest().unwrap();
        let values: Vec<u8> = vec![1];
        let columns = vec![(
            "x".to_string(),
            ColumnType::Primitive(PrimitiveType::U8),
            ColumnData::Primitive(&values),
        )];
        let err = append.write(1, &columns).unwrap_err();
        assert!(matches!(err, Error::AlreadyFinalized));
    }
}
