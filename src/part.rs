//! [`PartAssembler`], component C6 (§4.6): the top-level driver. Applies a permutation to
//! sort-key columns, drives the layout planner and granularity controller per logical column,
//! emits the primary-key index, finalizes every stream, and writes `columns.txt` and
//! `checksums.txt` — or, if no marks were ever taken, removes the directory (I6).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::columns_descriptor::{write_columns_txt, ColumnDescriptor};
use crate::config::WriterOptions;
use crate::error::{Error, Result};
use crate::granularity;
use crate::index::PrimaryIndexWriter;
use crate::layout::{array_sizes_slot, null_slot, value_slot, EscapeName, StreamSlot};
use crate::manifest::Manifest;
use crate::serialize::{compose_physical, ArraySizes, ColumnData, ColumnValues, NullMask};
use crate::stream::column::ColumnStream;
use crate::types::{escape, ColumnType};

/// `Open -> (write*)* -> Committing -> Committed | Empty -> terminal` (§4.6). A failure in any
/// state is modeled by returning `Err` and leaving the assembler unusable; the caller is
/// expected to drop it and remove the directory (§5, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    Empty,
}

/// Coordinates one part's directory from first block to commit (C6).
pub struct PartAssembler {
    dir: PathBuf,
    columns: Vec<ColumnDescriptor>,
    sort_key: Vec<String>,
    options: WriterOptions,
    streams: HashMap<String, ColumnStream>,
    /// `stream table key` -> escaped file stem, so `finalize` can call `add_to_manifest` with
    /// the name actually used on disk.
    stream_names: HashMap<String, String>,
    known_sizes: HashSet<String>,
    index: Option<PrimaryIndexWriter>,
    index_offset: u64,
    marks_count: u64,
    state: State,
}

impl PartAssembler {
    /// Creates `dir` and, if `sort_key` is non-empty, opens `primary.idx` (§4.6 constructor).
    pub fn create(
        dir: impl AsRef<Path>,
        columns: Vec<ColumnDescriptor>,
        sort_key: Vec<String>,
        options: WriterOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| crate::error::io_err(dir.clone(), e))?;
        let index = if sort_key.is_empty() {
            None
        } else {
            Some(PrimaryIndexWriter::create(dir.join("primary.idx"))?)
        };
        debug!("opening part at {}", dir.display());
        Ok(Self {
            dir,
            columns,
            sort_key,
            options,
            streams: HashMap::new(),
            stream_names: HashMap::new(),
            known_sizes: HashSet::new(),
            index,
            index_offset: 0,
            marks_count: 0,
            state: State::Open,
        })
    }

    fn escape_name(&self) -> EscapeName<'static> {
        &escape
    }

    fn stream_for(&mut self, slot: &StreamSlot) -> Result<&mut ColumnStream> {
        if !self.streams.contains_key(&slot.key) {
            let (data_ext, mark_ext) = slot.kind.extensions();
            let data_path = self.dir.join(format!("{}{}", slot.file_stem, data_ext));
            let mark_path = self.dir.join(format!("{}{}", slot.file_stem, mark_ext));
            let stream = ColumnStream::create(
                data_path,
                mark_path,
                self.options.compression_method,
                self.options.max_frame_bytes,
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
        let granularity = self.options.granularity;
        let index_offset = self.index_offset;
        let min_frame_bytes = self.options.min_frame_bytes;
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

    /// Walks `(ty, data)` in lockstep (§3 flattening rules), writing every physical stream the
    /// logical column `name` touches. `chain` accumulates the array-sizes slices of every
    /// enclosing `Array`/`Nested` level seen so far, shallowest first, so a leaf several levels
    /// deep can be wrapped with [`compose_physical`] in one call.
    #[allow(clippy::too_many_arguments)]
    fn write_logical_column<'b>(
        &mut self,
        name: &str,
        ty: &ColumnType,
        data: &ColumnData<'b>,
        chain: &mut Vec<&'b [u64]>,
        rows_in_block: usize,
        permutation: Option<&'b [usize]>,
    ) -> Result<()> {
        let escape_name = self.escape_name();
        match (ty, data) {
            (ColumnType::Nullable(inner_ty), ColumnData::Nullable { mask, inner }) => {
                let slot = null_slot(name, escape_name);
                let leaf = NullMask(*mask);
                let view = compose_physical(chain, &leaf, permutation);
                self.write_stream(&slot, view.as_ref(), rows_in_block)?;
                self.write_logical_column(name, inner_ty, inner, chain, rows_in_block, permutation)
            }
            (ColumnType::Array(inner_ty), ColumnData::Array { sizes, inner }) => {
                if let Some(slot) =
                    array_sizes_slot(name, chain.len(), &mut self.known_sizes, escape_name)
                {
                    let leaf = ArraySizes(*sizes);
                    let view = compose_physical(chain, &leaf, permutation);
                    self.write_stream(&slot, view.as_ref(), rows_in_block)?;
                }
                chain.push(*sizes);
                let result =
                    self.write_logical_column(name, inner_ty, inner, chain, rows_in_block, permutation);
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
                    let view = compose_physical(chain, &leaf, permutation);
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
                    if let Err(e) = self.write_logical_column(
                        &child_name,
                        field_ty,
                        field_data,
                        chain,
                        rows_in_block,
                        permutation,
                    ) {
                        result = Err(e);
                        break;
                    }
                }
                chain.pop();
                result
            }
            (ColumnType::Primitive(_), ColumnData::Primitive(values)) => {
                let slot = value_slot(name, escape_name);
                let view = compose_physical(chain, *values, permutation);
                self.write_stream(&slot, view.as_ref(), rows_in_block)
            }
            _ => Err(Error::InvalidConfig(format!(
                "column {:?}: data shape does not match its declared type",
                name
            ))),
        }
    }

    /// Writes one input block (§4.6 "per input block"). `data` must have one entry per
    /// declared column, in declaration order. `permutation`, if given, re-indexes every
    /// column's rows (§4.6 step 2); sort-key columns must be `ColumnData::Primitive`.
    pub fn write_block(
        &mut self,
        rows_in_block: usize,
        data: &[ColumnData<'_>],
        permutation: Option<&[usize]>,
    ) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::AlreadyFinalized);
        }
        if data.len() != self.columns.len() {
            return Err(Error::InvalidConfig(format!(
                "write_block received {} columns, expected {}",
                data.len(),
                self.columns.len()
            )));
        }
        if rows_in_block == 0 {
            return Ok(());
        }

        // Step 1: resolve sort-key columns from the block.
        let mut seen = HashSet::new();
        let mut primary_raw: Vec<&dyn ColumnValues> = Vec::with_capacity(self.sort_key.len());
        for key in &self.sort_key {
            if !seen.insert(key.clone()) {
                return Err(Error::DuplicateSortKeyColumn(key.clone()));
            }
            let idx = self
                .columns
                .iter()
                .position(|c| &c.name == key)
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("sort key column {:?} not declared", key))
                })?;
            match &data[idx] {
                ColumnData::Primitive(values) => primary_raw.push(*values),
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "sort key column {:?} must be a primitive column",
                        key
                    )))
                }
            }
        }

        // Step 2: pre-permute the sort-key columns, held for the index emission below.
        let primary_columns: Vec<Box<dyn ColumnValues + '_>> = primary_raw
            .iter()
            .map(|&raw| compose_physical(&[], raw, permutation))
            .collect();

        // Step 3: write every logical column's physical streams, in declared order.
        for (column, column_data) in self.columns.clone().iter().zip(data.iter()) {
            let mut chain = Vec::new();
            self.write_logical_column(
                &column.name,
                &column.ty,
                column_data,
                &mut chain,
                rows_in_block,
                permutation,
            )?;
        }

        // Step 4: emit index entries at every mark boundary in this block.
        if let Some(primary_index) = &mut self.index {
            let refs: Vec<&dyn ColumnValues> = primary_columns.iter().map(|b| b.as_ref()).collect();
            let granularity = self.options.granularity as usize;
            let mut row = self.index_offset as usize;
            while row < rows_in_block {
                primary_index.write_row(&refs, row)?;
                row += granularity;
            }
        }
        self.marks_count += granularity::marks_in_block(
            rows_in_block as u64,
            self.index_offset,
            self.options.granularity,
        );

        // Step 5: carry `index_offset` into the next block (I5).
        self.index_offset = granularity::next_index_offset(
            self.index_offset,
            rows_in_block as u64,
            self.options.granularity,
        );
        Ok(())
    }

    /// `writeSuffix` is explicitly unsupported (§4.6 state machine, §9 open question): only
    /// `finalize_and_get_manifest` is a valid commit.
    pub fn write_suffix(&mut self) -> Result<()> {
        Err(Error::NotImplemented("writeSuffix"))
    }

    /// Flushes every stream, writes `primary.idx`/`columns.txt`/`checksums.txt`, or removes
    /// the directory if no marks were ever taken (I6). Callable at most once.
    pub fn finalize_and_get_manifest(&mut self) -> Result<Manifest> {
        if self.state != State::Open {
            return Err(Error::AlreadyFinalized);
        }

        let mut manifest = Manifest::new();

        if let Some(index) = &mut self.index {
            index.finalize()?;
            manifest.insert(
                "primary.idx",
                crate::manifest::ManifestEntry::uncompressed(index.file_size(), index.file_hash()),
            );
        }

        for (key, stream) in self.streams.iter_mut() {
            stream.finalize()?;
            let name = self.stream_names.get(key).expect("stream_names in sync with streams");
            stream.add_to_manifest(name, &mut manifest);
        }

        if self.marks_count == 0 {
            warn!("part at {} produced no marks, removing directory", self.dir.display());
            fs::remove_dir_all(&self.dir).map_err(|e| crate::error::io_err(self.dir.clone(), e))?;
            self.state = State::Empty;
            self.streams.clear();
            return Ok(Manifest::new());
        }

        write_columns_txt(self.dir.join("columns.txt"), &self.columns)?;
        manifest.write_to(self.dir.join("checksums.txt"))?;
        debug!(
            "committed part at {} with {} marks",
            self.dir.display(),
            self.marks_count
        );

        self.state = State::Committed;
        self.streams.clear();
        Ok(manifest)
    }

    pub fn marks_count(&self) -> u64 {
        self.marks_count
    }
}
