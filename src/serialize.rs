//! Per-column binary serializers (§1, §4.5, §6). `colpart` is agnostic to column-container
//! internals (Non-goals); this module provides the minimal `ColumnValues` contract the
//! granularity loop drives, plus native implementations used by the tests and by
//! [`primary.idx`](crate::index) encoding.

use std::io::Write;

use crate::error::{io_err, Result};

/// A materialized column slice the writer can serialize row ranges out of.
///
/// Implementations are expected to be cheap views (e.g. `&[T]`); `colpart` never mutates
/// them, only reads contiguous `[start, end)` row ranges in ascending order.
pub trait ColumnValues {
    fn len(&self) -> usize;

    /// Serializes rows `[start, end)` to `out`, in row order.
    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()>;
}

macro_rules! native_column {
    ($ty:ty) => {
        impl ColumnValues for [$ty] {
            fn len(&self) -> usize {
                <[$ty]>::len(self)
            }

            fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
                for value in &self[start..end] {
                    out.write_all(&value.to_le_bytes())
                        .map_err(|e| io_err("<column stream>", e))?;
                }
                Ok(())
            }
        }

        impl ColumnValues for Vec<$ty> {
            fn len(&self) -> usize {
                Vec::len(self)
            }

            fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
                <[$ty] as ColumnValues>::write_range(self, out, start, end)
            }
        }
    };
}

native_column!(u8);
native_column!(u16);
native_column!(u32);
native_column!(u64);
native_column!(i8);
native_column!(i16);
native_column!(i32);
native_column!(i64);
native_column!(f32);
native_column!(f64);

/// A variable-length string column: each row is `u32 LE length` followed by its UTF-8 bytes.
impl ColumnValues for [String] {
    fn len(&self) -> usize {
        <[String]>::len(self)
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        for value in &self[start..end] {
            let len = value.len() as u32;
            out.write_all(&len.to_le_bytes())
                .map_err(|e| io_err("<column stream>", e))?;
            out.write_all(value.as_bytes())
                .map_err(|e| io_err("<column stream>", e))?;
        }
        Ok(())
    }
}

impl ColumnValues for Vec<String> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        <[String] as ColumnValues>::write_range(self, out, start, end)
    }
}

/// A byte-per-row 0/1 null mask (§3, Nullable flattening rule).
pub struct NullMask<'a>(pub &'a [bool]);

impl ColumnValues for NullMask<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        for &is_null in &self.0[start..end] {
            out.write_all(&[is_null as u8])
                .map_err(|e| io_err("<column stream>", e))?;
        }
        Ok(())
    }
}

/// Per-row array lengths for one nesting level (§3, Array flattening rule): the
/// offset-sizes stream.
pub struct ArraySizes<'a>(pub &'a [u64]);

impl ColumnValues for ArraySizes<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        <[u64] as ColumnValues>::write_range(self.0, out, start, end)
    }
}

/// Translates a row range of the *outer* (top-level) rows into the matching flattened
/// element range of an `Array`'s inner values, using the per-row lengths recorded in the
/// level's offset-sizes stream (§3 Array flattening rule).
///
/// This is what lets [`crate::granularity::write_column`] drive an `Array`'s inner value
/// stream with the same row-indexed granularity loop used for every other stream of the
/// column: `sizes` has one entry per outer row, `inner` is indexed by flattened element, and
/// this adapter is the composition that makes the two agree. Nesting further (`Array<Array<T>>`)
/// composes naturally: `inner` is itself an `ArrayElements` whose row index space is the
/// flattened element space of the level above.
pub struct ArrayElements<'a, C: ColumnValues + ?Sized> {
    pub sizes: &'a [u64],
    pub inner: &'a C,
}

impl<'a, C: ColumnValues + ?Sized> ColumnValues for ArrayElements<'a, C> {
    fn len(&self) -> usize {
        self.sizes.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        let element_start = self.sizes[..start].iter().sum::<u64>() as usize;
        let element_end = self.sizes[..end].iter().sum::<u64>() as usize;
        self.inner.write_range(out, element_start, element_end)
    }
}

/// A lazily-permuted view over another column (§4.6 step 2): rows are re-indexed through
/// `permutation` without materializing a reordered copy.
pub struct Permuted<'a, C: ColumnValues + ?Sized> {
    pub inner: &'a C,
    pub permutation: &'a [usize],
}

impl<'a, C: ColumnValues + ?Sized> ColumnValues for Permuted<'a, C> {
    fn len(&self) -> usize {
        self.permutation.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        for &row in &self.permutation[start..end] {
            self.inner.write_range(out, row, row + 1)?;
        }
        Ok(())
    }
}

impl<'a, T: ColumnValues + ?Sized> ColumnValues for &'a T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        (**self).write_range(out, start, end)
    }
}

/// One level of [`compose_nested`]'s owned chain: the boxed analogue of [`ArrayElements`],
/// used because each level is built from the one beneath it during a recursive descent rather
/// than borrowed from a value already living on the caller's stack (§4.4, §9 "nesting further
/// composes naturally").
struct NestedElements<'a> {
    sizes: &'a [u64],
    inner: Box<dyn ColumnValues + 'a>,
}

impl<'a> ColumnValues for NestedElements<'a> {
    fn len(&self) -> usize {
        self.sizes.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        let element_start = self.sizes[..start].iter().sum::<u64>() as usize;
        let element_end = self.sizes[..end].iter().sum::<u64>() as usize;
        self.inner.write_range(out, element_start, element_end)
    }
}

/// The boxed analogue of [`Permuted`], wrapping an owned inner chain rather than borrowing one.
struct PermutedOwned<'a> {
    inner: Box<dyn ColumnValues + 'a>,
    permutation: &'a [usize],
}

impl<'a> ColumnValues for PermutedOwned<'a> {
    fn len(&self) -> usize {
        self.permutation.len()
    }

    fn write_range(&self, out: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        for &row in &self.permutation[start..end] {
            self.inner.write_range(out, row, row + 1)?;
        }
        Ok(())
    }
}

/// Builds the view a value at the bottom of `chain` levels of `Array`/`Nested` nesting must be
/// written through so a single outer-row-indexed granularity loop reaches it: `chain[0]` is the
/// outermost level's sizes, matching `Array(Array(...))` declaration order (§4.4, §9).
///
/// [`crate::part::PartAssembler`] calls this once per physical stream (a nested value stream, or
/// a deeper level's own array-sizes stream being written through the levels shallower than it),
/// with `chain` being whatever sizes arrays it has accumulated while descending the column's type
/// tree so far.
pub fn compose_nested<'a>(chain: &[&'a [u64]], leaf: &'a dyn ColumnValues) -> Box<dyn ColumnValues + 'a> {
    match chain.split_first() {
        None => Box::new(leaf),
        Some((sizes, rest)) => Box::new(NestedElements {
            sizes,
            inner: compose_nested(rest, leaf),
        }),
    }
}

/// [`compose_nested`], additionally re-indexed through a sort permutation applied once, at the
/// outermost (top) row level (§4.6 step 2): nesting below the top level is never independently
/// reordered, only carried along with whichever top row it belongs to, which is exactly what
/// composing a single outer [`PermutedOwned`] wrap around the whole nested chain achieves.
pub fn compose_physical<'a>(
    chain: &[&'a [u64]],
    leaf: &'a dyn ColumnValues,
    permutation: Option<&'a [usize]>,
) -> Box<dyn ColumnValues + 'a> {
    let nested = compose_nested(chain, leaf);
    match permutation {
        Some(permutation) => Box::new(PermutedOwned {
            inner: nested,
            permutation,
        }),
        None => nested,
    }
}

/// Materialized data for one logical column, mirroring [`crate::types::ColumnType`]'s shape
/// (§3). A [`PartAssembler`](crate::part::PartAssembler) walks a column's `ColumnType` and
/// `ColumnData` in lockstep: the type tree tells it which physical streams exist, the data
/// tree tells it what to serialize into them.
pub enum ColumnData<'a> {
    Primitive(&'a dyn ColumnValues),
    Nullable {
        mask: &'a [bool],
        inner: Box<ColumnData<'a>>,
    },
    Array {
        sizes: &'a [u64],
        inner: Box<ColumnData<'a>>,
    },
    /// A `Nested(name, fields)` group (§3): structurally an `Array` whose offset-sizes stream
    /// is shared across every field, each field being that array's elements (§4.4, scenario 5).
    Nested {
        sizes: &'a [u64],
        fields: Vec<(String, ColumnData<'a>)>,
    },
}

impl<'a> ColumnData<'a> {
    /// Row count at this node's own nesting level (outer rows for `Array`/`Nullable`/`Nested`,
    /// not the flattened element count of whatever is nested beneath it).
    pub fn rows(&self) -> usize {
        match self {
            ColumnData::Primitive(values) => values.len(),
            ColumnData::Nullable { mask, .. } => mask.len(),
            ColumnData::Array { sizes, .. } => sizes.len(),
            ColumnData::Nested { sizes, .. } => sizes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_elements_translates_outer_rows_to_flattened_range() {
        let inner: Vec<u8> = vec![10, 11, 20, 30, 30];
        let sizes = [2u64, 1, 0, 2];
        let view = ArrayElements {
            sizes: &sizes,
            inner: &inner,
        };
        let mut buf = Vec::new();
        view.write_range(&mut buf, 1, 3).unwrap(); // rows 1..3 => elements [2..3) => [20]
        assert_eq!(buf, [20]);

        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 4).unwrap();
        assert_eq!(buf, inner);
    }

    #[test]
    fn native_column_writes_le_bytes() {
        let values: Vec<u32> = vec![1, 2, 3];
        let mut buf = Vec::new();
        values.write_range(&mut buf, 0, 3).unwrap();
        assert_eq!(buf, [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn partial_range_only_writes_requested_rows() {
        let values: Vec<u8> = vec![10, 20, 30, 40];
        let mut buf = Vec::new();
        values.write_range(&mut buf, 1, 3).unwrap();
        assert_eq!(buf, [20, 30]);
    }

    #[test]
    fn null_mask_writes_one_byte_per_row() {
        let mask = [true, false, true];
        let view = NullMask(&mask);
        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 3).unwrap();
        assert_eq!(buf, [1, 0, 1]);
    }

    #[test]
    fn permuted_reindexes_rows() {
        let values: Vec<u8> = vec![10, 20, 30];
        let permutation = [2usize, 0, 1];
        let view = Permuted {
            inner: &values,
            permutation: &permutation,
        };
        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 3).unwrap();
        assert_eq!(buf, [30, 10, 20]);
    }

    #[test]
    fn string_column_length_prefixes_utf8() {
        let values = vec!["ab".to_string(), "c".to_string()];
        let mut buf = Vec::new();
        values.write_range(&mut buf, 0, 2).unwrap();
        assert_eq!(buf, [2, 0, 0, 0, b'a', b'b', 1, 0, 0, 0, b'c']);
    }

    #[test]
    fn compose_nested_with_empty_chain_is_transparent() {
        let values: Vec<u8> = vec![1, 2, 3];
        let view = compose_nested(&[], &values);
        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 3).unwrap();
        assert_eq!(buf, values);
    }

    #[test]
    fn compose_nested_two_levels_matches_manual_array_elements() {
        // Array(Array(U8)): level0 has 2 rows, level1 has 3 elements total, leaf has 5 values.
        let level0 = [2u64, 1];
        let level1 = [2u64, 1, 2];
        let leaf: Vec<u8> = vec![10, 11, 20, 30, 31];
        let view = compose_nested(&[&level0, &level1], &leaf);
        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 1).unwrap(); // row 0 => level1[0..2] => leaf[0..3]
        assert_eq!(buf, [10, 11, 20]);
        let mut buf = Vec::new();
        view.write_range(&mut buf, 1, 2).unwrap(); // row 1 => level1[2..3] => leaf[3..5]
        assert_eq!(buf, [30, 31]);
    }

    #[test]
    fn compose_physical_applies_permutation_outermost() {
        let values: Vec<u8> = vec![10, 20, 30];
        let permutation = [2usize, 0, 1];
        let view = compose_physical(&[], &values, Some(&permutation));
        let mut buf = Vec::new();
        view.write_range(&mut buf, 0, 3).unwrap();
        assert_eq!(buf, [30, 10, 20]);
    }
}
