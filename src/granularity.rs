//! [`GranularityController`], component C5 (§4.5): decides where mark boundaries fall while
//! a column's rows stream through a [`ColumnStream`], as a function of `granularity`, the
//! carry-over `index_offset`, and the current frame's buffered-byte threshold.

use crate::error::Result;
use crate::serialize::ColumnValues;
use crate::stream::column::ColumnStream;

/// Drives `column`'s `[0, rows_in_block)` range through `stream`, emitting one mark every
/// `granularity` rows (after finishing whatever granule `index_offset` carried in from the
/// previous block), per the pseudocode in §4.5.
///
/// All physical streams of one logical column (values, null-map, array-sizes) are driven by
/// independent calls to this function sharing the same `rows_in_block`/`index_offset`, so they
/// emit the same marks count by construction (§4.5 "individual columns do not independently
/// count marks").
pub fn write_granules(
    stream: &mut ColumnStream,
    column: &(dyn ColumnValues + '_),
    rows_in_block: usize,
    granularity: u64,
    index_offset: u64,
    min_frame_bytes: usize,
) -> Result<()> {
    let granularity = granularity as usize;
    let mut index_offset = index_offset as usize;
    let mut cursor = 0usize;
    while cursor < rows_in_block {
        let remaining = rows_in_block - cursor;
        let limit = if cursor == 0 && index_offset != 0 {
            // Finish the granule carried over from the previous block: no mark here.
            index_offset.min(remaining)
        } else {
            index_offset = 0;
            stream.data_mut().frame_boundary_if_threshold(min_frame_bytes)?;
            let mark = stream.data_mut().mark_cursor();
            stream.append_mark(mark)?;
            granularity.min(remaining)
        };
        column.write_range(stream.data_mut(), cursor, cursor + limit)?;
        // Avoid marks that would point to the exact end of a frame (§4.5, §4.1).
        stream.data_mut().next_if_at_end()?;
        cursor += limit;
    }
    Ok(())
}

/// Number of marks a single block of `rows` rows contributes, given the `index_offset` it
/// starts at (P1). Mirrors [`write_granules`]'s branch structure exactly (rather than a closed
/// form) so the two never disagree at the boundary where a carried-over granule exactly
/// exhausts the block: that mark is deferred whole to the next block, not double-counted here.
pub fn marks_in_block(rows: u64, index_offset: u64, granularity: u64) -> u64 {
    let mut cursor = 0u64;
    let mut offset = index_offset;
    let mut marks = 0u64;
    while cursor < rows {
        let remaining = rows - cursor;
        if cursor == 0 && offset != 0 {
            cursor += offset.min(remaining);
        } else {
            marks += 1;
            cursor += granularity.min(remaining);
        }
    }
    marks
}

/// `index_offset` to carry into the next block, after a block of `rows` rows (I5).
pub fn next_index_offset(index_offset: u64, rows: u64, granularity: u64) -> u64 {
    (granularity - (granularity - index_offset + rows) % granularity) % granularity
}
