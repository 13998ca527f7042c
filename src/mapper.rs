//! Segment mapper - archive byte ranges to trimmed article segments.
//!
//! Given where an archive entry's bytes live (one logical offset into the
//! concatenated parts, or explicit per-volume spans), produce the ordered list
//! of segments a player has to fetch, each trimmed to exactly the bytes that
//! belong to the entry.
//!
//! Every function returns the number of bytes actually covered next to the
//! segments. Callers compare it with the requested length; a shortfall means
//! the catalog does not describe the archive the decoder saw.

use crate::decoder::VolumeSpan;
use crate::segment::{PartSet, PartWindow, Segment};
use tracing::warn;

/// Segments of one part covering `data_offset..data_offset + length`.
///
/// `segments` must be the part's segments in order; their lengths are walked
/// cumulatively to find each one's position inside the part. Returned
/// segments keep their id and declared size, with offsets narrowed to the
/// intersection.
pub fn slice_part_segments(segments: &[Segment], data_offset: u64, length: u64) -> (Vec<Segment>, u64) {
    if length == 0 {
        return (Vec::new(), 0);
    }

    // A range that overflows u64 cannot lie inside any part
    let Some(target_end) = data_offset.checked_add(length - 1) else {
        return (Vec::new(), 0);
    };
    let target_start = data_offset;
    let mut covered = 0u64;
    let mut out = Vec::new();

    // Position of the current segment's first byte inside the part
    let mut abs_pos = 0u64;
    for seg in segments {
        let seg_size = seg.length();
        if seg_size == 0 {
            continue;
        }
        let seg_abs_start = abs_pos;
        let seg_abs_end = abs_pos + seg_size - 1;

        if seg_abs_end < target_start {
            abs_pos += seg_size;
            continue;
        }
        if seg_abs_start > target_end {
            break;
        }

        let overlap_start = seg_abs_start.max(target_start);
        let overlap_end = seg_abs_end.min(target_end);

        let trimmed = seg
            .pad_start(overlap_start - seg_abs_start)
            .pad_end(seg_abs_end - overlap_end);
        covered += trimmed.length();
        out.push(trimmed);

        if overlap_end == target_end {
            break;
        }
        abs_pos += seg_size;
    }

    (out, covered)
}

/// Segments covering `entry_offset..entry_offset + entry_length` of the
/// logical concatenation described by `windows`, possibly across parts.
pub fn map_range(entry_offset: u64, entry_length: u64, windows: &[PartWindow]) -> (Vec<Segment>, u64) {
    if entry_length == 0 {
        return (Vec::new(), 0);
    }

    // Exclusive
    let Some(entry_end) = entry_offset.checked_add(entry_length) else {
        return (Vec::new(), 0);
    };
    let mut segments = Vec::new();
    let mut covered = 0u64;

    for window in windows {
        if window.absolute_end <= entry_offset || window.absolute_start >= entry_end {
            continue;
        }

        let overlap_start = entry_offset.max(window.absolute_start);
        let overlap_end = entry_end.min(window.absolute_end);

        let part_offset = overlap_start - window.absolute_start;
        let part_length = overlap_end - overlap_start;

        let (sliced, part_covered) = slice_part_segments(&window.part.segments, part_offset, part_length);
        if part_covered != part_length {
            warn!(
                part = %window.part.name,
                expected = part_length,
                covered = part_covered,
                offset = part_offset,
                "Part coverage mismatch"
            );
        }

        segments.extend(sliced);
        covered += part_covered;
    }

    (segments, covered)
}

/// Segments for an entry stored as explicit per-volume spans, in span order.
///
/// Spans naming a part that is not in `parts` are skipped with a warning, so
/// the returned coverage comes up short.
pub fn map_volume_spans(spans: &[VolumeSpan], parts: &PartSet) -> (Vec<Segment>, u64) {
    let mut segments = Vec::new();
    let mut covered = 0u64;

    for (span_index, span) in spans.iter().enumerate() {
        if span.packed_size == 0 {
            continue;
        }

        let Some(part) = parts.find(&span.part_name) else {
            warn!(part = %span.part_name, "Archive volume not found among NZB parts");
            continue;
        };

        let (sliced, span_covered) = slice_part_segments(&part.segments, span.data_offset, span.packed_size);
        if span_covered != span.packed_size {
            warn!(
                part = %span.part_name,
                span_index,
                expected = span.packed_size,
                covered = span_covered,
                data_offset = span.data_offset,
                "Part coverage mismatch"
            );
        }

        segments.extend(sliced);
        covered += span_covered;
    }

    (segments, covered)
}

/// Summed length of trimmed segments.
pub fn total_length(segments: &[Segment]) -> u64 {
    segments.iter().map(Segment::length).sum()
}
