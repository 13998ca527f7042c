#![no_main]
use libfuzzer_sys::fuzz_target;
use usenet_archive_stream::mapper::total_length;
use usenet_archive_stream::{map_range, Part, PartSet};

// Build parts from fuzzed segment sizes; mapping must never over-cover and
// must cover in-range requests exactly.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let offset = u64::from(u16::from_le_bytes([data[0], data[1]]));
    let length = u64::from(u16::from_le_bytes([data[2], data[3]]));

    // Each remaining byte is one segment size; a zero byte starts a new part
    let mut parts = Vec::new();
    let mut sizes = Vec::new();
    for &b in &data[4..] {
        if b == 0 {
            if !sizes.is_empty() {
                let name = format!("f.7z.{:03}", parts.len() + 1);
                parts.push(Part::from_segment_sizes(name, sizes.drain(..)));
            }
            continue;
        }
        let id = format!("{}-{}", parts.len(), sizes.len());
        sizes.push((id, u64::from(b)));
    }
    if !sizes.is_empty() {
        let name = format!("f.7z.{:03}", parts.len() + 1);
        parts.push(Part::from_segment_sizes(name, sizes.drain(..)));
    }

    let set = PartSet::new(parts);
    let (segments, covered) = map_range(offset, length, set.windows());
    assert_eq!(covered, total_length(&segments));
    assert!(covered <= length);
    if offset + length <= set.total_size() {
        assert_eq!(covered, length);
    }
});
