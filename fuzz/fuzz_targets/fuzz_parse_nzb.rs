#![no_main]
use libfuzzer_sys::fuzz_target;
use usenet_archive_stream::{parse_nzb_xml, split_archive_parts};

// Parse arbitrary XML as an NZB, then canonicalize whatever volumes come out.
fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(nzb) = parse_nzb_xml(xml) else {
        return;
    };

    let split = split_archive_parts(nzb.parts());
    if let Some(format) = split.format {
        let parts = format.canonicalize(split.archive_parts);
        let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
        let _ = format.first_part(&names);
    }
});
