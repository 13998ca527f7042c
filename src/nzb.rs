//! NZB manifest parsing.
//!
//! Turns NZB XML into [`Part`]s for the segment catalog. Segment offsets are
//! laid out from each segment's declared `bytes` attribute; when exact decoded
//! sizes are known, build parts with [`Part::from_segment_sizes`] instead.

use crate::error::{Result, StreamError};
use crate::segment::{Part, Segment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Nzb {
    #[serde(rename = "file", default)]
    pub files: Vec<NzbFile>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NzbFile {
    #[serde(rename = "@poster")]
    pub poster: Option<String>,
    #[serde(rename = "@date")]
    pub date: Option<u64>,
    #[serde(rename = "@subject")]
    pub subject: String,

    #[serde(default)]
    pub groups: NzbGroups,

    #[serde(default)]
    pub segments: NzbSegments,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NzbGroups {
    #[serde(rename = "group", default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NzbSegments {
    #[serde(rename = "segment", default)]
    pub segments: Vec<NzbSegment>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NzbSegment {
    #[serde(rename = "@bytes")]
    pub bytes: u64,
    #[serde(rename = "@number")]
    pub number: u32,
    #[serde(rename = "$value")]
    pub id: String,
}

pub fn parse_nzb_xml(xml: &str) -> Result<Nzb> {
    let nzb: Nzb = quick_xml::de::from_str(xml)?;
    if nzb.files.is_empty() {
        return Err(StreamError::InvalidNzb("manifest lists no files".to_string()));
    }
    Ok(nzb)
}

impl Nzb {
    /// One part per file entry, in manifest order.
    pub fn parts(&self) -> Vec<Part> {
        self.files.iter().map(NzbFile::to_part).collect()
    }
}

impl NzbFile {
    /// File name announced in the subject line.
    ///
    /// Posters quote the name (`"movie.part01.rar" yEnc (1/50)`); without
    /// quotes the last word before the yEnc marker is used.
    pub fn filename(&self) -> String {
        let subject = self.subject.trim();

        if let Some(start) = subject.find('"') {
            if let Some(len) = subject[start + 1..].find('"') {
                let quoted = subject[start + 1..start + 1 + len].trim();
                if !quoted.is_empty() {
                    return quoted.to_string();
                }
            }
        }

        let head = match subject.find(" yEnc") {
            Some(idx) => &subject[..idx],
            None => subject,
        };
        head.split_whitespace()
            .rfind(|w| !(w.starts_with('(') || w.starts_with('[')))
            .unwrap_or(head)
            .to_string()
    }

    /// Segments ordered by article number, each untrimmed.
    pub fn ordered_segments(&self) -> Vec<Segment> {
        let mut segments = self.segments.segments.clone();
        segments.sort_by_key(|s| s.number);
        segments
            .into_iter()
            .map(|s| Segment::new(s.id.trim(), s.bytes))
            .collect()
    }

    pub fn to_part(&self) -> Part {
        Part::new(self.filename(), self.ordered_segments())
    }
}
