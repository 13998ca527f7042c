//! Discovered archive entries and the metadata record built from them.

use crate::mapper::total_length;
use crate::segment::{base_name, Part, Segment};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A file found inside an archive, with the segments that hold its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Path inside the archive, as the decoder reported it.
    pub internal_path: String,
    /// Last path component of `internal_path`.
    pub display_name: String,
    pub logical_size: u64,
    pub is_directory: bool,
    /// Trimmed segments in archive byte order. Empty for directories.
    pub segments: Vec<Segment>,
    /// Bytes the segments actually cover.
    pub covered_bytes: u64,
}

impl ArchiveEntry {
    pub fn file(internal_path: impl Into<String>, logical_size: u64, segments: Vec<Segment>) -> Self {
        let internal_path = internal_path.into();
        let covered_bytes = total_length(&segments);
        Self {
            display_name: base_name(&internal_path).to_string(),
            internal_path,
            logical_size,
            is_directory: false,
            segments,
            covered_bytes,
        }
    }

    pub fn directory(internal_path: impl Into<String>) -> Self {
        let internal_path = internal_path.into();
        Self {
            display_name: base_name(internal_path.trim_end_matches(['/', '\\'])).to_string(),
            internal_path,
            logical_size: 0,
            is_directory: true,
            segments: Vec::new(),
            covered_bytes: 0,
        }
    }

    /// Whether the segments cover every byte of the entry.
    pub fn is_complete(&self) -> bool {
        self.is_directory || self.covered_bytes == self.logical_size
    }

    /// This entry as an archive part of its own, for archives stored inside
    /// archives.
    ///
    /// The trimmed segments already address exactly the entry's bytes, so the
    /// part can be mapped again like any NZB part.
    pub fn to_part(&self) -> Part {
        Part::new(self.display_name.clone(), self.segments.clone())
    }

    /// Record to persist for this entry.
    pub fn to_file_metadata(&self, source_nzb_path: impl Into<String>) -> FileMetadata {
        let now = SystemTime::now();
        FileMetadata {
            file_size: self.logical_size,
            source_nzb_path: source_nzb_path.into(),
            status: if self.is_complete() {
                FileStatus::Healthy
            } else {
                FileStatus::Partial
            },
            created_at: now,
            modified_at: now,
            segments: self.segments.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Healthy,
    /// Segments cover less than the declared size.
    Partial,
}

/// Persisted description of a streamable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_size: u64,
    pub source_nzb_path: String,
    pub status: FileStatus,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
    pub segments: Vec<Segment>,
}
