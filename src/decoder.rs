//! ArchiveDecoder trait - the container format side of discovery.
//!
//! Reading a RAR or 7z file table is left to an implementation of
//! [`ArchiveDecoder`]. It gets random access to the archive volumes through a
//! [`VolumeSource`] and reports where each internal file's bytes live.

use crate::fetcher::BoxFuture;
use crate::filesystem::VolumeSource;
use crate::naming::ArchiveFormat;
use std::sync::Arc;

/// A run of an entry's bytes inside one archive volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpan {
    /// Volume name as the decoder opened it.
    pub part_name: String,
    /// Offset of the first data byte inside the volume.
    pub data_offset: u64,
    pub packed_size: u64,
}

impl VolumeSpan {
    pub fn new(part_name: impl Into<String>, data_offset: u64, packed_size: u64) -> Self {
        Self {
            part_name: part_name.into(),
            data_offset,
            packed_size,
        }
    }
}

/// Where an entry's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLocation {
    /// Per-volume runs in archive order (multi-volume RAR).
    Volumes(Vec<VolumeSpan>),
    /// One contiguous run at this offset of the concatenated volumes (7z).
    Logical { offset: u64 },
}

/// An internal file as reported by the decoder, before segment mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub internal_path: String,
    /// Bytes the entry occupies; for stored entries this is also its size.
    pub size: u64,
    pub is_directory: bool,
    pub location: EntryLocation,
}

impl RawEntry {
    pub fn in_volumes(internal_path: impl Into<String>, spans: Vec<VolumeSpan>) -> Self {
        let size = spans
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.packed_size));
        Self {
            internal_path: internal_path.into(),
            size,
            is_directory: false,
            location: EntryLocation::Volumes(spans),
        }
    }

    pub fn at_offset(internal_path: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            internal_path: internal_path.into(),
            size,
            is_directory: false,
            location: EntryLocation::Logical { offset },
        }
    }

    pub fn directory(internal_path: impl Into<String>) -> Self {
        Self {
            internal_path: internal_path.into(),
            size: 0,
            is_directory: true,
            location: EntryLocation::Volumes(Vec::new()),
        }
    }
}

/// Lists the files inside an archive.
///
/// For multi-volume formats the implementation discovers the volumes starting
/// at `first_part`, indexes them (in parallel if it likes) and aggregates one
/// catalog before returning. Format problems such as compressed or encrypted
/// content should be reported as [`StreamError::Decoder`].
///
/// [`StreamError::Decoder`]: crate::StreamError::Decoder
pub trait ArchiveDecoder: Send + Sync {
    /// Naming scheme the volumes follow.
    fn format(&self) -> ArchiveFormat;

    fn decode<'a>(
        &'a self,
        volumes: Arc<dyn VolumeSource>,
        first_part: &'a str,
    ) -> BoxFuture<'a, Vec<RawEntry>>;
}
