//! Random-access streaming of files inside archives posted to Usenet.
//!
//! Given the parts of a multi-part RAR or 7z archive described by an NZB,
//! this crate finds the files inside the archive and maps each one to the
//! exact article segments (with byte sub-ranges) a player must fetch, in
//! order, to stream it. Nothing is downloaded beyond what the archive
//! decoder needs to read the headers.
//!
//! Two seams are left to the host:
//! - [`SegmentFetcher`] turns trimmed segments into bytes (NNTP pooling,
//!   retries, yEnc decoding).
//! - [`ArchiveDecoder`] reads the container's file table through a
//!   [`VolumeSource`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use usenet_archive_stream::{parse_nzb_xml, ArchiveDiscovery, DiscoveryConfig, is_video_file};
//!
//! let nzb = parse_nzb_xml(&xml)?;
//! let discovery = ArchiveDiscovery::new(fetcher, decoder, DiscoveryConfig::default());
//! let cancel = CancellationToken::new();
//!
//! // Stop at the first playable video
//! let entries = discovery
//!     .discover_progressive(nzb.parts(), |e| !is_video_file(&e.internal_path), &cancel)
//!     .await?;
//! ```

pub mod config;
pub mod decoder;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod filesystem;
pub mod mapper;
pub mod multipart;
pub mod naming;
pub mod nzb;
pub mod part_file;
pub mod preload;
pub mod segment;

#[cfg(test)]
mod testing;

pub use config::{DiscoveryConfig, DiscoveryOptions, EntryFilter};
pub use decoder::{ArchiveDecoder, EntryLocation, RawEntry, VolumeSpan};
pub use discovery::ArchiveDiscovery;
pub use entry::{ArchiveEntry, FileMetadata, FileStatus};
pub use error::{ErrorCategory, Result, StreamError};
pub use fetcher::{BoxFuture, FetchRequest, SegmentFetcher, SegmentReader};
pub use filesystem::{
    read_exact_at, read_full, MemoryFilesystem, PartInfo, PartReader, VirtualFilesystem,
    VolumeSource,
};
pub use mapper::{map_range, map_volume_spans, slice_part_segments};
pub use multipart::MultiPartReader;
pub use naming::{
    is_7z_name, is_media_file, is_par2_name, is_rar_name, is_video_file, split_archive_parts,
    ArchiveFormat, ArchiveSplit,
};
pub use nzb::{parse_nzb_xml, Nzb, NzbFile};
pub use part_file::{ReadMode, VirtualPartFile};
pub use preload::ParallelPreloader;
pub use segment::{Part, PartSet, PartWindow, ReadInterval, Segment};
