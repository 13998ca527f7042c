//! Error types for archive discovery and remote part reading.
//!
//! This module provides the [`StreamError`] type which covers everything that
//! can go wrong while opening, reading, preloading or analysing the parts of a
//! Usenet-hosted archive.
//!
//! ## Error Categories
//!
//! | Category | Errors | Retry? |
//! |----------|--------|--------|
//! | Not found | [`PartNotFound`], [`NoParts`], [`NoFirstPart`], [`NoFilesFound`] | never |
//! | Transport | [`Io`], [`Transport`], [`Join`] | by the fetcher, not here |
//! | Format | [`Decoder`], [`InvalidNzb`] | never |
//! | Cancelled | [`Cancelled`], [`TimedOut`] | never |
//! | Usage | [`Closed`], [`NegativeSeek`], [`InvalidOffset`] | never |
//!
//! Short segment coverage is not an error. It is logged as a warning and the
//! entry is still returned, see [`ArchiveEntry::is_complete`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use usenet_archive_stream::{ErrorCategory, StreamError};
//!
//! match discovery.discover(parts, &cancel).await {
//!     Ok(entries) => println!("Found {} files", entries.len()),
//!     Err(e) if e.category() == ErrorCategory::Cancelled => return,
//!     Err(e) => eprintln!("archive unreadable: {}", e),
//! }
//! ```
//!
//! [`PartNotFound`]: StreamError::PartNotFound
//! [`NoParts`]: StreamError::NoParts
//! [`NoFirstPart`]: StreamError::NoFirstPart
//! [`NoFilesFound`]: StreamError::NoFilesFound
//! [`Io`]: StreamError::Io
//! [`Transport`]: StreamError::Transport
//! [`Join`]: StreamError::Join
//! [`Decoder`]: StreamError::Decoder
//! [`InvalidNzb`]: StreamError::InvalidNzb
//! [`Cancelled`]: StreamError::Cancelled
//! [`TimedOut`]: StreamError::TimedOut
//! [`Closed`]: StreamError::Closed
//! [`NegativeSeek`]: StreamError::NegativeSeek
//! [`InvalidOffset`]: StreamError::InvalidOffset
//! [`ArchiveEntry::is_complete`]: crate::ArchiveEntry::is_complete

use std::fmt;
use std::io;

/// Error type for discovery and part reading.
#[derive(Debug)]
pub enum StreamError {
    /// No part with this name, tried verbatim and by base name.
    PartNotFound(String),

    /// The part list handed to discovery was empty.
    NoParts,

    /// None of the part names looks like the first volume of an archive.
    NoFirstPart,

    /// The handle was already closed.
    Closed,

    /// A seek resolved to a position before the start of the part.
    NegativeSeek(i64),

    /// A seek or read went past the end of a part.
    InvalidOffset {
        /// The requested offset.
        offset: u64,
        /// The actual part length.
        length: u64,
    },

    /// An I/O error from the segment fetcher's reader.
    Io(io::Error),

    /// The segment fetcher could not open a reader for a window.
    Transport(String),

    /// The archive decoder rejected the archive (corrupt, compressed, encrypted).
    Decoder(String),

    /// The decoder found no files in the archive.
    NoFilesFound,

    /// The pass was cancelled through its cancellation token.
    Cancelled,

    /// A network read exceeded the configured read timeout.
    TimedOut,

    /// The NZB manifest could not be parsed.
    InvalidNzb(String),

    /// A preload worker task panicked or was aborted.
    Join(String),
}

/// Coarse classification used by callers to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Transport,
    Format,
    Cancelled,
    Usage,
}

impl StreamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PartNotFound(_) | Self::NoParts | Self::NoFirstPart | Self::NoFilesFound => {
                ErrorCategory::NotFound
            }
            Self::Io(_) | Self::Transport(_) | Self::Join(_) => ErrorCategory::Transport,
            Self::Decoder(_) | Self::InvalidNzb(_) => ErrorCategory::Format,
            Self::Cancelled | Self::TimedOut => ErrorCategory::Cancelled,
            Self::Closed | Self::NegativeSeek(_) | Self::InvalidOffset { .. } => {
                ErrorCategory::Usage
            }
        }
    }

    /// Only transport failures are worth retrying, and only by the fetcher.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// End of data rather than a failure.
    pub(crate) fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartNotFound(name) => write!(f, "Part not found: {}", name),
            Self::NoParts => write!(f, "No archive parts provided"),
            Self::NoFirstPart => write!(f, "No valid first archive part found"),
            Self::Closed => write!(f, "Part handle is closed"),
            Self::NegativeSeek(pos) => write!(f, "Negative seek position: {}", pos),
            Self::InvalidOffset { offset, length } => {
                write!(f, "Invalid offset: {} (part length: {})", offset, length)
            }
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Transport(msg) => write!(f, "Failed to create usenet reader: {}", msg),
            Self::Decoder(msg) => write!(f, "Archive unreadable or unsupported: {}", msg),
            Self::NoFilesFound => write!(f, "No valid files found in archive"),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::TimedOut => write!(f, "Read timed out"),
            Self::InvalidNzb(msg) => write!(f, "Failed to parse NZB: {}", msg),
            Self::Join(msg) => write!(f, "Preload worker failed: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<quick_xml::DeError> for StreamError {
    fn from(e: quick_xml::DeError) -> Self {
        Self::InvalidNzb(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StreamError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
