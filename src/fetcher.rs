//! SegmentFetcher trait - the network side of part reading.
//!
//! This crate never speaks NNTP. A [`SegmentFetcher`] resolves already-trimmed
//! segments to article bodies, pools its connections and applies its own
//! retry policy, then hands back a sequential reader over the requested window.

use crate::error::Result;
use crate::segment::{ReadInterval, Segment};
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Sequential byte stream over one requested window of a part.
pub type SegmentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One window of one part to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    /// Name of the part the window belongs to (for logging).
    pub part_name: &'a str,
    /// Segments covering exactly `interval`, trimmed, in part order.
    pub segments: Vec<Segment>,
    /// The window inside the part, inclusive.
    pub interval: ReadInterval,
    /// How many articles may be fetched in parallel.
    pub workers: usize,
    /// Cache budget hint for the fetcher's own read-ahead.
    pub max_cache_size_mb: usize,
    pub cancel: CancellationToken,
}

/// Abstract source of article bytes.
///
/// Implement this over a pooled NNTP client. The returned reader must yield
/// exactly `interval.length()` bytes in order, or fail.
pub trait SegmentFetcher: Send + Sync {
    fn open_reader<'a>(&'a self, request: FetchRequest<'a>) -> BoxFuture<'a, SegmentReader>;
}
