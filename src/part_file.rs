//! VirtualPartFile - adaptive random-access handle over one remote part.
//!
//! A handle starts in analysis mode. Archive header parsers read small
//! records, often backward and often near the tail of a volume, so reads are
//! served through a growing fetch window (256 KiB doubling up to 4 MiB) and a
//! 512 KiB read-ahead buffer that makes re-reads free.
//!
//! The first seek to a non-zero offset that the buffer cannot serve demotes
//! the handle to streaming mode for good. Streaming readers cover everything
//! from the cursor to the end of the part.

use crate::config::{
    DiscoveryConfig, INITIAL_ANALYSIS_WINDOW, MAX_ANALYSIS_WINDOW, READ_AHEAD_BUFFER_SIZE,
    WINDOW_GROWTH_THRESHOLD,
};
use crate::error::{Result, StreamError};
use crate::fetcher::{BoxFuture, FetchRequest, SegmentFetcher, SegmentReader};
use crate::filesystem::{resolve_seek, PartReader};
use crate::mapper::slice_part_segments;
use crate::segment::{Part, ReadInterval};
use std::future::Future;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Analysis,
    Streaming,
}

/// Network reader currently open for this handle.
struct ActiveReader {
    stream: SegmentReader,
    interval: ReadInterval,
    /// Part offset of the next byte `stream` yields.
    next_offset: u64,
}

/// Sliding copy of the most recent analysis-mode bytes.
#[derive(Debug, Default)]
struct ReadAheadBuffer {
    data: Vec<u8>,
    start: u64,
}

impl ReadAheadBuffer {
    fn covers(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.start + self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let from = (offset - self.start) as usize;
        let n = buf.len().min(self.data.len() - from);
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        n
    }

    /// Append contiguous bytes, otherwise restart at `offset`; keep the tail.
    fn record(&mut self, offset: u64, bytes: &[u8]) {
        let contiguous = !self.data.is_empty() && offset == self.start + self.data.len() as u64;
        if !contiguous {
            self.data.clear();
            self.start = offset;
        }
        self.data.extend_from_slice(bytes);

        if self.data.len() > READ_AHEAD_BUFFER_SIZE {
            let excess = self.data.len() - READ_AHEAD_BUFFER_SIZE;
            self.data.drain(..excess);
            self.start += excess as u64;
        }
    }

    fn clear(&mut self) {
        self.data = Vec::new();
        self.start = 0;
    }
}

/// Random-access handle over one part, fetched on demand.
///
/// Not safe for concurrent use; open one handle per caller.
pub struct VirtualPartFile {
    part: Arc<Part>,
    fetcher: Arc<dyn SegmentFetcher>,
    config: Arc<DiscoveryConfig>,
    cancel: CancellationToken,
    position: u64,
    closed: bool,
    mode: ReadMode,
    reader: Option<ActiveReader>,
    window_size: u64,
    buffer: ReadAheadBuffer,
}

impl VirtualPartFile {
    pub fn new(
        part: Arc<Part>,
        fetcher: Arc<dyn SegmentFetcher>,
        config: Arc<DiscoveryConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            part,
            fetcher,
            config,
            cancel,
            position: 0,
            closed: false,
            mode: ReadMode::Analysis,
            reader: None,
            window_size: INITIAL_ANALYSIS_WINDOW,
            buffer: ReadAheadBuffer::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.part.name
    }

    pub fn size(&self) -> u64 {
        self.part.size
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Switch to streaming mode permanently.
    pub fn set_streaming(&mut self) {
        if self.mode == ReadMode::Analysis {
            trace!(part = %self.part.name, position = self.position, "Switching to streaming mode");
            self.mode = ReadMode::Streaming;
        }
    }

    /// Read at the cursor.
    ///
    /// Returns 0 at end of part. A network reader that ends before its window
    /// does surfaces as an `UnexpectedEof` I/O error.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        let size = self.part.size;
        if buf.is_empty() || self.position >= size {
            return Ok(0);
        }

        if self.buffer.covers(self.position) {
            let n = self.buffer.read_at(self.position, buf);
            self.position += n as u64;
            return Ok(n);
        }

        let mut active = match self.reader.take() {
            Some(reader) if reader.next_offset == self.position => reader,
            _ => self.open_window().await?,
        };

        let remaining_in_window = active.interval.end - self.position + 1;
        let want = (buf.len() as u64).min(remaining_in_window) as usize;
        let cancel = self.cancel.clone();
        let n = read_cancellable(
            &mut active.stream,
            &mut buf[..want],
            &cancel,
            self.config.read_timeout,
        )
        .await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "reader for {} ended at {} before window end {}",
                    self.part.name, self.position, active.interval.end
                ),
            )
            .into());
        }

        let start = self.position;
        self.position += n as u64;
        active.next_offset = self.position;

        if self.mode == ReadMode::Analysis {
            self.buffer.record(start, &buf[..n]);
        }

        let exhausted = active.next_offset > active.interval.end;
        let near_window_end = self.mode == ReadMode::Analysis
            && self.position + WINDOW_GROWTH_THRESHOLD >= active.interval.end
            && active.interval.end < size - 1;

        if near_window_end {
            self.window_size = (self.window_size * 2).min(MAX_ANALYSIS_WINDOW);
            trace!(
                part = %self.part.name,
                position = self.position,
                window = self.window_size,
                "Growing analysis window"
            );
        } else if !exhausted {
            self.reader = Some(active);
        }

        Ok(n)
    }

    /// Open a network reader starting at the cursor.
    async fn open_window(&mut self) -> Result<ActiveReader> {
        let part = Arc::clone(&self.part);
        let fetcher = Arc::clone(&self.fetcher);
        let cancel = self.cancel.clone();

        let start = self.position;
        let last = part.size - 1;
        let (end, workers) = match self.mode {
            ReadMode::Analysis => (
                (start + self.window_size - 1).min(last),
                self.config.analysis_workers(),
            ),
            ReadMode::Streaming => (last, self.config.streaming_workers()),
        };
        let interval = ReadInterval { start, end };

        let (segments, covered) = slice_part_segments(&part.segments, start, interval.length());
        if covered != interval.length() {
            warn!(
                part = %part.name,
                start,
                end,
                covered,
                "Segments do not cover requested window"
            );
        }

        debug!(
            part = %part.name,
            start,
            end,
            segments = segments.len(),
            mode = ?self.mode,
            "Opening part reader"
        );

        let request = FetchRequest {
            part_name: &part.name,
            segments,
            interval,
            workers,
            max_cache_size_mb: self.config.max_cache_size_mb,
            cancel: cancel.clone(),
        };

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamError::Cancelled),
            opened = with_timeout(self.config.read_timeout, fetcher.open_reader(request)) => opened?,
        };

        Ok(ActiveReader {
            stream,
            interval,
            next_offset: start,
        })
    }

    /// Move the cursor.
    ///
    /// Landing inside the read-ahead buffer keeps the mode; any other non-zero
    /// target switches to streaming. The active reader is dropped unless it is
    /// positioned exactly at the target.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let target = resolve_seek(pos, self.position, self.part.size)?;
        let buffered = self.buffer.covers(target);

        if self.mode == ReadMode::Analysis && target != 0 && !buffered {
            self.set_streaming();
        }
        if !buffered
            && self
                .reader
                .as_ref()
                .is_some_and(|reader| reader.next_offset != target)
        {
            self.reader = None;
        }

        self.position = target;
        Ok(target)
    }

    /// Read from the cursor to the end of the part.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let remaining = self.part.size.saturating_sub(self.position) as usize;
        let mut data = vec![0u8; remaining];
        let mut filled = 0;
        while filled < remaining {
            let n = self.read(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.reader = None;
        self.buffer.clear();
    }
}

async fn read_cancellable(
    stream: &mut SegmentReader,
    buf: &mut [u8],
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<usize> {
    let read = with_timeout(timeout, async { stream.read(buf).await.map_err(StreamError::from) });

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StreamError::Cancelled),
        result = read => result,
    }
}

/// Bound a network operation by the configured read timeout.
async fn with_timeout<T>(limit: Option<Duration>, op: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| StreamError::TimedOut)?,
        None => op.await,
    }
}

impl PartReader for VirtualPartFile {
    fn name(&self) -> &str {
        VirtualPartFile::name(self)
    }

    fn size(&self) -> u64 {
        VirtualPartFile::size(self)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, usize> {
        Box::pin(VirtualPartFile::read(self, buf))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        VirtualPartFile::seek(self, pos)
    }

    fn close(&mut self) {
        VirtualPartFile::close(self);
    }
}
