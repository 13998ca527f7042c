//! In-memory fakes for the fetcher and decoder seams.

use crate::decoder::{ArchiveDecoder, RawEntry};
use crate::error::{Result, StreamError};
use crate::fetcher::{BoxFuture, FetchRequest, SegmentFetcher, SegmentReader};
use crate::filesystem::{read_full, VolumeSource};
use crate::naming::ArchiveFormat;
use crate::segment::{Part, ReadInterval, Segment};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Deterministic test bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serves article bytes from memory and records every reader it opens.
pub struct MemoryFetcher {
    articles: HashMap<String, Vec<u8>>,
    opens: AtomicUsize,
    failures: AtomicUsize,
    truncate_at: AtomicUsize,
    requests: Mutex<Vec<(String, ReadInterval)>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            articles: HashMap::new(),
            opens: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            truncate_at: AtomicUsize::new(usize::MAX),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Split `data` into articles of `segment_size` bytes and return the part.
    pub fn add_part(&mut self, name: &str, data: &[u8], segment_size: usize) -> Part {
        let segments = data
            .chunks(segment_size)
            .enumerate()
            .map(|(i, chunk)| {
                let id = format!("{}-{}@test", name, i);
                self.articles.insert(id.clone(), chunk.to_vec());
                Segment::new(id, chunk.len() as u64)
            })
            .collect();
        Part::new(name, segments)
    }

    /// Successfully opened readers.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Part name and window of every opened reader, in order.
    pub fn intervals(&self) -> Vec<(String, ReadInterval)> {
        self.requests.lock().unwrap().clone()
    }

    /// Fail the next `count` opens with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Make every reader yield at most `len` bytes.
    pub fn truncate_readers(&self, len: usize) {
        self.truncate_at.store(len, Ordering::SeqCst);
    }
}

impl SegmentFetcher for MemoryFetcher {
    fn open_reader<'a>(&'a self, request: FetchRequest<'a>) -> BoxFuture<'a, SegmentReader> {
        Box::pin(async move {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StreamError::Transport(format!(
                    "injected failure for {}",
                    request.part_name
                )));
            }

            self.opens.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push((request.part_name.to_string(), request.interval));

            let mut out = Vec::with_capacity(request.interval.length() as usize);
            for seg in &request.segments {
                let article = self
                    .articles
                    .get(&seg.id)
                    .ok_or_else(|| StreamError::Transport(format!("missing article {}", seg.id)))?;
                out.extend_from_slice(&article[seg.start_offset as usize..=seg.end_offset as usize]);
            }
            out.truncate(self.truncate_at.load(Ordering::SeqCst));

            Ok(Box::new(Cursor::new(out)) as SegmentReader)
        })
    }
}

/// Fetcher that never delivers: either the open or the first read hangs.
pub struct StalledFetcher {
    stall_open: bool,
}

impl StalledFetcher {
    pub fn reading() -> Self {
        Self { stall_open: false }
    }

    pub fn opening() -> Self {
        Self { stall_open: true }
    }
}

struct PendingReader;

impl AsyncRead for PendingReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl SegmentFetcher for StalledFetcher {
    fn open_reader<'a>(&'a self, _request: FetchRequest<'a>) -> BoxFuture<'a, SegmentReader> {
        let stall_open = self.stall_open;
        Box::pin(async move {
            if stall_open {
                std::future::pending::<()>().await;
            }
            Ok(Box::new(PendingReader) as SegmentReader)
        })
    }
}

/// Decoder that returns a fixed entry list, optionally reading the first
/// part's header through the volume source first.
pub struct ScriptedDecoder {
    format: ArchiveFormat,
    entries: Vec<RawEntry>,
    /// Listings for other archives, keyed by first part name.
    nested: HashMap<String, Vec<RawEntry>>,
    failure: Option<String>,
    probe: usize,
    calls: AtomicUsize,
    first_parts: Mutex<Vec<String>>,
}

impl ScriptedDecoder {
    pub fn new(format: ArchiveFormat, entries: Vec<RawEntry>) -> Self {
        Self {
            format,
            entries,
            nested: HashMap::new(),
            failure: None,
            probe: 0,
            calls: AtomicUsize::new(0),
            first_parts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(format: ArchiveFormat, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(format, Vec::new())
        }
    }

    /// Read `len` header bytes from the first part before answering.
    pub fn with_probe(mut self, len: usize) -> Self {
        self.probe = len;
        self
    }

    /// Answer with `entries` when decoding the archive starting at `first_part`.
    pub fn with_nested(mut self, first_part: &str, entries: Vec<RawEntry>) -> Self {
        self.nested.insert(first_part.to_string(), entries);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn first_parts(&self) -> Vec<String> {
        self.first_parts.lock().unwrap().clone()
    }
}

impl ArchiveDecoder for ScriptedDecoder {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn decode<'a>(
        &'a self,
        volumes: Arc<dyn VolumeSource>,
        first_part: &'a str,
    ) -> BoxFuture<'a, Vec<RawEntry>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.first_parts.lock().unwrap().push(first_part.to_string());

            if let Some(message) = &self.failure {
                return Err(StreamError::Decoder(message.clone()));
            }

            if self.probe > 0 {
                let mut handle = volumes.open(first_part)?;
                let mut header = vec![0u8; self.probe];
                let n = read_full(handle.as_mut(), &mut header).await?;
                handle.close();
                if n < self.probe.min(handle.size() as usize) {
                    return Err(StreamError::Decoder(format!("short header in {}", first_part)));
                }
            }

            Ok(self
                .nested
                .get(first_part)
                .unwrap_or(&self.entries)
                .clone())
        })
    }
}
