//! Read-only filesystems over the parts of one archive.
//!
//! Decoders see archive volumes through [`VolumeSource`]. Two sources exist:
//! [`VirtualFilesystem`] fetches part bytes lazily from Usenet, and
//! [`MemoryFilesystem`] serves parts the preloader already downloaded.

use crate::config::DiscoveryConfig;
use crate::error::{Result, StreamError};
use crate::fetcher::{BoxFuture, SegmentFetcher};
use crate::part_file::VirtualPartFile;
use crate::segment::PartSet;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Name and size of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    pub name: String,
    pub size: u64,
}

/// Random-access handle over one part.
///
/// A handle keeps cursor and buffer state and must not be shared between
/// concurrent callers. Open one handle per caller instead.
pub trait PartReader: Send {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn position(&self) -> u64;

    /// Read at the cursor. Returns 0 only at end of part.
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, usize>;

    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Release network readers and buffers. Later calls fail with
    /// [`StreamError::Closed`].
    fn close(&mut self);
}

/// Open/stat surface over every part of a [`PartSet`].
pub trait VolumeSource: Send + Sync {
    /// Open a part by exact name, falling back to base name.
    fn open(&self, name: &str) -> Result<Box<dyn PartReader>>;

    fn stat(&self, name: &str) -> Result<PartInfo>;

    fn part_set(&self) -> &PartSet;
}

fn stat_in(parts: &PartSet, name: &str) -> Result<PartInfo> {
    parts
        .find(name)
        .map(|part| PartInfo {
            name: part.name.clone(),
            size: part.size,
        })
        .ok_or_else(|| StreamError::PartNotFound(name.to_string()))
}

/// Fill `buf` from the cursor, stopping early only at end of part.
pub async fn read_full(reader: &mut dyn PartReader, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Seek to `offset` and fill `buf`.
pub async fn read_exact_at(reader: &mut dyn PartReader, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    let n = read_full(reader, buf).await?;
    if n < buf.len() {
        return Err(StreamError::InvalidOffset {
            offset: offset + buf.len() as u64,
            length: reader.size(),
        });
    }
    Ok(())
}

/// Parts fetched lazily through a [`SegmentFetcher`].
pub struct VirtualFilesystem {
    parts: Arc<PartSet>,
    fetcher: Arc<dyn SegmentFetcher>,
    config: Arc<DiscoveryConfig>,
    cancel: CancellationToken,
}

impl VirtualFilesystem {
    pub fn new(
        parts: Arc<PartSet>,
        fetcher: Arc<dyn SegmentFetcher>,
        config: Arc<DiscoveryConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            parts,
            fetcher,
            config,
            cancel,
        }
    }

    /// Open a part as its concrete handle type.
    pub fn open_part(&self, name: &str) -> Result<VirtualPartFile> {
        let part = self
            .parts
            .find(name)
            .ok_or_else(|| StreamError::PartNotFound(name.to_string()))?;
        Ok(VirtualPartFile::new(
            Arc::clone(part),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.config),
            self.cancel.clone(),
        ))
    }
}

impl VolumeSource for VirtualFilesystem {
    fn open(&self, name: &str) -> Result<Box<dyn PartReader>> {
        Ok(Box::new(self.open_part(name)?))
    }

    fn stat(&self, name: &str) -> Result<PartInfo> {
        stat_in(&self.parts, name)
    }

    fn part_set(&self) -> &PartSet {
        &self.parts
    }
}

/// Parts held fully in memory after a preload.
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    parts: Arc<PartSet>,
    data: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryFilesystem {
    /// `data` is keyed by part name as it appears in `parts`.
    pub fn new(parts: Arc<PartSet>, data: HashMap<String, Arc<Vec<u8>>>) -> Self {
        Self { parts, data }
    }
}

impl VolumeSource for MemoryFilesystem {
    fn open(&self, name: &str) -> Result<Box<dyn PartReader>> {
        let part = self
            .parts
            .find(name)
            .ok_or_else(|| StreamError::PartNotFound(name.to_string()))?;
        let data = self
            .data
            .get(&part.name)
            .ok_or_else(|| StreamError::PartNotFound(part.name.clone()))?;
        Ok(Box::new(MemoryPartFile::new(part.name.clone(), Arc::clone(data))))
    }

    fn stat(&self, name: &str) -> Result<PartInfo> {
        stat_in(&self.parts, name)
    }

    fn part_set(&self) -> &PartSet {
        &self.parts
    }
}

/// Handle over preloaded part bytes.
#[derive(Debug)]
pub struct MemoryPartFile {
    name: String,
    data: Arc<Vec<u8>>,
    position: u64,
    closed: bool,
}

impl MemoryPartFile {
    pub fn new(name: String, data: Arc<Vec<u8>>) -> Self {
        Self {
            name,
            data,
            position: 0,
            closed: false,
        }
    }

    fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let len = self.data.len() as u64;
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl PartReader for MemoryPartFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, usize> {
        let result = self.read_sync(buf);
        Box::pin(async move { result })
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let target = resolve_seek(pos, self.position, self.size())?;
        self.position = target;
        Ok(target)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Resolve a seek against a part of `size` bytes. Seeking to `size` is allowed.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> Result<u64> {
    let target: i128 = match pos {
        SeekFrom::Start(offset) => i128::from(offset),
        SeekFrom::Current(delta) => i128::from(current) + i128::from(delta),
        SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    if target < 0 {
        return Err(StreamError::NegativeSeek(
            i64::try_from(target).unwrap_or(i64::MIN),
        ));
    }
    match u64::try_from(target) {
        Ok(offset) if offset <= size => Ok(offset),
        _ => Err(StreamError::InvalidOffset {
            offset: u64::try_from(target).unwrap_or(u64::MAX),
            length: size,
        }),
    }
}
