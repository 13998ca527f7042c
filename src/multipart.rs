//! MultiPartReader - the concatenated parts as one flat archive.
//!
//! Formats like 7z keep their metadata at offsets relative to the start of
//! the whole split archive. This reader maps such absolute offsets onto the
//! right part and stitches reads that straddle a part boundary.

use crate::error::Result;
use crate::filesystem::{PartReader, VolumeSource};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Random access over the logical concatenation of a source's parts.
///
/// Keeps the last opened part handle so sequential reads within one part
/// reuse its network reader.
pub struct MultiPartReader {
    source: Arc<dyn VolumeSource>,
    current: Mutex<Option<Box<dyn PartReader>>>,
}

impl MultiPartReader {
    pub fn new(source: Arc<dyn VolumeSource>) -> Self {
        Self {
            source,
            current: Mutex::new(None),
        }
    }

    pub fn total_size(&self) -> u64 {
        self.source.part_set().total_size()
    }

    /// Read at an absolute archive offset.
    ///
    /// Returns fewer bytes than requested at the end of the archive, or when
    /// a part ends early. Other backend errors abort the read.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let parts = self.source.part_set();
        let total = parts.total_size();
        if buf.is_empty() || offset >= total {
            return Ok(0);
        }

        let mut done = 0usize;
        let mut abs = offset;
        while done < buf.len() {
            let Some(idx) = parts.find_window_index(abs) else {
                break;
            };
            let window = &parts.windows()[idx];
            let part_offset = abs - window.absolute_start;
            let want = (buf.len() - done).min((window.absolute_end - abs) as usize);

            let n = self
                .read_part(&window.part.name, part_offset, &mut buf[done..done + want])
                .await?;
            done += n;
            abs += n as u64;

            if n < want {
                debug!(
                    part = %window.part.name,
                    part_offset,
                    wanted = want,
                    got = n,
                    "Short read at end of part"
                );
                break;
            }
        }

        Ok(done)
    }

    async fn read_part(&self, name: &str, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut current = self.current.lock().await;

        if current.as_ref().map_or(true, |handle| handle.name() != name) {
            if let Some(mut old) = current.take() {
                old.close();
            }
            *current = Some(self.source.open(name)?);
        }
        let Some(handle) = current.as_mut() else {
            return Ok(0);
        };

        if handle.position() != offset {
            handle.seek(SeekFrom::Start(offset))?;
        }

        let mut filled = 0;
        while filled < buf.len() {
            match handle.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.is_eof() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Close the cached part handle.
    pub async fn close(&self) {
        if let Some(mut handle) = self.current.lock().await.take() {
            handle.close();
        }
    }
}
