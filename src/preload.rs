//! Parallel preloader - whole archives into memory.
//!
//! Small archives are cheaper to fetch in one go than to probe window by
//! window. Every part is downloaded by a bounded pool of workers, each
//! reading one part in streaming mode. The result is all-or-nothing.

use crate::config::DiscoveryConfig;
use crate::error::{Result, StreamError};
use crate::fetcher::SegmentFetcher;
use crate::part_file::VirtualPartFile;
use crate::segment::PartSet;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ParallelPreloader {
    fetcher: Arc<dyn SegmentFetcher>,
    config: Arc<DiscoveryConfig>,
}

impl ParallelPreloader {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, config: Arc<DiscoveryConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Download every part, keyed by part name.
    ///
    /// At most `max_workers` parts are in flight. The first failure cancels
    /// the remaining downloads and is returned; nothing partial is kept.
    pub async fn download_all(
        &self,
        parts: &PartSet,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, Arc<Vec<u8>>>> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        let started = Instant::now();
        let total = parts.len();
        let workers = self.config.streaming_workers();
        let worker_cancel = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        info!(
            parts = total,
            total_size = parts.total_size(),
            workers,
            "Preloading archive into memory"
        );

        for part in parts.parts() {
            let part = Arc::clone(part);
            let fetcher = Arc::clone(&self.fetcher);
            let config = Arc::clone(&self.config);
            let cancel = worker_cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    () = cancel.cancelled() => return Err(StreamError::Cancelled),
                    permit = semaphore.acquire_owned() => {
                        permit.map_err(|e| StreamError::Join(e.to_string()))?
                    }
                };

                let mut file = VirtualPartFile::new(Arc::clone(&part), fetcher, config, cancel);
                file.set_streaming();
                let data = file.read_to_end().await;
                file.close();
                let data = data?;

                if data.len() as u64 != part.size {
                    return Err(StreamError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{}: got {} of {} bytes", part.name, data.len(), part.size),
                    )));
                }
                Ok::<_, StreamError>((part.name.clone(), data))
            });
        }

        let mut loaded = HashMap::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(StreamError::from).and_then(|result| result) {
                Ok((name, data)) => {
                    debug!(part = %name, bytes = data.len(), done = loaded.len() + 1, total, "Part preloaded");
                    loaded.insert(name, Arc::new(data));
                }
                Err(e) => {
                    worker_cancel.cancel();
                    tasks.abort_all();
                    warn!(error = %e, done = loaded.len(), total, "Preload failed, discarding downloaded parts");
                    return Err(e);
                }
            }
        }

        info!(
            parts = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Preload complete"
        );
        Ok(loaded)
    }
}
