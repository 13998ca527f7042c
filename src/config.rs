//! Discovery configuration and per-call options.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// First analysis window requested by a fresh handle.
pub const INITIAL_ANALYSIS_WINDOW: u64 = 256 * 1024;
/// Analysis windows stop doubling here.
pub const MAX_ANALYSIS_WINDOW: u64 = 4 * 1024 * 1024;
/// A window is grown once the cursor is this close to its end.
pub const WINDOW_GROWTH_THRESHOLD: u64 = 4096;
/// Read-ahead buffer kept by each handle in analysis mode.
pub const READ_AHEAD_BUFFER_SIZE: usize = 512 * 1024;

/// Engine-wide tuning, usually loaded from the host's config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Preload pool size and streaming fetch parallelism.
    pub max_workers: usize,
    /// Fetch parallelism for analysis windows; `None` uses `max_workers`.
    pub analysis_workers: Option<usize>,
    /// Passed through to the segment fetcher.
    pub max_cache_size_mb: usize,
    pub enable_memory_preload: bool,
    /// Archives up to this many bytes are preloaded whole.
    pub max_preload_bytes: u64,
    /// Per network read; `None` waits indefinitely.
    #[serde(with = "optional_millis")]
    pub read_timeout: Option<Duration>,
    /// Archives found inside archives are opened this many levels deep.
    pub max_nested_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_workers: 40,
            analysis_workers: None,
            max_cache_size_mb: 128,
            enable_memory_preload: true,
            max_preload_bytes: 8 * 1024 * 1024 * 1024,
            read_timeout: None,
            max_nested_depth: 1,
        }
    }
}

impl DiscoveryConfig {
    pub fn streaming_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn analysis_workers(&self) -> usize {
        self.analysis_workers.unwrap_or(self.max_workers).max(1)
    }

    /// Whether an archive of `total_size` bytes should be preloaded.
    pub fn should_preload(&self, total_size: u64) -> bool {
        self.enable_memory_preload && total_size <= self.max_preload_bytes
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Filter function: return true to keep an entry, given its internal path.
pub type EntryFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Per-call options for discovery.
#[derive(Default)]
pub struct DiscoveryOptions {
    /// Entries rejected by the filter are skipped before segment mapping.
    pub filter: Option<EntryFilter>,
    /// Maximum number of entries to return.
    pub max_files: Option<usize>,
}

impl DiscoveryOptions {
    /// Keep only video, audio and subtitle files.
    pub fn media_only() -> Self {
        Self {
            filter: Some(Box::new(crate::naming::is_media_file)),
            max_files: None,
        }
    }

    pub(crate) fn accepts(&self, internal_path: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f(internal_path))
    }
}

impl fmt::Debug for DiscoveryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryOptions")
            .field("filter", &self.filter.is_some())
            .field("max_files", &self.max_files)
            .finish()
    }
}
