//! ArchiveDiscovery - from NZB parts to segment-mapped archive entries.
//!
//! One pass:
//! 1. drop PAR2 and other non-volume files, canonicalize part names and sort
//!    into archive order
//! 2. pick the first volume
//! 3. preload small archives into memory, stream the rest
//! 4. let the decoder list the entries
//! 5. map each entry's byte range to trimmed segments
//!
//! A failed preload is retried once through the streaming path. Progressive
//! discovery always streams so the caller can stop early. Nested discovery
//! repeats the progressive pass on archives found inside the archive.

use crate::config::{DiscoveryConfig, DiscoveryOptions};
use crate::decoder::{ArchiveDecoder, EntryLocation, RawEntry};
use crate::entry::ArchiveEntry;
use crate::error::{Result, StreamError};
use crate::fetcher::SegmentFetcher;
use crate::filesystem::{MemoryFilesystem, VirtualFilesystem, VolumeSource};
use crate::mapper::{map_range, map_volume_spans};
use crate::naming::is_par2_name;
use crate::preload::ParallelPreloader;
use crate::segment::{Part, PartSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives discovery passes. Holds no per-pass state, so one instance can
/// serve concurrent passes over different archives.
pub struct ArchiveDiscovery {
    fetcher: Arc<dyn SegmentFetcher>,
    decoder: Arc<dyn ArchiveDecoder>,
    config: Arc<DiscoveryConfig>,
}

struct PreparedArchive {
    parts: Arc<PartSet>,
    first_part: String,
}

impl ArchiveDiscovery {
    pub fn new(
        fetcher: Arc<dyn SegmentFetcher>,
        decoder: Arc<dyn ArchiveDecoder>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// List every entry of the archive formed by `parts`.
    pub async fn discover(&self, parts: Vec<Part>, cancel: &CancellationToken) -> Result<Vec<ArchiveEntry>> {
        self.discover_with(parts, &DiscoveryOptions::default(), cancel)
            .await
    }

    /// Like [`discover`](Self::discover), with a filter and a result limit.
    pub async fn discover_with(
        &self,
        parts: Vec<Part>,
        opts: &DiscoveryOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveEntry>> {
        let started = Instant::now();
        let archive = self.prepare(parts)?;
        let total_size = archive.parts.total_size();
        let preload = self.config.should_preload(total_size);

        info!(
            first_part = %archive.first_part,
            parts = archive.parts.len(),
            total_size,
            preload,
            "Starting archive analysis"
        );

        let raw = if preload {
            match self.decode_preloaded(&archive, cancel).await {
                Ok(raw) => raw,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(
                        first_part = %archive.first_part,
                        error = %e,
                        "Memory preload failed, falling back to streaming"
                    );
                    self.decode_streaming(&archive, cancel).await?
                }
            }
        } else {
            self.decode_streaming(&archive, cancel).await?
        };

        let mut entries = Vec::new();
        for entry in select_entries(&raw, opts) {
            entries.push(map_entry(entry, &archive.parts));
        }

        info!(
            first_part = %archive.first_part,
            files = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Archive analysis complete"
        );
        Ok(entries)
    }

    /// List entries, handing each one to `on_entry` as soon as it is mapped.
    ///
    /// Returning `false` from `on_entry` stops discovery; the entries seen so
    /// far, including the one that stopped it, are returned. Always streams.
    pub async fn discover_progressive<F>(
        &self,
        parts: Vec<Part>,
        mut on_entry: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveEntry>>
    where
        F: FnMut(&ArchiveEntry) -> bool,
    {
        let started = Instant::now();
        let archive = self.prepare(parts)?;

        info!(
            first_part = %archive.first_part,
            parts = archive.parts.len(),
            total_size = archive.parts.total_size(),
            "Starting progressive archive analysis"
        );

        let raw = self.decode_streaming(&archive, cancel).await?;
        let opts = DiscoveryOptions::default();

        let mut entries = Vec::new();
        for raw_entry in select_entries(&raw, &opts) {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            let entry = map_entry(raw_entry, &archive.parts);
            let keep_going = on_entry(&entry);
            entries.push(entry);
            if !keep_going {
                info!(
                    first_part = %archive.first_part,
                    files = entries.len(),
                    remaining = raw.len() - entries.len(),
                    "Progressive discovery stopped early"
                );
                break;
            }
        }

        debug!(
            files = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Progressive analysis finished"
        );
        Ok(entries)
    }

    fn prepare(&self, parts: Vec<Part>) -> Result<PreparedArchive> {
        let format = self.decoder.format();
        let input = parts.len();
        let parts: Vec<Part> = parts
            .into_iter()
            .filter(|p| !is_par2_name(&p.name) && format.matches(&p.name))
            .collect();
        if parts.len() != input {
            debug!(skipped = input - parts.len(), ?format, "Ignoring PAR2 and non-volume files");
        }
        if parts.is_empty() {
            return Err(StreamError::NoParts);
        }

        let parts = PartSet::new(format.canonicalize(parts));
        let first_part = format.first_part(&parts.names())?;

        Ok(PreparedArchive {
            parts: Arc::new(parts),
            first_part,
        })
    }

    /// Progressive discovery that also lists archives stored inside the
    /// archive, up to `max_nested_depth` levels down.
    ///
    /// Volumes of an inner archive are not handed to `on_entry`; once the
    /// outer listing is done, the inner archive's entries are, mapped onto
    /// the outer segments. An inner archive that fails to decode is skipped
    /// with a warning, and volumes found below the depth limit are dropped.
    pub async fn discover_nested<F>(
        &self,
        parts: Vec<Part>,
        mut on_entry: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveEntry>>
    where
        F: FnMut(&ArchiveEntry) -> bool,
    {
        let format = self.decoder.format();
        let is_volume = |entry: &ArchiveEntry| !entry.is_directory && format.matches(&entry.display_name);

        let mut found = Vec::new();
        let mut pending = parts;
        let mut depth = 0usize;

        loop {
            let mut inner_parts = Vec::new();
            let mut stopped = false;

            let listed = self
                .discover_progressive(
                    pending,
                    |entry| {
                        if !is_volume(entry) {
                            stopped = !on_entry(entry);
                            return !stopped;
                        }
                        if depth >= self.config.max_nested_depth {
                            warn!(file = %entry.internal_path, depth, "Archive nested too deep, skipping");
                        } else if !entry.is_complete() {
                            warn!(file = %entry.internal_path, "Inner archive volume is incomplete, skipping");
                        } else {
                            inner_parts.push(entry.to_part());
                        }
                        true
                    },
                    cancel,
                )
                .await;

            let listed = match listed {
                Ok(listed) => listed,
                Err(e) if depth == 0 || e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(depth, error = %e, "Failed to analyze nested archive");
                    break;
                }
            };
            found.extend(listed.into_iter().filter(|e| !is_volume(e)));

            if stopped || inner_parts.is_empty() {
                break;
            }
            depth += 1;
            info!(parts = inner_parts.len(), depth, "Analyzing nested archive");
            pending = inner_parts;
        }

        Ok(found)
    }

    async fn decode_preloaded(
        &self,
        archive: &PreparedArchive,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEntry>> {
        let preloader = ParallelPreloader::new(Arc::clone(&self.fetcher), Arc::clone(&self.config));
        let data = preloader.download_all(&archive.parts, cancel).await?;
        let source = Arc::new(MemoryFilesystem::new(Arc::clone(&archive.parts), data));
        self.decode(source, &archive.first_part, cancel).await
    }

    async fn decode_streaming(
        &self,
        archive: &PreparedArchive,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEntry>> {
        let source = Arc::new(VirtualFilesystem::new(
            Arc::clone(&archive.parts),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.config),
            cancel.clone(),
        ));
        self.decode(source, &archive.first_part, cancel).await
    }

    async fn decode(
        &self,
        source: Arc<dyn VolumeSource>,
        first_part: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEntry>> {
        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamError::Cancelled),
            decoded = self.decoder.decode(source, first_part) => decoded?,
        };

        if raw.iter().all(|e| e.is_directory) {
            return Err(StreamError::NoFilesFound);
        }
        debug!(first_part, entries = raw.len(), "Decoder listed archive");
        Ok(raw)
    }
}

/// Entries passing the filter, up to `max_files`.
fn select_entries<'a>(raw: &'a [RawEntry], opts: &'a DiscoveryOptions) -> impl Iterator<Item = &'a RawEntry> + 'a {
    raw.iter()
        .filter(|e| opts.accepts(&e.internal_path))
        .take(opts.max_files.unwrap_or(usize::MAX))
}

/// Resolve one decoder entry to its segments, warning on short coverage.
fn map_entry(raw: &RawEntry, parts: &PartSet) -> ArchiveEntry {
    if raw.is_directory {
        return ArchiveEntry::directory(raw.internal_path.clone());
    }

    let (segments, covered) = match &raw.location {
        EntryLocation::Logical { offset } => map_range(*offset, raw.size, parts.windows()),
        EntryLocation::Volumes(spans) => map_volume_spans(spans, parts),
    };

    if covered != raw.size {
        warn!(
            path = %raw.internal_path,
            expected = raw.size,
            covered,
            "Segment coverage mismatch for archive entry"
        );
    }

    ArchiveEntry::file(raw.internal_path.clone(), raw.size, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::VolumeSpan;
    use crate::mapper::total_length;
    use crate::naming::{is_video_file, ArchiveFormat};
    use crate::testing::{init_tracing, pattern, MemoryFetcher, ScriptedDecoder};

    const PART_SIZE: usize = 10_000;

    fn rar_parts(fetcher: &mut MemoryFetcher, names: &[&str]) -> Vec<Part> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| fetcher.add_part(name, &pattern(PART_SIZE + i), 1000))
            .collect()
    }

    fn streaming_config() -> DiscoveryConfig {
        DiscoveryConfig {
            enable_memory_preload: false,
            ..Default::default()
        }
    }

    fn spanning_entry(path: &str, first: &str, second: &str) -> RawEntry {
        RawEntry::in_volumes(
            path,
            vec![
                VolumeSpan::new(first, 9_000, 1_000),
                VolumeSpan::new(second, 0, 500),
            ],
        )
    }

    #[tokio::test]
    async fn test_discover_maps_spanning_entry() {
        init_tracing();
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part2.rar", "m.part1.rar"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![
                RawEntry::directory("Movie"),
                spanning_entry("Movie/movie.mkv", "m.part1.rar", "m.part2.rar"),
            ],
        );
        let decoder = Arc::new(decoder);
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), decoder.clone(), streaming_config());

        let entries = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory);
        assert!(entries[0].segments.is_empty());

        let movie = &entries[1];
        assert_eq!(movie.display_name, "movie.mkv");
        assert_eq!(movie.logical_size, 1_500);
        assert_eq!(total_length(&movie.segments), 1_500);
        assert!(movie.is_complete());
        // Tail of part 1 first, then head of part 2
        assert!(movie.segments[0].id.starts_with("m.part1.rar"));
        assert!(movie.segments.last().unwrap().id.starts_with("m.part2.rar"));
        assert_eq!(decoder.first_parts(), vec!["m.part1.rar".to_string()]);
    }

    #[tokio::test]
    async fn test_discover_logical_offsets() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["s.7z.002", "s.7z.001"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::SevenZip,
            vec![RawEntry::at_offset("s.mkv", 9_900, 200)],
        );
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), streaming_config());

        let entries = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries[0].covered_bytes, 200);
        assert!(entries[0].segments[0].id.starts_with("s.7z.001"));
    }

    #[tokio::test]
    async fn test_discover_preloads_small_archive() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let fetcher = Arc::new(fetcher);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![spanning_entry("movie.mkv", "m.part1.rar", "m.part2.rar")],
        )
        .with_probe(64);
        let discovery = ArchiveDiscovery::new(fetcher.clone(), Arc::new(decoder), DiscoveryConfig::default());

        let entries = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        // One whole-part reader per part, the probe is served from memory
        assert_eq!(fetcher.opens(), 2);
        assert!(fetcher
            .intervals()
            .iter()
            .all(|(_, interval)| interval.length() >= PART_SIZE as u64));
    }

    #[tokio::test]
    async fn test_preload_failure_falls_back_to_streaming() {
        init_tracing();
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let fetcher = Arc::new(fetcher);
        fetcher.fail_next(1);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![spanning_entry("movie.mkv", "m.part1.rar", "m.part2.rar")],
        )
        .with_probe(64);
        let decoder = Arc::new(decoder);
        let discovery = ArchiveDiscovery::new(fetcher.clone(), decoder.clone(), DiscoveryConfig::default());

        let entries = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(decoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_streaming_failure_is_fatal() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar"]);
        let fetcher = Arc::new(fetcher);
        fetcher.fail_next(usize::MAX);
        let decoder = ScriptedDecoder::new(ArchiveFormat::Rar, vec![RawEntry::at_offset("a.mkv", 0, 10)]).with_probe(16);
        let discovery = ArchiveDiscovery::new(fetcher, Arc::new(decoder), DiscoveryConfig::default());

        let err = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Transport(_)));
    }

    #[tokio::test]
    async fn test_progressive_stops_after_first_entry() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let raw = (0..10)
            .map(|i| RawEntry::at_offset(format!("file{}.mkv", i), i * 100, 100))
            .collect();
        let decoder = ScriptedDecoder::new(ArchiveFormat::Rar, raw);
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), DiscoveryConfig::default());

        let mut seen = 0;
        let entries = discovery
            .discover_progressive(
                parts,
                |_| {
                    seen += 1;
                    false
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(seen, 1);
        assert_eq!(entries[0].internal_path, "file0.mkv");
    }

    #[tokio::test]
    async fn test_progressive_never_preloads() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let fetcher = Arc::new(fetcher);
        let decoder = ScriptedDecoder::new(ArchiveFormat::Rar, vec![RawEntry::at_offset("a.mkv", 0, 10)]).with_probe(16);
        let discovery = ArchiveDiscovery::new(fetcher.clone(), Arc::new(decoder), DiscoveryConfig::default());

        let entries = discovery
            .discover_progressive(parts, |_| true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        // Only the probe window of the first part was fetched
        assert_eq!(fetcher.opens(), 1);
        assert_eq!(fetcher.intervals()[0].0, "m.part1.rar");
    }

    #[tokio::test]
    async fn test_filter_and_max_files() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.rar"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![
                RawEntry::at_offset("a.nfo", 0, 10),
                RawEntry::at_offset("a.mkv", 10, 10),
                RawEntry::at_offset("b.mkv", 20, 10),
                RawEntry::at_offset("c.mkv", 30, 10),
            ],
        );
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), streaming_config());

        let opts = DiscoveryOptions {
            max_files: Some(2),
            ..DiscoveryOptions::media_only()
        };
        let entries = discovery
            .discover_with(parts, &opts, &CancellationToken::new())
            .await
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.internal_path.as_str()).collect();
        assert_eq!(names, vec!["a.mkv", "b.mkv"]);
    }

    #[tokio::test]
    async fn test_short_coverage_is_returned() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.rar"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![RawEntry::in_volumes(
                "a.mkv",
                vec![
                    VolumeSpan::new("m.rar", 9_500, 500),
                    VolumeSpan::new("m.r00", 0, 500),
                ],
            )],
        );
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), streaming_config());

        let entries = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries[0].logical_size, 1_000);
        assert_eq!(entries[0].covered_bytes, 500);
        assert!(!entries[0].is_complete());
    }

    #[tokio::test]
    async fn test_errors() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let decoder = Arc::new(ScriptedDecoder::new(ArchiveFormat::Rar, vec![RawEntry::directory("d")]));
        let discovery = ArchiveDiscovery::new(fetcher.clone(), decoder, streaming_config());
        let cancel = CancellationToken::new();

        assert!(matches!(
            discovery.discover(Vec::new(), &cancel).await,
            Err(StreamError::NoParts)
        ));

        let par2_only = vec![Part::from_segment_sizes("m.par2", [("p", 10)])];
        assert!(matches!(
            discovery.discover(par2_only, &cancel).await,
            Err(StreamError::NoParts)
        ));

        let no_first = vec![
            Part::from_segment_sizes("m.part2.rar", [("a", 10)]),
            Part::from_segment_sizes("m.part3.rar", [("b", 10)]),
        ];
        assert!(matches!(
            discovery.discover(no_first, &cancel).await,
            Err(StreamError::NoFirstPart)
        ));

        let only_dirs = vec![Part::from_segment_sizes("m.rar", [("a", 10)])];
        assert!(matches!(
            discovery.discover(only_dirs, &cancel).await,
            Err(StreamError::NoFilesFound)
        ));
    }

    #[test]
    fn test_non_volume_files_left_out() {
        let mut fetcher = MemoryFetcher::new();
        let mut parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        parts.push(fetcher.add_part("m.nfo", &pattern(300), 1000));
        parts.push(fetcher.add_part("m.sfv", &pattern(40), 1000));
        parts.push(fetcher.add_part("m.vol00+01.par2", &pattern(500), 1000));
        let decoder = ScriptedDecoder::new(ArchiveFormat::Rar, vec![RawEntry::at_offset("a.mkv", 0, 10)]);
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), streaming_config());

        let archive = discovery.prepare(parts).unwrap();
        let names: Vec<&str> = archive
            .parts
            .windows()
            .iter()
            .map(|w| w.part.name.as_str())
            .collect();
        assert_eq!(names, vec!["m.part1.rar", "m.part2.rar"]);
        assert_eq!(archive.parts.total_size(), (2 * PART_SIZE + 1) as u64);

        let only_extras = vec![Part::from_segment_sizes("m.nfo", [("a", 10)])];
        assert!(matches!(discovery.prepare(only_extras), Err(StreamError::NoParts)));
    }

    #[tokio::test]
    async fn test_nested_archive_entries_mapped_onto_outer_segments() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![
                RawEntry::directory("Inner"),
                RawEntry::at_offset("Inner/inner.part1.rar", 0, 6_000),
                RawEntry::at_offset("Inner/inner.part2.rar", 6_000, 6_000),
                RawEntry::at_offset("readme.txt", 12_000, 100),
            ],
        )
        .with_nested(
            "inner.part1.rar",
            vec![
                RawEntry::in_volumes(
                    "movie.mkv",
                    vec![
                        VolumeSpan::new("inner.part1.rar", 100, 5_900),
                        VolumeSpan::new("inner.part2.rar", 0, 3_000),
                    ],
                ),
                RawEntry::at_offset("deeper.rar", 9_000, 100),
            ],
        );
        let decoder = Arc::new(decoder);
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), decoder.clone(), streaming_config());

        let mut seen = Vec::new();
        let entries = discovery
            .discover_nested(
                parts,
                |e| {
                    seen.push(e.internal_path.clone());
                    true
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(seen, vec!["Inner", "readme.txt", "movie.mkv"]);
        let paths: Vec<&str> = entries.iter().map(|e| e.internal_path.as_str()).collect();
        assert_eq!(paths, vec!["Inner", "readme.txt", "movie.mkv"]);
        assert_eq!(
            decoder.first_parts(),
            vec!["m.part1.rar".to_string(), "inner.part1.rar".to_string()]
        );

        let movie = &entries[2];
        assert!(movie.is_complete());
        assert_eq!(total_length(&movie.segments), 8_900);
        assert_eq!(movie.segments[0].id, "m.part1.rar-0@test");
        assert_eq!(movie.segments[0].start_offset, 100);
    }

    #[tokio::test]
    async fn test_nested_discovery_stops_with_caller() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.rar"]);
        let decoder = ScriptedDecoder::new(
            ArchiveFormat::Rar,
            vec![
                RawEntry::at_offset("movie.mkv", 0, 100),
                RawEntry::at_offset("inner.rar", 100, 1_000),
            ],
        );
        let decoder = Arc::new(decoder);
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), decoder.clone(), streaming_config());

        let entries = discovery
            .discover_nested(parts, |e| !is_video_file(&e.internal_path), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(decoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_decoder_error_surfaces() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.rar"]);
        let decoder = ScriptedDecoder::failing(ArchiveFormat::Rar, "compressed entries are not streamable");
        let discovery = ArchiveDiscovery::new(Arc::new(fetcher), Arc::new(decoder), streaming_config());

        let err = discovery
            .discover(parts, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Decoder(_)));
        assert!(err.to_string().starts_with("Archive unreadable or unsupported"));
    }

    #[tokio::test]
    async fn test_cancelled_pass() {
        let mut fetcher = MemoryFetcher::new();
        let parts = rar_parts(&mut fetcher, &["m.part1.rar", "m.part2.rar"]);
        let fetcher = Arc::new(fetcher);
        let decoder = ScriptedDecoder::new(ArchiveFormat::Rar, vec![RawEntry::at_offset("a.mkv", 0, 10)]).with_probe(16);
        let discovery = ArchiveDiscovery::new(fetcher.clone(), Arc::new(decoder), DiscoveryConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = discovery.discover(parts, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.opens(), 0);
    }
}
