//! Volume naming - canonical part names, archive order and first part.
//!
//! Releases name their volumes inconsistently (`Movie.part01.rar`,
//! `movie.r00`, `Movie.7z.001`, obfuscated bases that differ per part). Before
//! a decoder can walk the volumes, every part is renamed to one base name plus
//! a normalized suffix and the parts are sorted by part number.
//!
//! Recognized schemes:
//! - RAR: `.partN.rar`, plain `.rar` followed by `.r00`, `.r01`, and legacy
//!   numeric `.001`, `.002`.
//! - 7z: plain `.7z`, or `.7z.001`, `.7z.002`.

use crate::error::{Result, StreamError};
use crate::segment::{base_name, Part};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Sort key for names that follow no recognized scheme.
pub const UNKNOWN_PART: u32 = 999_999;

static RAR_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)\.part(\d+)\.rar$").expect("valid regex"));
static RAR_R: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)\.r(\d+)$").expect("valid regex"));
static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.(\d+)$").expect("valid regex"));
static SZ_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)\.7z$").expect("valid regex"));
static SZ_MULTI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)\.7z\.(\d+)$").expect("valid regex"));

/// Container format, as far as volume naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Rar,
    SevenZip,
}

/// Capture `(base, number)` from a two-group pattern.
fn captures<'a>(re: &Regex, name: &'a str) -> Option<(&'a str, &'a str)> {
    let caps = re.captures(name)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// File extension including the dot, or empty.
fn extension(name: &str) -> &str {
    let base = base_name(name);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

fn strip_extension(name: &str) -> &str {
    &name[..name.len() - extension(name).len()]
}

fn strip_leading_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

impl ArchiveFormat {
    /// Guess the format from part names; `None` when nothing looks like a volume.
    pub fn detect<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        let mut rar = 0usize;
        let mut seven_zip = 0usize;
        for name in names {
            let name = name.as_ref();
            if is_7z_name(name) {
                seven_zip += 1;
            } else if is_rar_name(name) {
                rar += 1;
            }
        }

        match (rar, seven_zip) {
            (0, 0) => None,
            (r, s) if s > r => Some(Self::SevenZip),
            _ => Some(Self::Rar),
        }
    }

    /// Whether `name` looks like a volume of this format.
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::Rar => is_rar_name(name) && !is_7z_name(name),
            Self::SevenZip => is_7z_name(name),
        }
    }

    /// Name without its volume suffix.
    pub fn base_name(self, name: &str) -> String {
        let caps = match self {
            Self::Rar => RAR_PART
                .captures(name)
                .or_else(|| RAR_R.captures(name))
                .or_else(|| NUMERIC.captures(name)),
            Self::SevenZip => SZ_MULTI.captures(name).or_else(|| SZ_SINGLE.captures(name)),
        };
        match caps.and_then(|c| c.get(1)) {
            Some(base) => base.as_str().to_string(),
            None => strip_extension(name).to_string(),
        }
    }

    /// Normalized volume suffix, e.g. `.part3.rar` for `x.part003.rar`.
    pub fn part_suffix(self, name: &str) -> String {
        match self {
            Self::Rar => {
                if let Some((_, n)) = captures(&RAR_PART, name) {
                    format!(".part{}.rar", strip_leading_zeros(n))
                } else if let Some((_, n)) = captures(&RAR_R, name) {
                    format!(".r{}", n)
                } else if let Some((_, n)) = captures(&NUMERIC, name) {
                    format!(".{}", n)
                } else {
                    extension(name).to_string()
                }
            }
            Self::SevenZip => {
                if let Some((_, n)) = captures(&SZ_MULTI, name) {
                    format!(".7z.{}", n)
                } else if SZ_SINGLE.is_match(name) {
                    ".7z".to_string()
                } else {
                    extension(name).to_string()
                }
            }
        }
    }

    /// Position of a volume in archive order; [`UNKNOWN_PART`] sorts last.
    pub fn part_number(self, name: &str) -> u32 {
        match self {
            Self::Rar => {
                if let Some((_, n)) = captures(&RAR_PART, name) {
                    parse_number(n).unwrap_or(UNKNOWN_PART)
                } else if name.to_lowercase().ends_with(".rar") {
                    0
                } else if let Some((_, n)) = captures(&RAR_R, name) {
                    // .r00 follows the plain .rar volume
                    parse_number(n).map_or(UNKNOWN_PART, |n| n + 1)
                } else if let Some((_, n)) = captures(&NUMERIC, name) {
                    parse_number(n).unwrap_or(UNKNOWN_PART)
                } else {
                    UNKNOWN_PART
                }
            }
            Self::SevenZip => {
                if let Some((_, n)) = captures(&SZ_MULTI, name) {
                    parse_number(n).unwrap_or(UNKNOWN_PART)
                } else if SZ_SINGLE.is_match(name) {
                    0
                } else {
                    UNKNOWN_PART
                }
            }
        }
    }

    /// Rename every part to the first part's base name and sort by part number.
    ///
    /// The sort is stable, so parts sharing a number keep their input order.
    pub fn canonicalize(self, parts: Vec<Part>) -> Vec<Part> {
        let Some(first) = parts.first() else {
            return parts;
        };
        let base = self.base_name(&first.name);
        trace!(base = %base, parts = parts.len(), "Canonicalizing part names");

        let mut numbered: Vec<(u32, Part)> = parts
            .into_iter()
            .map(|part| {
                let name = format!("{}{}", base, self.part_suffix(&part.name));
                let number = self.part_number(&name);
                let renamed = if name == part.name { part } else { part.renamed(name) };
                (number, renamed)
            })
            .collect();

        numbered.sort_by_key(|(number, _)| *number);
        numbered.into_iter().map(|(_, part)| part).collect()
    }

    /// Pick the volume a decoder should start from.
    ///
    /// Plain archive extensions beat part-numbered ones, which beat the
    /// legacy `.r00`/`.001` schemes; ties go to the lexicographically first
    /// name. A single part is always its own first part.
    pub fn first_part<S: AsRef<str>>(self, names: &[S]) -> Result<String> {
        match names {
            [] => return Err(StreamError::NoParts),
            [only] => return Ok(only.as_ref().to_string()),
            _ => {}
        }

        let mut best: Option<(u8, &str)> = None;
        for name in names.iter().map(AsRef::as_ref) {
            if self.zero_based_part(name) != Some(0) {
                continue;
            }
            let candidate = (self.priority(name), name);
            if best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        }

        if let Some((priority, name)) = best {
            debug!(filename = name, priority, "Selected first archive part");
            return Ok(name.to_string());
        }

        // 7z splits may start at .7z.001 with no .7z volume at all
        if self == Self::SevenZip {
            let fallback = names
                .iter()
                .map(AsRef::as_ref)
                .filter(|n| captures(&SZ_MULTI, n).and_then(|(_, d)| parse_number(d)) == Some(1))
                .min();
            if let Some(name) = fallback {
                debug!(filename = name, "Selected first 7z split");
                return Ok(name.to_string());
            }
        }

        Err(StreamError::NoFirstPart)
    }

    /// Zero-based volume index implied by the name, `None` if unrecognized.
    fn zero_based_part(self, name: &str) -> Option<u32> {
        match self {
            Self::Rar => {
                if let Some((_, n)) = captures(&RAR_PART, name) {
                    parse_number(n).map(|n| n.saturating_sub(1))
                } else if name.to_lowercase().ends_with(".rar") {
                    Some(0)
                } else if let Some((_, n)) = captures(&RAR_R, name) {
                    parse_number(n)
                } else if let Some((_, n)) = captures(&NUMERIC, name) {
                    parse_number(n).map(|n| n.saturating_sub(1))
                } else {
                    None
                }
            }
            Self::SevenZip => match self.part_number(name) {
                UNKNOWN_PART => None,
                n => Some(n),
            },
        }
    }

    /// Lower is preferred.
    fn priority(self, name: &str) -> u8 {
        match self {
            Self::Rar => {
                let lower = name.to_lowercase();
                if RAR_PART.is_match(name) {
                    2
                } else if lower.ends_with(".rar") {
                    1
                } else if RAR_R.is_match(name) {
                    3
                } else if NUMERIC.is_match(name) {
                    4
                } else {
                    5
                }
            }
            Self::SevenZip => {
                if SZ_MULTI.is_match(name) {
                    2
                } else {
                    1
                }
            }
        }
    }
}

pub fn is_rar_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".rar") || RAR_R.is_match(name) || NUMERIC.is_match(name)
}

pub fn is_7z_name(name: &str) -> bool {
    SZ_SINGLE.is_match(name) || SZ_MULTI.is_match(name)
}

pub fn is_par2_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".par2")
}

/// NZB files sorted into archive volumes, PAR2 repair files and the rest.
#[derive(Debug, Default)]
pub struct ArchiveSplit {
    pub format: Option<ArchiveFormat>,
    pub archive_parts: Vec<Part>,
    pub par2_parts: Vec<Part>,
    pub other_parts: Vec<Part>,
}

/// Separate the volumes of the dominant archive format from everything else.
pub fn split_archive_parts(parts: Vec<Part>) -> ArchiveSplit {
    let (par2_parts, rest): (Vec<Part>, Vec<Part>) =
        parts.into_iter().partition(|p| is_par2_name(&p.name));

    let names: Vec<&str> = rest.iter().map(|p| p.name.as_str()).collect();
    let format = ArchiveFormat::detect(&names);

    let (archive_parts, other_parts) = match format {
        Some(format) => rest.into_iter().partition(|p| format.matches(&p.name)),
        None => (Vec::new(), rest),
    };

    ArchiveSplit {
        format,
        archive_parts,
        par2_parts,
        other_parts,
    }
}

fn lower_extension(name: &str) -> String {
    extension(name).to_lowercase()
}

/// Video container extensions a player can start on.
pub fn is_video_file(name: &str) -> bool {
    matches!(
        lower_extension(name).as_str(),
        ".mkv" | ".mp4" | ".avi" | ".mov" | ".wmv" | ".flv" | ".webm" | ".m4v" | ".mpg" | ".mpeg"
            | ".m2ts" | ".ts" | ".vob" | ".ogv"
    )
}

/// Video, audio and subtitle extensions worth exposing from an archive.
pub fn is_media_file(name: &str) -> bool {
    matches!(
        lower_extension(name).as_str(),
        ".mkv" | ".mp4" | ".avi" | ".mov" | ".wmv" | ".flv" | ".webm" | ".m4v" | ".mpg" | ".mpeg"
            | ".ts" | ".m2ts" | ".mp3" | ".flac" | ".aac" | ".ogg" | ".wav" | ".wma" | ".m4a"
            | ".srt" | ".ass" | ".ssa" | ".sub" | ".idx"
    )
}
