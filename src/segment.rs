//! Segment catalog - article segments per archive part.
//!
//! A [`Part`] is one NZB file entry (one archive volume). Its bytes are the
//! in-order concatenation of its [`Segment`]s. A [`PartSet`] is the ordered
//! list of parts that together form one logical archive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Inclusive byte interval, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadInterval {
    pub start: u64,
    pub end: u64,
}

impl ReadInterval {
    pub fn length(&self) -> u64 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }
}

/// One article's contribution to a part.
///
/// `start_offset`/`end_offset` address bytes inside the article's decoded
/// payload (inclusive). An untrimmed segment spans `0..=declared_size - 1`;
/// the mapper narrows them to the bytes actually needed. Where the segment
/// sits inside its part follows from the lengths of the segments before it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub start_offset: u64,
    pub end_offset: u64,
    pub declared_size: u64,
}

impl Segment {
    /// A whole, untrimmed segment.
    pub fn new(id: impl Into<String>, declared_size: u64) -> Self {
        Self {
            id: id.into(),
            start_offset: 0,
            end_offset: declared_size.saturating_sub(1),
            declared_size,
        }
    }

    /// Number of bytes this segment contributes.
    pub fn length(&self) -> u64 {
        if self.end_offset >= self.start_offset && self.declared_size > 0 {
            self.end_offset - self.start_offset + 1
        } else {
            0
        }
    }

    /// Copy with the start moved forward by `padding` bytes.
    pub fn pad_start(&self, padding: u64) -> Self {
        Self {
            start_offset: self.start_offset + padding,
            ..self.clone()
        }
    }

    /// Copy with the end moved backward by `padding` bytes.
    pub fn pad_end(&self, padding: u64) -> Self {
        Self {
            end_offset: self.end_offset.saturating_sub(padding),
            ..self.clone()
        }
    }
}

/// One archive volume as described by the NZB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub size: u64,
    pub segments: Vec<Segment>,
}

impl Part {
    /// Build a part from its ordered segments; the size is their summed length.
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> Self {
        let size = segments.iter().map(Segment::length).sum();
        Self {
            name: name.into(),
            size,
            segments,
        }
    }

    /// Build a part from `(message id, decoded size)` pairs in article order.
    pub fn from_segment_sizes<I, S>(name: impl Into<String>, sizes: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let segments = sizes
            .into_iter()
            .map(|(id, size)| Segment::new(id, size))
            .collect();
        Self::new(name, segments)
    }

    /// Copy of this part under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A part's byte range inside the logical concatenation of a [`PartSet`].
///
/// `absolute_end` is exclusive.
#[derive(Debug, Clone)]
pub struct PartWindow {
    pub part: Arc<Part>,
    pub absolute_start: u64,
    pub absolute_end: u64,
}

/// Ordered parts forming one logical archive.
///
/// Concatenating the parts in order reproduces the archive byte stream.
#[derive(Debug, Clone)]
pub struct PartSet {
    parts: Vec<Arc<Part>>,
    windows: Vec<PartWindow>,
    /// Full name and base name to part index; the first part wins a clash.
    index: HashMap<String, usize>,
    total_size: u64,
}

impl PartSet {
    /// Wrap parts that are already in archive order.
    pub fn new(parts: Vec<Part>) -> Self {
        let parts: Vec<Arc<Part>> = parts.into_iter().map(Arc::new).collect();
        let windows = Self::calculate_windows(&parts);
        let total_size = windows.last().map_or(0, |w| w.absolute_end);

        let mut index = HashMap::with_capacity(parts.len() * 2);
        for (i, part) in parts.iter().enumerate() {
            index.entry(part.name.clone()).or_insert(i);
            index.entry(base_name(&part.name).to_string()).or_insert(i);
        }

        Self {
            parts,
            windows,
            index,
            total_size,
        }
    }

    fn calculate_windows(parts: &[Arc<Part>]) -> Vec<PartWindow> {
        let mut windows = Vec::with_capacity(parts.len());
        let mut offset = 0u64;

        for part in parts {
            windows.push(PartWindow {
                part: Arc::clone(part),
                absolute_start: offset,
                absolute_end: offset + part.size,
            });
            offset += part.size;
        }

        windows
    }

    pub fn parts(&self) -> &[Arc<Part>] {
        &self.parts
    }

    pub fn windows(&self) -> &[PartWindow] {
        &self.windows
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.name.clone()).collect()
    }

    /// Look a part up by name, verbatim first and then by base name.
    pub fn find(&self, name: &str) -> Option<&Arc<Part>> {
        let name = clean_name(name);
        self.index
            .get(name)
            .or_else(|| self.index.get(base_name(name)))
            .map(|&i| &self.parts[i])
    }

    /// Find the window holding `offset` using binary search.
    pub fn find_window_index(&self, offset: u64) -> Option<usize> {
        if offset >= self.total_size {
            return None;
        }
        let idx = self.windows.partition_point(|w| w.absolute_end <= offset);
        (idx < self.windows.len()).then_some(idx)
    }
}

/// Last path component, for either separator.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn clean_name(name: &str) -> &str {
    let mut name = name.trim();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name
}
