//! Byte-level diffing between two readers.
//!
//! The sweep compares in chunks but keeps one open range across chunk
//! boundaries so a change straddling a boundary merges into a single
//! span. Bytes beyond the shorter reader count as changed.

use serde::Serialize;
use tracing::debug;

use binmap_core::{PagedReader, Result};

/// Compute merged contiguous changed ranges `(offset, length)`
/// covering every position where the readers differ.
///
/// The result is independent of `chunk_size` (any value ≥ 1 yields
/// identical spans).
pub fn compute_diff_spans(
    reader_a: &PagedReader,
    reader_b: &PagedReader,
    chunk_size: usize,
) -> Result<Vec<(u64, u64)>> {
    let chunk_size = chunk_size.max(1);
    let size_a = reader_a.size();
    let size_b = reader_b.size();
    let total = size_a.max(size_b);
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut spans: Vec<(u64, u64)> = Vec::new();
    let mut open_start: Option<u64> = None;
    let mut offset = 0u64;

    while offset < total {
        let to_read = chunk_size.min((total - offset) as usize);
        let chunk_a = if offset < size_a {
            reader_a.read(offset, to_read)?
        } else {
            Vec::new()
        };
        let chunk_b = if offset < size_b {
            reader_b.read(offset, to_read)?
        } else {
            Vec::new()
        };
        let common = chunk_a.len().min(chunk_b.len());

        for i in 0..common {
            if chunk_a[i] != chunk_b[i] {
                if open_start.is_none() {
                    open_start = Some(offset + i as u64);
                }
            } else if let Some(start) = open_start.take() {
                spans.push((start, offset + i as u64 - start));
            }
        }

        // Tail beyond the shorter reader counts as changed; the span
        // stays open so it merges across chunks and closes at EOF
        if chunk_a.len() != chunk_b.len() && open_start.is_none() {
            open_start = Some(offset + common as u64);
        }

        offset += to_read as u64;
    }

    if let Some(start) = open_start {
        spans.push((start, total - start));
    }

    Ok(merge_spans(spans))
}

/// Merge overlapping or touching spans (defensive against ranges
/// split at chunk boundaries).
fn merge_spans(spans: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    let mut merged: Vec<(u64, u64)> = Vec::new();
    for (start, length) in spans {
        if length == 0 {
            continue;
        }
        match merged.last_mut() {
            Some((prev_start, prev_length)) if start <= *prev_start + *prev_length => {
                let new_end = (*prev_start + *prev_length).max(start + length);
                *prev_length = new_end - *prev_start;
            }
            _ => merged.push((start, length)),
        }
    }
    merged
}

/// Summary statistics over a diff span list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffStats {
    pub size_a: u64,
    pub size_b: u64,
    pub max_size: u64,
    pub changed_bytes: u64,
    pub changed_percent: f64,
}

/// Stats for a span list produced by [`compute_diff_spans`].
pub fn diff_stats(
    reader_a: &PagedReader,
    reader_b: &PagedReader,
    spans: &[(u64, u64)],
) -> DiffStats {
    let size_a = reader_a.size();
    let size_b = reader_b.size();
    let max_size = size_a.max(size_b);
    let changed_bytes: u64 = spans.iter().map(|(_, len)| len).sum();
    let changed_percent = if max_size > 0 {
        changed_bytes as f64 / max_size as f64 * 100.0
    } else {
        0.0
    };
    debug!(changed_bytes, max_size, "diff stats computed");
    DiffStats {
        size_a,
        size_b,
        max_size,
        changed_bytes,
        changed_percent,
    }
}

/// Merged, binary-searchable membership index over diff spans.
#[derive(Debug, Default)]
pub struct DiffIndex {
    // [start, end), merged and non-overlapping
    spans: Vec<(u64, u64)>,
    starts: Vec<u64>,
}

impl DiffIndex {
    /// Build from `(offset, length)` spans in any order.
    pub fn new(spans: &[(u64, u64)]) -> Self {
        let mut sorted: Vec<(u64, u64)> = spans.iter().copied().filter(|(_, l)| *l > 0).collect();
        sorted.sort_by_key(|(s, _)| *s);
        let mut merged: Vec<(u64, u64)> = Vec::new();
        for (start, length) in sorted {
            let end = start + length;
            match merged.last_mut() {
                Some((_, prev_end)) if start <= *prev_end => {
                    *prev_end = (*prev_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        let starts = merged.iter().map(|(s, _)| *s).collect();
        Self {
            spans: merged,
            starts,
        }
    }

    /// Whether `offset` falls inside any diff span.
    pub fn contains(&self, offset: u64) -> bool {
        let i = self.starts.partition_point(|&s| s <= offset);
        if i == 0 {
            return false;
        }
        let (start, end) = self.spans[i - 1];
        offset >= start && offset < end
    }
}

/// Index over labeled `(offset, length, role)` spans, e.g. a search
/// hit with its length and payload portions. Roles differ, so spans
/// are never merged; point queries return the owning role.
#[derive(Debug, Default)]
pub struct SearchSpanIndex {
    spans: Vec<(u64, u64, String)>, // (start, end, role)
    starts: Vec<u64>,
}

impl SearchSpanIndex {
    /// Build from `(offset, length, role)` triples in any order.
    pub fn new(spans: Vec<(u64, u64, String)>) -> Self {
        let mut entries: Vec<(u64, u64, String)> = spans
            .into_iter()
            .filter(|(_, len, _)| *len > 0)
            .map(|(start, len, role)| (start, start + len, role))
            .collect();
        entries.sort_by_key(|(s, _, _)| *s);
        let starts = entries.iter().map(|(s, _, _)| *s).collect();
        Self {
            spans: entries,
            starts,
        }
    }

    /// Role of the span owning `offset`, or `None`.
    pub fn role_at(&self, offset: u64) -> Option<&str> {
        let i = self.starts.partition_point(|&s| s <= offset);
        if i == 0 {
            return None;
        }
        let (start, end, role) = &self.spans[i - 1];
        (offset >= *start && offset < *end).then_some(role.as_str())
    }
}
