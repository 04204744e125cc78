//! Viewport-windowed span projection for large record streams.
//!
//! A full span index over millions of records is wasteful when the
//! viewer shows a few hundred bytes. This manager keeps a compact
//! `(offset, size, record_index)` array built once, binary-searches
//! the first candidate record for a byte window, and expands only the
//! intersecting records into field spans. Rebuild cost is O(k) in the
//! records inside the window.

use tracing::trace;

use binmap_parse::ParsedRecord;

use crate::spans::{spans_from_leaves, Span, SpanIndex};

/// Lightweight record location info.
#[derive(Debug, Clone, Copy)]
struct RecordOffset {
    offset: u64,
    size: u64,
    record_index: usize,
}

/// Lazily projects record fields into spans for the current viewport.
pub struct ViewportSpanManager {
    records: Vec<ParsedRecord>,
    offsets: Vec<RecordOffset>,
    window: Option<(u64, u64)>,
    index: Option<SpanIndex>,
    rebuilds: usize,
}

impl ViewportSpanManager {
    /// Take ownership of a parsed record list and build the offset
    /// index. Records with a record-level error are not indexed.
    pub fn new(records: Vec<ParsedRecord>) -> Self {
        let offsets = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.error.is_none())
            .map(|(i, r)| RecordOffset {
                offset: r.offset,
                size: r.size,
                record_index: i,
            })
            .collect();
        Self {
            records,
            offsets,
            window: None,
            index: None,
            rebuilds: 0,
        }
    }

    /// Update the byte window `[start, end)` and return the span
    /// index for it. An unchanged window returns the cached index
    /// without rebuilding.
    pub fn update_viewport(&mut self, start: u64, end: u64) -> Option<&SpanIndex> {
        if self.window == Some((start, end)) {
            return self.index.as_ref();
        }

        let mut spans: Vec<Span> = Vec::new();
        for record_index in self.records_in_range(start, end) {
            let record = &self.records[record_index];
            spans.extend(spans_from_leaves(&record.leaves));
        }
        trace!(start, end, spans = spans.len(), "viewport spans rebuilt");

        self.index = (!spans.is_empty()).then(|| SpanIndex::new(spans));
        self.window = Some((start, end));
        self.rebuilds += 1;
        self.index.as_ref()
    }

    /// Cached span index for the current window.
    pub fn span_index(&self) -> Option<&SpanIndex> {
        self.index.as_ref()
    }

    /// Number of indexed (non-error) records.
    pub fn record_count(&self) -> usize {
        self.offsets.len()
    }

    /// How many times a window change forced a rebuild.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Indices of records whose `[offset, offset+size)` intersects
    /// `[start, end)`.
    fn records_in_range(&self, start: u64, end: u64) -> Vec<usize> {
        if self.offsets.is_empty() || start >= end {
            return Vec::new();
        }
        // First candidate: the last record starting at or before `start`
        let first = self
            .offsets
            .partition_point(|r| r.offset <= start)
            .saturating_sub(1);

        let mut hits = Vec::new();
        for record in &self.offsets[first..] {
            if record.offset >= end {
                break;
            }
            if record.offset < end && record.offset + record.size > start {
                hits.push(record.record_index);
            }
        }
        hits
    }
}
