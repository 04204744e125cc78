//! Leaf spans and the byte-offset point-query index.

use serde::Serialize;

use binmap_core::{Endian, EndianSource, TypeGroup};
use binmap_parse::ParsedField;

/// Projection of one parsed leaf, the unit of byte colorization.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    /// Absolute file offset
    pub offset: u64,
    /// Byte length (always > 0 once indexed)
    pub length: u64,
    /// Leaf path
    pub path: String,
    /// Semantic group for coloring
    pub group: TypeGroup,
    /// Effective endianness of the leaf, when endian-sensitive
    pub endian: Option<Endian>,
    /// Provenance of the effective endianness
    pub endian_source: Option<EndianSource>,
    /// Grammar color override
    pub color: Option<String>,
}

impl Span {
    /// Offset one past the end of the span.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Project parsed leaves into spans. Only leaves that consumed bytes
/// produce one.
pub fn spans_from_leaves(leaves: &[ParsedField]) -> Vec<Span> {
    leaves
        .iter()
        .filter(|leaf| leaf.length > 0)
        .map(|leaf| Span {
            offset: leaf.offset,
            length: leaf.length,
            path: leaf.path.clone(),
            group: leaf.group(),
            endian: leaf.endian,
            endian_source: leaf.endian_source,
            color: leaf.color.clone(),
        })
        .collect()
}

/// Project leaves and index them in one step.
pub fn build_span_index(leaves: &[ParsedField]) -> SpanIndex {
    SpanIndex::new(spans_from_leaves(leaves))
}

/// Sorted span index with a packed `starts` array for binary-search
/// point queries. No allocation per query.
#[derive(Debug, Default)]
pub struct SpanIndex {
    spans: Vec<Span>,
    starts: Vec<u64>,
}

impl SpanIndex {
    /// Build an index. Zero-length spans are dropped; the rest are
    /// sorted by offset (stable, so document order breaks ties).
    pub fn new(mut spans: Vec<Span>) -> Self {
        spans.retain(|s| s.length > 0);
        spans.sort_by_key(|s| s.offset);
        let starts = spans.iter().map(|s| s.offset).collect();
        Self { spans, starts }
    }

    /// The span owning `offset`, if any. With overlapping spans the
    /// latest-starting candidate at or before `offset` is checked.
    pub fn find(&self, offset: u64) -> Option<&Span> {
        let i = self.starts.partition_point(|&s| s <= offset);
        if i == 0 {
            return None;
        }
        let span = &self.spans[i - 1];
        (offset >= span.offset && offset < span.end()).then_some(span)
    }

    /// Indexed spans in offset order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of indexed spans.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the index holds no spans.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
