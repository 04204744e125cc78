//! binmap-analysis
//!
//! The indexes a viewer needs on top of a parse: span point-queries
//! by byte offset, coverage/gap partitioning, pair and N-way byte
//! diffing, field-vs-diff intersection, windowed span projection for
//! huge record streams, forward search, and the numeric inspector.

pub mod coverage;
pub mod diff;
pub mod frequency;
pub mod inspect;
pub mod intersect;
pub mod search;
pub mod spans;
pub mod viewport;

pub use coverage::{compute_coverage, CoveredSpan};
pub use diff::{compute_diff_spans, diff_stats, DiffIndex, DiffStats, SearchSpanIndex};
pub use frequency::{compute_frequency_map, freq_at, FrequencyStats};
pub use inspect::{ascii_preview, c_string_guess, inspect_numbers, NumCell};
pub use intersect::{intersect_spans, FieldChange};
pub use search::{find_bytes, find_text};
pub use spans::{build_span_index, spans_from_leaves, Span, SpanIndex};
pub use viewport::ViewportSpanManager;

/// Default chunk size for the sweeping engines (diff, frequency,
/// search).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
