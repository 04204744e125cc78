//! Intersection of field spans with diff spans: which fields changed
//! and by how many bytes.

use std::collections::HashMap;

use serde::Serialize;

use binmap_core::TypeGroup;

use crate::spans::Span;

/// Per-field change summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// Field span offset
    pub offset: u64,
    /// Field span length
    pub length: u64,
    /// Field's semantic group
    pub group: TypeGroup,
    /// Whether any diff span touched this field
    pub changed: bool,
    /// Total overlap width with diff spans
    pub changed_bytes: u64,
}

/// Two-pointer sweep over sorted field and diff spans, accumulating
/// overlap widths per field path. Linear in the total span count.
pub fn intersect_spans(
    fields: &[Span],
    diffs: &[(u64, u64)],
) -> HashMap<String, FieldChange> {
    if fields.is_empty() {
        return HashMap::new();
    }

    let mut field_spans: Vec<&Span> = fields.iter().filter(|f| f.length > 0).collect();
    field_spans.sort_by_key(|f| f.offset);
    let mut diff_spans: Vec<(u64, u64)> = diffs
        .iter()
        .filter(|(_, len)| *len > 0)
        .map(|(start, len)| (*start, start + len))
        .collect();
    diff_spans.sort_by_key(|(start, _)| *start);

    let mut result: HashMap<String, FieldChange> = field_spans
        .iter()
        .map(|f| {
            (
                f.path.clone(),
                FieldChange {
                    offset: f.offset,
                    length: f.length,
                    group: f.group,
                    changed: false,
                    changed_bytes: 0,
                },
            )
        })
        .collect();

    let mut i = 0;
    let mut j = 0;
    while i < field_spans.len() && j < diff_spans.len() {
        let field = field_spans[i];
        let (field_start, field_end) = (field.offset, field.end());
        let (diff_start, diff_end) = diff_spans[j];

        if field_end <= diff_start {
            i += 1;
            continue;
        }
        if diff_end <= field_start {
            j += 1;
            continue;
        }

        let overlap = field_end.min(diff_end) - field_start.max(diff_start);
        if overlap > 0 {
            if let Some(entry) = result.get_mut(&field.path) {
                entry.changed = true;
                entry.changed_bytes += overlap;
            }
        }
        // Advance whichever span ends first
        if field_end <= diff_end {
            i += 1;
        } else {
            j += 1;
        }
    }

    result
}
