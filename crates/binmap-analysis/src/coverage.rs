//! Coverage: partition a file's byte range into mapped spans and
//! unmapped gaps.

use serde::Serialize;

use binmap_parse::ParsedField;

/// One covered range, attributed to the leaf that mapped it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoveredSpan {
    /// Start offset, clipped to the file
    pub offset: u64,
    /// Clipped length
    pub length: u64,
    /// Path of the mapping leaf
    pub path: String,
}

/// Compute `(covered, unmapped)` over `[0, file_size)`.
///
/// Covered spans are the non-empty leaves clipped to the file and
/// sorted by offset (one entry per leaf, overlaps preserved).
/// Unmapped gaps are the complement of the merged covered ranges;
/// together they partition the file. The merge is idempotent and
/// needs no prior normalization.
pub fn compute_coverage(
    leaves: &[ParsedField],
    file_size: u64,
) -> (Vec<CoveredSpan>, Vec<(u64, u64)>) {
    let mut covered: Vec<CoveredSpan> = Vec::new();
    for leaf in leaves {
        if leaf.length == 0 {
            continue;
        }
        let start = leaf.offset.min(file_size);
        let end = leaf.end().min(file_size);
        if end <= start {
            continue;
        }
        covered.push(CoveredSpan {
            offset: start,
            length: end - start,
            path: leaf.path.clone(),
        });
    }
    covered.sort_by_key(|c| c.offset);

    // Merge overlapping covered ranges, ignoring attribution
    let mut merged: Vec<(u64, u64)> = Vec::new();
    for c in &covered {
        let end = c.offset + c.length;
        match merged.last_mut() {
            Some((_, prev_end)) if c.offset <= *prev_end => {
                *prev_end = (*prev_end).max(end);
            }
            _ => merged.push((c.offset, end)),
        }
    }

    // Gaps are the complement within [0, file_size)
    let mut unmapped = Vec::new();
    let mut cursor = 0u64;
    for (start, end) in merged {
        if start > cursor {
            let gap_end = start.min(file_size);
            if gap_end > cursor {
                unmapped.push((cursor, gap_end - cursor));
            }
        }
        cursor = cursor.max(end);
    }
    if cursor < file_size {
        unmapped.push((cursor, file_size - cursor));
    }

    (covered, unmapped)
}
