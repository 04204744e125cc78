//! Cross-file frequency maps: per-byte counts of snapshots that
//! differ from a baseline.

use serde::Serialize;

use binmap_core::{PagedReader, Result};

/// Summary of a frequency sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyStats {
    /// Number of snapshots compared
    pub snapshots: usize,
    /// Length of the counts array (`max` of all sizes)
    pub max_size: u64,
    /// Positions where at least one snapshot differs
    pub union_changed: u64,
    /// `union_changed / max_size`
    pub mean_diff_rate: f64,
}

/// Compute per-byte change counts across snapshots vs. a baseline.
///
/// `counts[i]` is how many snapshots differ from the baseline at
/// position `i`, saturating at `u16::MAX`. Positions past any
/// reader's end count as differing for that reader. The counts array
/// spans `max(sizes)` bytes.
pub fn compute_frequency_map(
    baseline: &PagedReader,
    snapshots: &[&PagedReader],
    chunk_size: usize,
) -> Result<(Vec<u16>, FrequencyStats)> {
    let chunk_size = chunk_size.max(1);
    let n = snapshots.len();
    let size_a = baseline.size();
    let max_size = snapshots
        .iter()
        .map(|r| r.size())
        .fold(size_a, u64::max);

    let mut counts = vec![0u16; max_size as usize];
    if n == 0 || max_size == 0 {
        return Ok((
            counts,
            FrequencyStats {
                snapshots: n,
                max_size,
                union_changed: 0,
                mean_diff_rate: 0.0,
            },
        ));
    }

    let mut union_changed = 0u64;
    let mut offset = 0u64;
    while offset < max_size {
        let to_read = chunk_size.min((max_size - offset) as usize);
        let base_chunk = if offset < size_a {
            baseline.read(offset, to_read)?
        } else {
            Vec::new()
        };
        let mut snap_chunks = Vec::with_capacity(n);
        for snapshot in snapshots {
            let chunk = if offset < snapshot.size() {
                snapshot.read(offset, to_read)?
            } else {
                Vec::new()
            };
            snap_chunks.push(chunk);
        }

        for i in 0..to_read {
            let base_byte = base_chunk.get(i).copied();
            let mut diff_count = 0u32;
            for chunk in &snap_chunks {
                match (base_byte, chunk.get(i)) {
                    (Some(a), Some(b)) if a == *b => {}
                    // Either side missing, or bytes differ
                    _ => diff_count += 1,
                }
            }
            if diff_count > 0 {
                counts[(offset + i as u64) as usize] =
                    u16::try_from(diff_count).unwrap_or(u16::MAX);
                union_changed += 1;
            }
        }
        offset += to_read as u64;
    }

    let mean_diff_rate = union_changed as f64 / max_size as f64;
    Ok((
        counts,
        FrequencyStats {
            snapshots: n,
            max_size,
            union_changed,
            mean_diff_rate,
        },
    ))
}

/// Bounds-safe point query into a counts array.
pub fn freq_at(counts: &[u16], offset: u64) -> u16 {
    usize::try_from(offset)
        .ok()
        .and_then(|i| counts.get(i).copied())
        .unwrap_or(0)
}
