//! Free-space planning: turning the live descriptor set into a gap list and
//! picking destination offsets for new payloads.
//!
//! The policy is largest-first best-fit. Interior holes are preferred while
//! one can hold the request; otherwise the store grows at the tail. Interior
//! holes are never compacted; space left by deletes is only reclaimed when
//! a later insert happens to fit it.

use codec::{Descriptor, HEADER_BYTES};

/// A maximal unused interval in the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gap {
    /// A hole between live payloads (or between the header and the first
    /// payload). Holds a block only if the block fits entirely.
    Interior { start: u64, size: u64 },
    /// The hole just before the index list. For fit checks its capacity is
    /// unbounded; a block placed here pushes the index list outward.
    Tail { start: u64 },
}

/// Where one block goes, and where the index list goes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub offset: u64,
    pub new_index_start: u64,
}

/// Sweeps the live payload intervals and emits the gaps between them.
///
/// `descriptors` need not be sorted. The final gap, when the last payload
/// ends short of `index_start`, is the distinguished tail gap.
pub(crate) fn gaps(descriptors: &[Descriptor], index_start: u64) -> Vec<Gap> {
    let mut intervals: Vec<(u64, u64)> = descriptors
        .iter()
        .map(|d| (d.start, d.block_size()))
        .collect();
    intervals.sort_unstable();

    let mut out = Vec::new();
    let mut cursor = HEADER_BYTES as u64;
    for (start, size) in intervals {
        if cursor < start {
            out.push(Gap::Interior {
                start: cursor,
                size: start - cursor,
            });
        }
        cursor = start.saturating_add(size);
    }
    if cursor < index_start {
        out.push(Gap::Tail { start: cursor });
    }
    out
}

/// Picks the destination for a single block of `block` bytes.
///
/// Eligible gaps are interior gaps large enough for the block, plus the
/// tail gap. The largest eligible gap wins; ties keep the earliest, which
/// also prefers an interior gap over the tail (the tail is swept last).
/// With no eligible gap the block is appended at `index_start` and the
/// index list moves past it.
pub(crate) fn place_one(gaps: &[Gap], index_start: u64, block: u64) -> Placement {
    let mut best: Option<(u64, Gap)> = None;
    for &gap in gaps {
        let size = match gap {
            Gap::Interior { size, .. } => {
                if size < block {
                    continue;
                }
                size
            }
            Gap::Tail { start } => index_start - start,
        };
        if best.is_none_or(|(best_size, _)| size > best_size) {
            best = Some((size, gap));
        }
    }
    match best {
        Some((_, Gap::Interior { start, .. })) => Placement {
            offset: start,
            new_index_start: index_start,
        },
        Some((_, Gap::Tail { start })) => Placement {
            offset: start,
            new_index_start: start + block,
        },
        None => Placement {
            offset: index_start,
            new_index_start: index_start + block,
        },
    }
}

/// Plans a whole batch: `blocks[i]` is the byte size of request `i`.
///
/// Requests are considered largest first. Interior gaps are filled in file
/// order, each taking every request that still fits behind the ones already
/// placed in it; gaps smaller than the smallest request are skipped
/// outright. Whatever remains is appended sequentially starting at the old
/// `index_start`. Returns the chosen offset per request (input order) and
/// the new index start, unchanged when nothing was appended.
pub(crate) fn place_many(gaps: &[Gap], index_start: u64, blocks: &[u64]) -> (Vec<u64>, u64) {
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    // Stable sort keeps input order among equal sizes.
    order.sort_by(|&a, &b| blocks[b].cmp(&blocks[a]));
    let min_block = blocks.iter().copied().min().unwrap_or(0);

    let mut offsets = vec![0u64; blocks.len()];
    let mut placed = vec![false; blocks.len()];
    for &gap in gaps {
        let (gap_start, gap_size) = match gap {
            Gap::Interior { start, size } => (start, size),
            Gap::Tail { .. } => continue,
        };
        if gap_size < min_block {
            continue;
        }
        let mut used = 0u64;
        for &i in &order {
            if placed[i] || gap_size - used < blocks[i] {
                continue;
            }
            offsets[i] = gap_start + used;
            used += blocks[i];
            placed[i] = true;
        }
    }

    let mut tail_used = 0u64;
    for &i in &order {
        if placed[i] {
            continue;
        }
        offsets[i] = index_start + tail_used;
        tail_used += blocks[i];
    }
    (offsets, index_start + tail_used)
}
