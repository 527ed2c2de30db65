//! Deterministic fold of the change log into compiled text.

use crate::record::{DocChunk, HashWindow};

/// Everything [`replay`] derives from a chunk list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult {
    pub compiled: String,
    pub last_sequence: u64,
    pub chunk_count: u64,
    pub active_count: u64,
    pub deleted_count: u64,
    pub hash_window: HashWindow,
}

/// Replay `chunks` in sequence order.
///
/// Inactive chunks are skipped. An overwrite op resets the accumulator to
/// its own content (an empty overwrite clears it); any other op appends its
/// non-empty content. The accumulated parts are joined with `\n`.
pub fn replay(chunks: &[DocChunk], window_cap: usize) -> ReplayResult {
    let mut ordered: Vec<&DocChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.sequence);

    let mut parts: Vec<&str> = Vec::new();
    let mut active_hashes = Vec::new();
    let mut last_sequence = 0;
    let mut deleted_count = 0;

    for chunk in &ordered {
        last_sequence = last_sequence.max(chunk.sequence);
        if !chunk.active {
            deleted_count += 1;
            continue;
        }
        if chunk.op.overwrites() {
            parts.clear();
            if !chunk.content.is_empty() {
                parts.push(&chunk.content);
            }
        } else if !chunk.content.is_empty() {
            parts.push(&chunk.content);
        }
        active_hashes.push(chunk.hash.clone());
    }

    let chunk_count = ordered.len() as u64;
    ReplayResult {
        compiled: parts.join("\n"),
        last_sequence,
        chunk_count,
        active_count: chunk_count - deleted_count,
        deleted_count,
        hash_window: HashWindow::from_tail(active_hashes, window_cap),
    }
}

/// Compiled text after applying one more chunk to `current`.
///
/// Mirrors one step of [`replay`] so appends and rebuilds agree.
pub fn apply_one(current: Option<&str>, chunk: &DocChunk) -> String {
    if chunk.op.overwrites() {
        return chunk.content.clone();
    }
    match current {
        Some(existing) if !existing.is_empty() => format!("{existing}\n{}", chunk.content),
        _ => chunk.content.clone(),
    }
}
