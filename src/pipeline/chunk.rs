//! Worker-aware batch chunking

use crate::records::RecordId;

/// Batch size balancing parallelism against per-batch dispatch overhead:
/// `max(floor, ceil(total / consumers))`.
pub fn chunk_size(total: usize, consumers: usize, floor: usize) -> usize {
    let consumers = consumers.max(1);
    total.div_ceil(consumers).max(floor.max(1))
}

/// Split a batch into chunks of `size`, preserving order.
pub fn chunks(uuids: Vec<RecordId>, size: usize) -> Vec<Vec<RecordId>> {
    uuids
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
