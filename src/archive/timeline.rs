//! Slot timestamps of a circular buffer
//!
//! A buffer only stores its newest timestamp and the spacing between slots.
//! The timestamp of every other slot follows from its distance, walking
//! backwards with wraparound, to the newest slot.

use crate::archive::types::Buffer;

/// Timestamp of every slot, indexed by slot.
///
/// Slot `file_offset` holds `timestamp_1`; slot `file_offset + 1` (mod
/// `n_samples`) holds the oldest timestamp. Empty for an empty buffer.
pub fn reconstruct(buffer: &Buffer) -> Vec<i64> {
    let n = buffer.n_samples;
    if n == 0 {
        return Vec::new();
    }

    let newest = i64::from(buffer.timestamp_1);
    let step = buffer.step();
    let offset = buffer.file_offset % n;

    (0..n)
        .map(|slot| {
            let age = (offset + n - slot) % n;
            newest - step * age as i64
        })
        .collect()
}

/// Slot indices from oldest to newest
pub fn chronological_slots(buffer: &Buffer) -> impl Iterator<Item = usize> {
    let n = buffer.n_samples;
    let start = buffer.oldest_slot();
    (0..n).map(move |i| (start + i) % n)
}
