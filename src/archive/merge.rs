//! Temporal merge of an import into a destination buffer
//!
//! The destination keeps its own contents by default. An imported sample
//! replaces a slot only when its timestamp equals the slot's reconstructed
//! timestamp exactly; there is no interpolation or resampling.
//!
//! Import files are exported from a circular buffer in slot order, so their
//! timestamps are sorted but rotated (the sequence restarts at the old
//! buffer's oldest slot). Lookups use a pivoted binary search.

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::loader::ImportSeries;
use crate::archive::types::Buffer;

/// Merged slot values plus what changed
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T> {
    /// Next contents of the payload file, indexed by slot
    pub values: Vec<Option<T>>,
    /// Slots taken from the import
    pub replaced: usize,
}

/// Find `key` in a sorted-then-rotated slice of distinct values.
///
/// Returns `None` when the key is absent.
pub fn search_rotated<T: Ord>(haystack: &[T], key: &T) -> Option<usize> {
    if haystack.is_empty() {
        return None;
    }

    let mut lo = 0usize;
    let mut hi = haystack.len() - 1;

    loop {
        let mid = lo + (hi - lo) / 2;
        if haystack[mid] == *key {
            return Some(mid);
        }

        if haystack[lo] <= haystack[mid] {
            // [lo, mid] ascending
            if *key >= haystack[lo] && *key < haystack[mid] {
                // mid > lo, otherwise the range above is empty
                hi = mid - 1;
            } else {
                lo = mid + 1;
            }
        } else {
            // [mid, hi] ascending; haystack[lo] > haystack[mid] implies mid > lo
            if *key > haystack[mid] && *key <= haystack[hi] {
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }

        if lo > hi {
            return None;
        }
    }
}

/// Merge `import` into a destination buffer.
///
/// `timeline` and `destination` are indexed by slot and must both hold
/// `buffer.n_samples` entries. An import with more rows than the buffer has
/// slots cannot come from a buffer of the same capacity and is rejected.
pub fn merge<T: Copy>(
    buffer: &Buffer,
    timeline: &[i64],
    destination: &[Option<T>],
    import: &ImportSeries<T>,
) -> ArchiveResult<MergeOutcome<T>> {
    let n = buffer.n_samples;
    for found in [timeline.len(), destination.len()] {
        if found != n {
            return Err(ArchiveError::CapacityMismatch { expected: n, found });
        }
    }
    if import.len() > n {
        return Err(ArchiveError::CapacityMismatch {
            expected: n,
            found: import.len(),
        });
    }

    let mut values = destination.to_vec();
    if n == 0 {
        return Ok(MergeOutcome { values, replaced: 0 });
    }

    let oldest = timeline[buffer.oldest_slot()];
    let newest = timeline[buffer.newest_slot()];
    let mut replaced = 0;

    for (slot, ts) in timeline.iter().enumerate() {
        if *ts < oldest || *ts > newest {
            continue;
        }
        if let Some(k) = search_rotated(&import.timestamps, ts) {
            values[slot] = import.values[k];
            replaced += 1;
        }
    }

    tracing::debug!(
        "Merged {} of {} import rows into {} ({} slots)",
        replaced,
        import.len(),
        buffer.interval,
        n
    );

    Ok(MergeOutcome { values, replaced })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::types::SampleKind;

    fn rotations(sorted: &[i64]) -> Vec<Vec<i64>> {
        (0..sorted.len().max(1))
            .map(|r| {
                let mut v = sorted.to_vec();
                if !v.is_empty() {
                    v.rotate_left(r);
                }
                v
            })
            .collect()
    }

    #[test]
    fn test_search_finds_every_element() {
        for size in 0..12usize {
            let sorted: Vec<i64> = (0..size as i64).map(|i| i * 10 + 5).collect();
            for arr in rotations(&sorted) {
                for (idx, value) in arr.iter().enumerate() {
                    assert_eq!(search_rotated(&arr, value), Some(idx), "{:?} {}", arr, value);
                }
            }
        }
    }

    #[test]
    fn test_search_reports_absent_values() {
        for size in 0..12usize {
            let sorted: Vec<i64> = (0..size as i64).map(|i| i * 10 + 5).collect();
            for arr in rotations(&sorted) {
                for probe in [-100, 0, 4, 6, 10, 1000] {
                    assert_eq!(search_rotated(&arr, &probe), None, "{:?} {}", arr, probe);
                }
            }
        }
    }

    #[test]
    fn test_not_found_is_distinct_from_first_index() {
        let arr = [30i64, 40, 10, 20];
        assert_eq!(search_rotated(&arr, &30), Some(0));
        assert_eq!(search_rotated(&arr, &35), None);
    }

    fn four_slot_buffer() -> Buffer {
        // timestamps [100, 200, 300, 400], newest in slot 3
        Buffer::new(SampleKind::Integer, "5min", 4, 3, 400, 100)
    }

    #[test]
    fn test_merge_replaces_matching_slot() {
        let buffer = four_slot_buffer();
        let timeline = buffer.timeline();
        assert_eq!(timeline, vec![100, 200, 300, 400]);

        let destination = vec![Some(10), Some(11), Some(12), Some(13)];
        let import = ImportSeries::from_parts(vec![200], vec![Some(99)]);

        let outcome = merge(&buffer, &timeline, &destination, &import).unwrap();
        assert_eq!(outcome.values, vec![Some(10), Some(99), Some(12), Some(13)]);
        assert_eq!(outcome.replaced, 1);
    }

    #[test]
    fn test_merge_outside_window_is_identity() {
        let buffer = four_slot_buffer();
        let timeline = buffer.timeline();
        let destination = vec![Some(10), None, Some(12), Some(13)];
        let import = ImportSeries::from_parts(vec![0, 50, 450, 500], vec![Some(1); 4]);

        let outcome = merge(&buffer, &timeline, &destination, &import).unwrap();
        assert_eq!(outcome.values, destination);
        assert_eq!(outcome.replaced, 0);
    }

    #[test]
    fn test_merge_rotated_import_into_wrapped_buffer() {
        // slot 1 newest: timeline [9700, 10000, 8800, 9100, 9400]
        let buffer = Buffer::new(SampleKind::Real, "5min", 5, 1, 10_000, 300);
        let timeline = buffer.timeline();
        let destination = vec![None; 5];
        let import = ImportSeries::from_parts(
            vec![9_400, 9_700, 8_500, 8_800, 9_100],
            vec![Some(4.0), Some(5.0), Some(1.0), Some(2.0), Some(3.0)],
        );

        let outcome = merge(&buffer, &timeline, &destination, &import).unwrap();
        assert_eq!(
            outcome.values,
            vec![Some(5.0), None, Some(2.0), Some(3.0), Some(4.0)]
        );
        assert_eq!(outcome.replaced, 4);
    }

    #[test]
    fn test_unfilled_import_values_are_copied() {
        let buffer = four_slot_buffer();
        let timeline = buffer.timeline();
        let destination = vec![Some(10), Some(11), Some(12), Some(13)];
        let import = ImportSeries::from_parts(vec![300], vec![None]);

        let outcome = merge(&buffer, &timeline, &destination, &import).unwrap();
        assert_eq!(outcome.values[2], None);
    }

    #[test]
    fn test_capacity_mismatch() {
        let buffer = four_slot_buffer();
        let timeline = buffer.timeline();
        let import = ImportSeries::from_parts(vec![100], vec![Some(1)]);

        let short = vec![Some(1); 3];
        assert!(matches!(
            merge(&buffer, &timeline, &short, &import),
            Err(ArchiveError::CapacityMismatch { expected: 4, found: 3 })
        ));

        let destination = vec![Some(1); 4];
        let oversized = ImportSeries::from_parts((0..5).map(|i| i * 100).collect(), vec![Some(1); 5]);
        assert!(matches!(
            merge(&buffer, &timeline, &destination, &oversized),
            Err(ArchiveError::CapacityMismatch { expected: 4, found: 5 })
        ));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = Buffer::new(SampleKind::Integer, "days", 0, 0, 400, 100);
        let import: ImportSeries<i32> = ImportSeries::from_parts(Vec::new(), Vec::new());
        let outcome = merge(&buffer, &[], &[], &import).unwrap();
        assert!(outcome.values.is_empty());
    }
}
