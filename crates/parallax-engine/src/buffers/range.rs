/// Dirty span inside a buffer, in elements (not bytes).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UpdateRange {
    pub start: usize,
    pub count: usize,
}

impl UpdateRange {
    #[inline]
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    #[inline]
    pub fn end(self) -> usize {
        self.start + self.count
    }
}

/// Sorts ranges by start and folds overlapping or adjacent ones together.
///
/// A range is absorbed when `next.start <= prev.start + prev.count + 1`.
pub fn merge_update_ranges(ranges: &[UpdateRange]) -> Vec<UpdateRange> {
    let mut sorted: Vec<UpdateRange> = ranges.iter().copied().filter(|r| r.count > 0).collect();
    sorted.sort_by_key(|r| r.start);

    let mut merged: Vec<UpdateRange> = Vec::with_capacity(sorted.len());
    for next in sorted {
        match merged.last_mut() {
            Some(prev) if next.start <= prev.end() + 1 => {
                prev.count = prev.count.max(next.end() - prev.start);
            }
            _ => merged.push(next),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: usize, count: usize) -> UpdateRange {
        UpdateRange::new(start, count)
    }

    #[test]
    fn adjacent_ranges_fold_and_gaps_survive() {
        let merged = merge_update_ranges(&[r(10, 1), r(3, 2), r(0, 2)]);
        assert_eq!(merged, vec![r(0, 5), r(10, 1)]);
    }

    #[test]
    fn contained_range_keeps_outer_extent() {
        let merged = merge_update_ranges(&[r(0, 20), r(4, 2)]);
        assert_eq!(merged, vec![r(0, 20)]);
    }

    #[test]
    fn empty_ranges_are_dropped() {
        assert!(merge_update_ranges(&[r(5, 0)]).is_empty());
    }
}
