use std::ops::Range;

/// Contiguous slot runs, one per device, in discovery order.
///
/// Device `i` owns `ranges[i]`; the runs partition `0..len()` with no gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTable {
    ranges: Vec<Range<usize>>,
}

impl SlotTable {
    pub fn from_channel_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let mut next = 0usize;
        let ranges = counts
            .into_iter()
            .map(|c| {
                let start = next;
                next += c as usize;
                start..next
            })
            .collect();
        Self { ranges }
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.ranges.last().map(|r| r.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn range(&self, device: usize) -> Option<Range<usize>> {
        self.ranges.get(device).cloned()
    }

    /// Device index and channel behind a slot.
    pub fn locate(&self, slot: usize) -> Option<(usize, u8)> {
        let device = self.ranges.partition_point(|r| r.end <= slot);
        let range = self.ranges.get(device)?;
        if !range.contains(&slot) {
            return None;
        }
        let channel = u8::try_from(slot - range.start).ok()?;
        Some((device, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_is_contiguous_and_ordered() {
        let cases: Vec<Vec<u8>> = vec![
            vec![],
            vec![1],
            vec![3],
            vec![1, 3],
            vec![3, 1, 1, 3],
            vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        ];
        for counts in cases {
            let table = SlotTable::from_channel_counts(counts.iter().copied());
            let total: usize = counts.iter().map(|c| *c as usize).sum();
            assert_eq!(table.len(), total);
            assert_eq!(table.device_count(), counts.len());

            let mut expected_start = 0;
            for (dev, range) in table.ranges().iter().enumerate() {
                assert_eq!(range.start, expected_start);
                assert_eq!(range.len(), counts[dev] as usize);
                expected_start = range.end;
            }
            assert_eq!(expected_start, total);

            for slot in 0..total {
                let (dev, ch) = table.locate(slot).unwrap();
                assert_eq!(table.ranges()[dev].start + ch as usize, slot);
            }
            assert_eq!(table.locate(total), None);
        }
    }

    #[test]
    fn test_single_then_triple_channel() {
        let table = SlotTable::from_channel_counts([1, 3]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.locate(0), Some((0, 0)));
        assert_eq!(table.locate(1), Some((1, 0)));
        assert_eq!(table.locate(3), Some((1, 2)));
        assert_eq!(table.range(1), Some(1..4));
    }

    #[test]
    fn test_empty_table() {
        let table = SlotTable::default();
        assert!(table.is_empty());
        assert_eq!(table.locate(0), None);
    }
}
