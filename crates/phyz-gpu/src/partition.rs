//! Contiguous split of a group's members across devices.

use std::ops::Range;

/// Per-device ranges into a group's member list. Earlier devices take one
/// extra member when the split is uneven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuPartition {
    ranges: Vec<Range<usize>>,
}

impl GpuPartition {
    pub fn new(n: usize, n_devices: usize) -> Self {
        let n_devices = n_devices.max(1);
        let base = n / n_devices;
        let extra = n % n_devices;

        let mut ranges = Vec::with_capacity(n_devices);
        let mut start = 0;
        for d in 0..n_devices {
            let len = base + usize::from(d < extra);
            ranges.push(start..start + len);
            start += len;
        }
        Self { ranges }
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn range(&self, device: usize) -> Range<usize> {
        self.ranges[device].clone()
    }

    pub fn n_devices(&self) -> usize {
        self.ranges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let p = GpuPartition::new(100, 4);
        assert_eq!(p.ranges(), &[0..25, 25..50, 50..75, 75..100]);
    }

    #[test]
    fn test_uneven_split_is_contiguous() {
        let p = GpuPartition::new(10, 3);
        assert_eq!(p.ranges(), &[0..4, 4..7, 7..10]);
    }

    #[test]
    fn test_more_devices_than_members() {
        let p = GpuPartition::new(2, 4);
        assert_eq!(p.ranges(), &[0..1, 1..2, 2..2, 2..2]);
        assert_eq!(GpuPartition::new(5, 0).ranges(), &[0..5]);
    }
}
