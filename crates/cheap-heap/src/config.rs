use size_class::SizeClassConfig;

/// Parameters of a [`CheapHeap`](crate::CheapHeap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapConfig {
    pub size_classes: SizeClassConfig,
    /// Address space reserved for each size class.
    ///
    /// Must be a multiple of the page size and at least
    /// `size_classes.max_size`.
    pub region_size: usize,
    /// Requests below this size are served as if they asked for it.
    pub min_size: usize,
}

impl HeapConfig {
    /// 1 GiB per class, classes up to 1 GiB, 16-byte minimum.
    ///
    /// The default table has 84 classes, so the heap reserves 84 GiB of
    /// address space. The reservation uses `MAP_NORESERVE` and only touched
    /// pages are backed, but it fails when overcommit is disabled
    /// (`vm.overcommit_memory=2`). Lower `region_size` and
    /// `size_classes.max_size` together for a smaller reservation.
    pub const DEFAULT: Self = Self {
        size_classes: SizeClassConfig::DEFAULT,
        region_size: 1024 * 1024 * 1024,
        min_size: 16,
    };
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use size_class::SizeClasses;

    use super::*;

    #[test]
    fn test_default_reservation() {
        let classes = SizeClasses::new(HeapConfig::DEFAULT.size_classes).unwrap();
        assert_eq!(classes.num_classes(), 84);
        assert_eq!(
            classes.num_classes() * HeapConfig::DEFAULT.region_size,
            84 * 1024 * 1024 * 1024
        );
    }
}
