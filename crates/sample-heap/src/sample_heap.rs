//! Sampling decorator.
//!
//! [`SampleHeap`] forwards every call to a wrapped [`Heap`] and accumulates
//! the real (rounded) sizes it allocates and releases. Each direction has its
//! own byte counter and trigger count, but both share one sampling interval.
//! When a counter reaches the interval, the heap appends a [`Record`] to the
//! signal log, resets the counter, and raises the channel's signal.

use std::process;

use cheap_heap::{CheapHeap, Heap, HeapConfig};
use snafu::{ResultExt as _, ensure};

use crate::{
    channel::Channel,
    config::{IntervalScale, SampleConfig},
    error::{HeapSnafu, IgnoreSignalSnafu, SampleHeapError, ZeroIntervalSnafu, ZeroScaleSnafu},
    record::Record,
    signal_log::SignalLog,
};

/// Snapshot of the sampling counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingStats {
    /// Bytes allocated since the last malloc trigger.
    pub malloc_bytes: usize,
    /// Bytes released since the last free trigger.
    pub free_bytes: usize,
    /// Bytes that trigger a record on either channel.
    pub interval: usize,
    pub malloc_triggers: u64,
    pub free_triggers: u64,
}

impl SamplingStats {
    const fn new(interval: usize) -> Self {
        Self {
            malloc_bytes: 0,
            free_bytes: 0,
            interval,
            malloc_triggers: 0,
            free_triggers: 0,
        }
    }

    /// Total triggers on both channels.
    #[must_use]
    pub const fn triggers(&self) -> u64 {
        self.malloc_triggers + self.free_triggers
    }
}

/// A heap decorator that signals a profiler every `interval` bytes.
///
/// # Process-wide State
///
/// Constructing a `SampleHeap` sets the dispositions of `SIGXCPU` and
/// `SIGXFSZ` to "ignore" and creates the signal log
/// `<log_dir>/<log_prefix><pid>`. Dropping it removes the log. Only one
/// instance per process should own the channels; a profiler installs its own
/// handlers after construction.
///
/// # Thread Safety
///
/// Like the heaps it wraps, the decorator takes `&mut self` and never locks.
#[derive(Debug)]
pub struct SampleHeap<H> {
    heap: H,
    stats: SamplingStats,
    scale: IntervalScale,
    log: SignalLog,
}

impl<H> SampleHeap<H>
where
    H: Heap,
{
    /// Wraps `heap`, taking ownership of the signal channels and the signal
    /// log.
    pub fn new(heap: H, config: SampleConfig) -> Result<Self, SampleHeapError> {
        let SampleConfig {
            interval_bytes,
            interval_scale,
            log_dir,
            log_prefix,
        } = config;
        ensure!(interval_bytes > 0, ZeroIntervalSnafu);
        ensure!(
            interval_scale.numerator > 0 && interval_scale.denominator > 0,
            ZeroScaleSnafu {
                numerator: interval_scale.numerator,
                denominator: interval_scale.denominator,
            }
        );

        let log = SignalLog::create(log_dir, log_prefix, process::id())?;
        for channel in [Channel::Malloc, Channel::Free] {
            channel.ignore().context(IgnoreSignalSnafu {
                channel,
                signal: channel.signal(),
            })?;
        }
        debug!(
            "sampling every {interval_bytes} bytes into {}",
            log.path()
        );

        Ok(Self {
            heap,
            stats: SamplingStats::new(interval_bytes),
            scale: interval_scale,
            log,
        })
    }

    /// Allocates from the wrapped heap and accounts the real block size.
    pub fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        let ptr = self.heap.allocate(size)?;
        let real = self.heap.size_of(ptr);
        debug_assert!(real >= size, "{size}-byte request got a {real}-byte block");
        debug_assert!(
            size < self.heap.min_size() || real <= 2 * size,
            "{size}-byte request got an oversized {real}-byte block"
        );

        self.stats.malloc_bytes = self.stats.malloc_bytes.saturating_add(real);
        if self.stats.malloc_bytes >= self.stats.interval {
            self.trigger(Channel::Malloc);
        }
        Some(ptr)
    }

    /// Releases to the wrapped heap and accounts the recovered block size.
    ///
    /// Null pointers are ignored. Pointers the wrapped heap does not
    /// recognize report `0` and leave the counters unchanged.
    ///
    /// # Safety
    ///
    /// Same contract as [`Heap::release`] of the wrapped heap.
    pub unsafe fn release(&mut self, ptr: *mut u8) -> usize {
        if ptr.is_null() {
            return 0;
        }
        let real = unsafe { self.heap.release(ptr) };
        if real == 0 {
            return 0;
        }

        self.stats.free_bytes = self.stats.free_bytes.saturating_add(real);
        if self.stats.free_bytes >= self.stats.interval {
            self.trigger(Channel::Free);
        }
        real
    }

    #[inline]
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        self.heap.size_of(ptr)
    }

    #[cold]
    #[inline(never)]
    fn trigger(&mut self, channel: Channel) {
        let stats = &mut self.stats;
        let bytes = match channel {
            Channel::Malloc => {
                stats.malloc_triggers += 1;
                core::mem::take(&mut stats.malloc_bytes)
            }
            Channel::Free => {
                stats.free_triggers += 1;
                core::mem::take(&mut stats.free_bytes)
            }
        };
        if stats.malloc_triggers == stats.free_triggers {
            stats.interval = self.scale.apply(stats.interval);
        }

        let record = Record {
            channel,
            sequence: stats.triggers(),
            bytes,
        };
        trace!("sample {record}");
        if let Err(err) = self.log.append(&record) {
            warn!("failed to append {record} to {}: {err}", self.log.path());
        }
        channel.raise();
    }
}

impl<H> SampleHeap<H> {
    /// Current counters, interval and trigger counts.
    #[must_use]
    pub const fn stats(&self) -> &SamplingStats {
        &self.stats
    }

    #[must_use]
    pub const fn inner(&self) -> &H {
        &self.heap
    }

    /// Mutable access to the wrapped heap.
    ///
    /// Calls made through it bypass sampling.
    pub const fn inner_mut(&mut self) -> &mut H {
        &mut self.heap
    }

    /// Unwraps the heap, removing the signal log.
    pub fn into_inner(self) -> H {
        self.heap
    }

    /// Path of the signal log.
    #[must_use]
    pub fn log_path(&self) -> &str {
        self.log.path()
    }
}

impl SampleHeap<CheapHeap> {
    /// Builds a [`CheapHeap`] and wraps it.
    pub fn with_config(
        heap_config: HeapConfig,
        config: SampleConfig,
    ) -> Result<Self, SampleHeapError> {
        let heap = CheapHeap::new(heap_config).context(HeapSnafu)?;
        Self::new(heap, config)
    }
}

impl<H> Heap for SampleHeap<H>
where
    H: Heap,
{
    const ALIGNMENT: usize = H::ALIGNMENT;

    #[inline]
    fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        Self::allocate(self, size)
    }

    #[inline]
    unsafe fn release(&mut self, ptr: *mut u8) -> usize {
        unsafe { Self::release(self, ptr) }
    }

    #[inline]
    fn size_of(&self, ptr: *const u8) -> usize {
        Self::size_of(self, ptr)
    }

    #[inline]
    fn min_size(&self) -> usize {
        self.heap.min_size()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::{path::Path, ptr};

    use size_class::SizeClassConfig;

    use super::*;
    use crate::record::read_records;

    const HEAP_CONFIG: HeapConfig = HeapConfig {
        size_classes: SizeClassConfig {
            granularity: 16,
            linear_limit: 1024,
            max_size: 64 * 1024,
        },
        region_size: 256 * 1024,
        min_size: 16,
    };

    fn test_config(log_prefix: &'static str, interval_bytes: usize) -> SampleConfig {
        SampleConfig {
            interval_bytes,
            log_prefix,
            ..SampleConfig::DEFAULT
        }
    }

    fn with_test_heap<F>(config: SampleConfig, test_fn: F)
    where
        F: FnOnce(&mut SampleHeap<CheapHeap>),
    {
        let mut heap = SampleHeap::with_config(HEAP_CONFIG, config).unwrap();
        test_fn(&mut heap);
    }

    fn record(channel: Channel, sequence: u64, bytes: usize) -> Record {
        Record {
            channel,
            sequence,
            bytes,
        }
    }

    fn records(heap: &SampleHeap<CheapHeap>) -> Vec<Record> {
        read_records(heap.log_path()).unwrap()
    }

    #[test]
    fn test_log_path() {
        with_test_heap(test_config("sample-heap-test-path", 1024), |heap| {
            let expected = format!("/tmp/sample-heap-test-path{}", process::id());
            assert_eq!(heap.log_path(), expected);
            assert!(Path::new(&expected).exists());
            assert!(records(heap).is_empty());
        });
    }

    #[test]
    fn test_exact_interval_triggers_once() {
        with_test_heap(test_config("sample-heap-test-exact", 1024), |heap| {
            heap.allocate(512).unwrap();
            assert_eq!(heap.stats().malloc_bytes, 512);
            assert!(records(heap).is_empty());

            heap.allocate(512).unwrap();
            assert_eq!(records(heap), [record(Channel::Malloc, 1, 1024)]);
            assert_eq!(
                *heap.stats(),
                SamplingStats {
                    malloc_bytes: 0,
                    free_bytes: 0,
                    interval: 1024,
                    malloc_triggers: 1,
                    free_triggers: 0,
                }
            );
        });
    }

    #[test]
    fn test_rounded_sizes_cross_interval() {
        with_test_heap(test_config("sample-heap-test-rounded", 1000), |heap| {
            let a = heap.allocate(600).unwrap();
            assert_eq!(heap.size_of(a), 608);
            assert_eq!(heap.stats().malloc_bytes, 608);

            let b = heap.allocate(500).unwrap();
            assert_eq!(heap.size_of(b), 512);

            let records = records(heap);
            assert_eq!(records.len(), 1);
            assert!(records[0].to_string().starts_with("M,1,"));
            assert_eq!(records[0].bytes, 1120);
            assert_eq!(heap.stats().malloc_bytes, 0);
            assert_eq!(heap.stats().free_triggers, 0);
        });
    }

    #[test]
    fn test_free_side_is_independent() {
        with_test_heap(test_config("sample-heap-test-free", 1024), |heap| {
            let ptrs = [(); 4].map(|()| heap.allocate(512).unwrap());
            assert_eq!(heap.stats().malloc_triggers, 2);
            assert_eq!(heap.stats().free_bytes, 0);

            unsafe {
                assert_eq!(heap.release(ptrs[0]), 512);
            }
            assert_eq!(heap.stats().free_bytes, 512);
            assert_eq!(heap.stats().malloc_bytes, 0);
            unsafe {
                assert_eq!(heap.release(ptrs[1]), 512);
            }

            assert_eq!(
                records(heap),
                [
                    record(Channel::Malloc, 1, 1024),
                    record(Channel::Malloc, 2, 1024),
                    record(Channel::Free, 3, 1024),
                ]
            );
            assert_eq!(heap.stats().malloc_triggers, 2);
            assert_eq!(heap.stats().free_triggers, 1);
        });
    }

    #[test]
    fn test_release_ignores_null_and_foreign() {
        with_test_heap(test_config("sample-heap-test-foreign", 64), |heap| {
            let mut local = [0_u8; 64];
            unsafe {
                assert_eq!(heap.release(ptr::null_mut()), 0);
                assert_eq!(heap.release(local.as_mut_ptr()), 0);
            }
            assert_eq!(heap.stats().free_bytes, 0);
            assert_eq!(heap.stats().free_triggers, 0);
            assert_eq!(heap.inner().idle_bytes(), 0);
            assert!(records(heap).is_empty());
        });
    }

    #[test]
    fn test_failed_allocation_is_not_counted() {
        with_test_heap(test_config("sample-heap-test-failed", 1024), |heap| {
            assert!(heap.allocate(HEAP_CONFIG.size_classes.max_size + 1).is_none());
            assert_eq!(heap.stats().malloc_bytes, 0);
            assert!(records(heap).is_empty());
        });
    }

    #[test]
    fn test_reuse_is_sampled() {
        with_test_heap(test_config("sample-heap-test-reuse", 4096), |heap| {
            let ptr = heap.allocate(100).unwrap();
            unsafe {
                ptr.write_bytes(0x33, 112);
                assert_eq!(heap.release(ptr), 112);
            }
            assert_eq!(heap.allocate(100), Some(ptr));
            assert_eq!(heap.stats().malloc_bytes, 224);
            assert_eq!(heap.stats().free_bytes, 112);
        });
    }

    #[test]
    fn test_requests_below_floor_are_sampled() {
        let heap_config = HeapConfig {
            min_size: 100,
            ..HEAP_CONFIG
        };
        let mut heap =
            SampleHeap::with_config(heap_config, test_config("sample-heap-test-floor", 336))
                .unwrap();
        assert_eq!(Heap::min_size(&heap), 100);

        // Below the floor: rounded up to the floor's class.
        let small = heap.allocate(20).unwrap();
        assert_eq!(heap.size_of(small), 112);
        let tiny = heap.allocate(1).unwrap();
        assert_eq!(heap.size_of(tiny), 112);
        assert_eq!(heap.stats().malloc_bytes, 224);

        // At the floor.
        let exact = heap.allocate(100).unwrap();
        assert_eq!(heap.size_of(exact), 112);
        assert_eq!(records(&heap), [record(Channel::Malloc, 1, 336)]);

        unsafe {
            assert_eq!(heap.release(small), 112);
        }
        assert_eq!(heap.stats().free_bytes, 112);
    }

    #[test]
    fn test_counters_saturate() {
        let config = SampleConfig {
            interval_scale: IntervalScale {
                numerator: 2,
                denominator: 1,
            },
            ..test_config("sample-heap-test-saturate", usize::MAX)
        };
        with_test_heap(config, |heap| {
            heap.stats.malloc_bytes = usize::MAX - 8;
            let ptr = heap.allocate(64).unwrap();
            assert_eq!(records(heap), [record(Channel::Malloc, 1, usize::MAX)]);
            assert_eq!(heap.stats().malloc_bytes, 0);

            heap.stats.free_bytes = usize::MAX - 8;
            unsafe {
                assert_eq!(heap.release(ptr), 64);
            }
            assert_eq!(
                records(heap)[1],
                record(Channel::Free, 2, usize::MAX)
            );
            // Scaling an interval already at the top saturates.
            assert_eq!(heap.stats().interval, usize::MAX);
        });
    }

    #[test]
    fn test_missing_log_dir() {
        let config = SampleConfig {
            log_dir: "/nonexistent-sample-heap-dir",
            ..test_config("sample-heap-test-no-dir", 1024)
        };
        assert!(matches!(
            SampleHeap::with_config(HEAP_CONFIG, config),
            Err(SampleHeapError::CreateLog { .. })
        ));
    }

    #[test]
    fn test_interval_scale_applies_when_triggers_match() {
        let config = SampleConfig {
            interval_scale: IntervalScale {
                numerator: 2,
                denominator: 1,
            },
            ..test_config("sample-heap-test-scale", 1024)
        };
        with_test_heap(config, |heap| {
            let a = heap.allocate(1024).unwrap();
            // One malloc trigger, no free trigger yet: unchanged.
            assert_eq!(heap.stats().interval, 1024);

            unsafe {
                heap.release(a);
            }
            // Counts are equal again.
            assert_eq!(heap.stats().interval, 2048);

            heap.allocate(1024).unwrap();
            assert_eq!(heap.stats().malloc_triggers, 1);
            assert_eq!(heap.stats().malloc_bytes, 1024);
        });
    }

    #[test]
    fn test_drop_removes_log() {
        let heap =
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-drop", 16)).unwrap();
        let path = heap.log_path().to_owned();
        drop(heap);
        assert!(!Path::new(&path).exists());

        let mut heap =
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-drop", 16)).unwrap();
        heap.allocate(16).unwrap();
        assert_eq!(records(&heap).len(), 1);
        drop(heap);
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_drop_tolerates_missing_log() {
        let heap =
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-gone", 16)).unwrap();
        std::fs::remove_file(heap.log_path()).unwrap();
        drop(heap);
    }

    #[test]
    fn test_into_inner_removes_log() {
        let mut heap =
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-inner", 4096))
                .unwrap();
        let ptr = heap.allocate(64).unwrap();
        let path = heap.log_path().to_owned();

        let mut inner = heap.into_inner();
        assert!(!Path::new(&path).exists());
        assert_eq!(inner.size_of(ptr), 64);
        unsafe {
            assert_eq!(inner.release(ptr), 64);
        }
    }

    #[test]
    fn test_stacks_over_another_sample_heap() {
        let inner =
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-inner-layer", 64))
                .unwrap();
        let mut outer = SampleHeap::new(inner, test_config("sample-heap-test-outer-layer", 128))
            .unwrap();
        outer.allocate(64).unwrap();
        outer.allocate(64).unwrap();
        assert_eq!(outer.stats().malloc_triggers, 1);
        assert_eq!(outer.inner().stats().malloc_triggers, 2);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            SampleHeap::with_config(HEAP_CONFIG, test_config("sample-heap-test-invalid", 0)),
            Err(SampleHeapError::ZeroInterval { .. })
        ));
        let config = SampleConfig {
            interval_scale: IntervalScale {
                numerator: 1,
                denominator: 0,
            },
            ..test_config("sample-heap-test-invalid", 1024)
        };
        assert!(matches!(
            SampleHeap::with_config(HEAP_CONFIG, config),
            Err(SampleHeapError::ZeroScale { .. })
        ));
        let heap_config = HeapConfig {
            min_size: 1024 * 1024,
            ..HEAP_CONFIG
        };
        assert!(matches!(
            SampleHeap::with_config(heap_config, test_config("sample-heap-test-invalid", 1024)),
            Err(SampleHeapError::Heap { .. })
        ));
        assert!(!Path::new(&format!("/tmp/sample-heap-test-invalid{}", process::id())).exists());
    }
}
