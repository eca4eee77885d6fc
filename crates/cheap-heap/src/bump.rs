//! Bump-pointer backing slab.
//!
//! The slab reserves one contiguous range of address space up front and splits
//! it into equally sized regions, one per size class. Fresh blocks of a class
//! are carved from its region by advancing a cursor; blocks are never handed
//! back to the slab.
//!
//! # Memory Layout
//!
//! ```text
//! base
//!  │
//!  ▼
//!  ┌────────────────────┬────────────────────┬─────┬────────────────────┐
//!  │ class 0 region     │ class 1 region     │ ... │ class N-1 region   │
//!  │ [blk][blk]──►      │ [ blk ][ blk ]──►  │     │ [      blk      ]  │
//!  └────────────────────┴────────────────────┴─────┴────────────────────┘
//!  ◄─── region_size ───►
//! ```
//!
//! Because every region holds blocks of a single size, the size of any block
//! is recovered from its address alone: the region index gives the class.
//! Addresses outside the reservation, past a region's cursor, or not on a
//! block boundary report size `0`.
//!
//! The reservation is made with `MAP_NORESERVE`, so untouched regions cost
//! address space only.

use core::ptr::{self, NonNull};

use arrayvec::ArrayVec;
use size_class::{SizeClass, SizeClasses};
use snafu::{OptionExt as _, ensure};

use crate::{
    MAX_CLASSES,
    error::{
        HeapError, RegionSizeSnafu, ReservationOverflowSnafu, ReserveSnafu, TooManyClassesSnafu,
    },
};

fn page_size() -> usize {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(page_size).unwrap_or(4096)
}

unsafe fn os_reserve(len: usize) -> Option<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return None;
    }
    NonNull::new(ptr.cast())
}

unsafe fn os_release(ptr: NonNull<u8>, len: usize) {
    unsafe {
        libc::munmap(ptr.as_ptr().cast(), len);
    }
}

/// A per-class bump allocator over one reserved address range.
#[derive(Debug)]
pub struct BumpSlab {
    base: NonNull<u8>,
    region_size: usize,
    classes: SizeClasses,
    /// Bytes carved so far from each class region.
    cursors: ArrayVec<usize, MAX_CLASSES>,
}

unsafe impl Send for BumpSlab {}

impl BumpSlab {
    /// Reserves one `region_size`-byte region for every class in `classes`.
    ///
    /// `region_size` must be a multiple of the page size and large enough to
    /// hold one block of the largest class.
    pub fn new(classes: SizeClasses, region_size: usize) -> Result<Self, HeapError> {
        let num_classes = classes.num_classes();
        ensure!(
            num_classes <= MAX_CLASSES,
            TooManyClassesSnafu { num_classes }
        );

        let page_size = page_size();
        ensure!(
            region_size >= classes.max_size() && region_size.is_multiple_of(page_size),
            RegionSizeSnafu {
                region_size,
                page_size,
                max_size: classes.max_size(),
            }
        );

        let len = region_size
            .checked_mul(num_classes)
            .context(ReservationOverflowSnafu {
                region_size,
                num_classes,
            })?;
        let base = unsafe { os_reserve(len) }.context(ReserveSnafu { len })?;

        Ok(Self {
            base,
            region_size,
            classes,
            cursors: (0..num_classes).map(|_| 0).collect(),
        })
    }

    /// Carves a fresh block of `class` from its region.
    ///
    /// Returns `None` once the region is exhausted.
    pub fn allocate(&mut self, class: SizeClass) -> Option<*mut u8> {
        debug_assert_eq!(self.classes.class(class.index()), class);

        let cursor = &mut self.cursors[class.index()];
        let end = cursor.checked_add(class.size())?;
        if end > self.region_size {
            return None;
        }

        let offset = class.index() * self.region_size + *cursor;
        *cursor = end;
        Some(unsafe { self.base.as_ptr().add(offset) })
    }

    /// Returns the block size of `ptr`, or `0` if this slab did not issue it.
    #[inline]
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        let Some(offset) = ptr.addr().checked_sub(self.base.as_ptr().addr()) else {
            return 0;
        };
        if offset >= self.reserved_bytes() {
            return 0;
        }

        let index = offset / self.region_size;
        let in_region = offset % self.region_size;
        if in_region >= self.cursors[index] {
            return 0;
        }

        let size = self.classes.class(index).size();
        if in_region.is_multiple_of(size) {
            size
        } else {
            0
        }
    }

    #[must_use]
    pub const fn region_size(&self) -> usize {
        self.region_size
    }

    /// Total bytes of address space reserved.
    #[must_use]
    pub const fn reserved_bytes(&self) -> usize {
        self.region_size * self.classes.num_classes()
    }

    /// Total bytes carved from all regions so far.
    #[must_use]
    pub fn carved_bytes(&self) -> usize {
        self.cursors.iter().sum()
    }
}

impl Drop for BumpSlab {
    fn drop(&mut self) {
        unsafe {
            os_release(self.base, self.reserved_bytes());
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use size_class::SizeClassConfig;

    use super::*;

    const REGION_SIZE: usize = 64 * 1024;

    fn test_classes() -> SizeClasses {
        SizeClasses::new(SizeClassConfig {
            granularity: 16,
            linear_limit: 256,
            max_size: 16 * 1024,
        })
        .unwrap()
    }

    fn with_test_slab<F>(test_fn: F)
    where
        F: FnOnce(&mut BumpSlab, SizeClasses),
    {
        let classes = test_classes();
        let mut slab = BumpSlab::new(classes, REGION_SIZE).unwrap();
        test_fn(&mut slab, classes);
    }

    #[test]
    fn test_reservation() {
        with_test_slab(|slab, classes| {
            assert_eq!(slab.region_size(), REGION_SIZE);
            assert_eq!(slab.reserved_bytes(), REGION_SIZE * classes.num_classes());
            assert_eq!(slab.carved_bytes(), 0);
        });
    }

    #[test]
    fn test_allocate_is_sequential_within_class() {
        with_test_slab(|slab, classes| {
            let class = classes.lookup(48).unwrap();
            let a = slab.allocate(class).unwrap();
            let b = slab.allocate(class).unwrap();
            assert_eq!(b.addr() - a.addr(), 48);
            assert_eq!(a.addr() % 16, 0);
            assert_eq!(slab.carved_bytes(), 96);
        });
    }

    #[test]
    fn test_classes_use_separate_regions() {
        with_test_slab(|slab, classes| {
            let small = slab.allocate(classes.class(0)).unwrap();
            let large = slab.allocate(classes.class(1)).unwrap();
            assert_eq!(large.addr() - small.addr(), REGION_SIZE);
        });
    }

    #[test]
    fn test_size_of_issued_blocks() {
        with_test_slab(|slab, classes| {
            for class in classes.iter() {
                let ptr = slab.allocate(class).unwrap();
                unsafe {
                    ptr.write_bytes(0x33, class.size());
                }
                assert_eq!(slab.size_of(ptr), class.size());
            }
        });
    }

    #[test]
    fn test_size_of_unknown_pointers() {
        with_test_slab(|slab, classes| {
            let class = classes.lookup(64).unwrap();
            let ptr = slab.allocate(class).unwrap();

            // Interior of an issued block.
            assert_eq!(slab.size_of(ptr.wrapping_add(16)), 0);
            // Past the cursor of the region.
            assert_eq!(slab.size_of(ptr.wrapping_add(64)), 0);
            // Region of a class that never carved anything.
            let untouched = ptr.wrapping_add(REGION_SIZE);
            assert_eq!(slab.size_of(untouched), 0);
            // Outside the reservation.
            let local = 0_u64;
            assert_eq!(slab.size_of(ptr::from_ref(&local).cast()), 0);
            assert_eq!(slab.size_of(ptr::null()), 0);
            let end = slab.base.as_ptr().wrapping_add(slab.reserved_bytes());
            assert_eq!(slab.size_of(end), 0);
        });
    }

    #[test]
    fn test_exhaustion() {
        with_test_slab(|slab, classes| {
            let class = classes.class(classes.num_classes() - 1);
            let per_region = REGION_SIZE / class.size();
            for _ in 0..per_region {
                assert!(slab.allocate(class).is_some());
            }
            assert!(slab.allocate(class).is_none());
            assert!(slab.allocate(class).is_none());

            // Other classes are unaffected.
            assert!(slab.allocate(classes.class(0)).is_some());
        });
    }

    #[test]
    fn test_invalid_region_size() {
        let classes = test_classes();
        assert!(matches!(
            BumpSlab::new(classes, 8 * 1024),
            Err(HeapError::RegionSize { .. })
        ));
        assert!(matches!(
            BumpSlab::new(classes, REGION_SIZE + 1),
            Err(HeapError::RegionSize { .. })
        ));
        assert!(matches!(
            BumpSlab::new(classes, usize::MAX & !(page_size() - 1)),
            Err(HeapError::ReservationOverflow { .. })
        ));
    }
}
