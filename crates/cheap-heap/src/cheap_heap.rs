//! Size-classed heap.
//!
//! [`CheapHeap`] keeps one LIFO free list per size class over a [`BumpSlab`].
//! An allocation pops from the free list of its class and only falls back to
//! carving fresh memory from the slab when that list is empty. A release
//! recovers the block size from the slab and pushes the block onto the free
//! list of its class. Memory is never returned to the operating system.

use arrayvec::ArrayVec;
use size_class::{SizeClass, SizeClasses};
use snafu::{ResultExt as _, ensure};

use crate::{
    HeapConfig, MAX_CLASSES,
    bump::BumpSlab,
    error::{HeapError, MinSizeSnafu, SizeClassSnafu},
    free_list::FreeList,
    heap::Heap,
};

/// A size-classed heap with free-list reuse.
///
/// # Performance Characteristics
///
/// - O(1) allocation: a free-list pop, or a bump of the class cursor
/// - O(1) release: an address range check and a free-list push
/// - No per-block header; block sizes are recovered from addresses
///
/// # Thread Safety
///
/// The heap is `Send` but not `Sync`. Concurrent use requires external
/// synchronization.
#[derive(Debug)]
pub struct CheapHeap {
    classes: SizeClasses,
    min_size: usize,
    free_lists: ArrayVec<FreeList, MAX_CLASSES>,
    slab: BumpSlab,
}

impl CheapHeap {
    /// Creates a heap, reserving its backing address space.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        let classes = SizeClasses::new(config.size_classes).context(SizeClassSnafu)?;
        ensure!(
            config.min_size <= classes.max_size(),
            MinSizeSnafu {
                min_size: config.min_size,
                max_size: classes.max_size(),
            }
        );
        let slab = BumpSlab::new(classes, config.region_size)?;

        Ok(Self {
            classes,
            min_size: config.min_size,
            free_lists: (0..classes.num_classes()).map(|_| FreeList::new()).collect(),
            slab,
        })
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// Requests below the configured minimum are rounded up to it. A reused
    /// block keeps whatever contents it had when it was released.
    ///
    /// Returns `None` if `size` exceeds the largest size class or the class
    /// region is exhausted.
    #[inline]
    pub fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        let class = self.classes.lookup(size.max(self.min_size))?;
        if let Some(ptr) = self.free_lists[class.index()].pop() {
            return Some(ptr);
        }
        self.allocate_slow(class)
    }

    #[cold]
    #[inline(never)]
    fn allocate_slow(&mut self, class: SizeClass) -> Option<*mut u8> {
        self.slab.allocate(class)
    }

    /// Returns a block to the free list of its size class.
    ///
    /// Returns the size of the released block. Null pointers and pointers not
    /// issued by this heap are ignored and return `0`.
    ///
    /// # Safety
    ///
    /// If `ptr` was issued by this heap, it must not have been released since
    /// it was last returned by [`allocate`](Self::allocate), and it must not
    /// be accessed after this call.
    #[inline]
    pub unsafe fn release(&mut self, ptr: *mut u8) -> usize {
        if ptr.is_null() {
            return 0;
        }
        let size = self.slab.size_of(ptr);
        if size == 0 {
            return 0;
        }

        let Some(class) = self.classes.lookup(size) else {
            return 0;
        };
        debug_assert_eq!(class.size(), size);
        unsafe {
            self.free_lists[class.index()].push(ptr);
        }
        size
    }

    /// Returns the usable size of the block at `ptr`, or `0` if this heap
    /// did not issue it.
    #[inline]
    #[must_use]
    pub fn size_of(&self, ptr: *const u8) -> usize {
        self.slab.size_of(ptr)
    }

    /// Bytes held in free lists, waiting for reuse.
    #[must_use]
    pub fn idle_bytes(&self) -> usize {
        self.classes
            .iter()
            .zip(&self.free_lists)
            .map(|(class, list)| list.len() * class.size())
            .sum()
    }

    /// Number of free blocks held for `class`.
    #[must_use]
    pub fn free_count(&self, class: SizeClass) -> usize {
        self.free_lists[class.index()].len()
    }

    #[must_use]
    pub const fn size_classes(&self) -> &SizeClasses {
        &self.classes
    }

    #[must_use]
    pub const fn min_size(&self) -> usize {
        self.min_size
    }

    /// Bytes carved from the backing slab so far.
    #[must_use]
    pub fn carved_bytes(&self) -> usize {
        self.slab.carved_bytes()
    }

    /// Bytes of address space reserved by the backing slab.
    #[must_use]
    pub const fn reserved_bytes(&self) -> usize {
        self.slab.reserved_bytes()
    }
}

impl Heap for CheapHeap {
    const ALIGNMENT: usize = size_class::ALIGNMENT;

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
        Self::min_size(self)
    }
}
