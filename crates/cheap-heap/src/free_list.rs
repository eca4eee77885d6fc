//! Intrusive LIFO free list.
//!
//! A [`FreeList`] holds released blocks of a single size class. The link to
//! the next free block is stored in the first word of each free block itself,
//! so the list needs no storage of its own beyond the head pointer and a
//! counter.
//!
//! ```text
//! head ──► ┌──────────────┬─────────┐    ┌──────────────┬─────────┐
//!          │ next ────────┼──► ...  │ ─► │ next: null   │         │
//!          └──────────────┴─────────┘    └──────────────┴─────────┘
//! ```
//!
//! The previous contents of a block beyond its first word are left untouched
//! by [`push`](FreeList::push) and [`pop`](FreeList::pop).

use core::ptr;

/// Link stored at the start of every free block.
#[derive(Debug)]
struct FreeNode {
    next: *mut Self,
}

/// A LIFO stack of free blocks belonging to one size class.
///
/// The list is `Send` but not `Sync`; concurrent access requires external
/// synchronization.
#[derive(Debug)]
pub struct FreeList {
    head: *mut FreeNode,
    len: usize,
}

unsafe impl Send for FreeList {}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeList {
    /// Creates an empty free list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            len: 0,
        }
    }

    /// Number of blocks currently held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Makes `block` the next block returned by [`pop`](Self::pop).
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `block` is non-null, aligned for a pointer, and valid for writes of
    ///   at least one pointer
    /// - `block` belongs to the size class this list serves
    /// - `block` is not already in this or any other free list
    /// - nothing accesses `block` until it is popped again
    pub unsafe fn push(&mut self, block: *mut u8) {
        #[expect(clippy::cast_ptr_alignment)]
        let node = block.cast::<FreeNode>();
        debug_assert!(!node.is_null(), "free block must not be null");
        debug_assert!(node.is_aligned(), "free block must be pointer aligned");

        unsafe {
            node.write(FreeNode { next: self.head });
        }
        self.head = node;
        self.len += 1;
    }

    /// Removes and returns the most recently pushed block.
    #[inline]
    pub fn pop(&mut self) -> Option<*mut u8> {
        if self.head.is_null() {
            return None;
        }

        let node = self.head;
        unsafe {
            self.head = (*node).next;
        }
        self.len -= 1;
        Some(node.cast())
    }
}
