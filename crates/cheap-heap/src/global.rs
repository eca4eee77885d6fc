//! `GlobalAlloc` adapter.
//!
//! [`LockedHeap`] serializes access to any [`Heap`] behind a spin lock and
//! builds the heap lazily on first use, so it can be declared as a `static`
//! and installed with `#[global_allocator]`.
//!
//! The initializer runs while the first allocation is in flight and must not
//! allocate through the global allocator itself.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr,
};

use spin::{Mutex, Once};

use crate::heap::Heap;

/// A heap shared between execution contexts through a spin lock.
pub struct LockedHeap<H> {
    heap: Once<Mutex<H>>,
    init: fn() -> Option<H>,
}

impl<H> LockedHeap<H> {
    /// Creates an adapter that builds its heap with `init` on first use.
    ///
    /// If `init` returns `None`, the allocation that triggered it fails and
    /// the next one retries.
    #[must_use]
    pub const fn new(init: fn() -> Option<H>) -> Self {
        Self {
            heap: Once::new(),
            init,
        }
    }

    /// Runs `f` with exclusive access to the heap.
    ///
    /// Returns `None` if the heap could not be built.
    pub fn with<R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        let heap = self
            .heap
            .try_call_once(|| (self.init)().map(Mutex::new).ok_or(()))
            .ok()?;
        Some(f(&mut heap.lock()))
    }
}

unsafe impl<H> GlobalAlloc for LockedHeap<H>
where
    H: Heap + Send,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > H::ALIGNMENT {
            return ptr::null_mut();
        }
        self.with(|heap| heap.allocate(layout.size()))
            .flatten()
            .unwrap_or(ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.with(|heap| unsafe { heap.release(ptr) });
    }
}
