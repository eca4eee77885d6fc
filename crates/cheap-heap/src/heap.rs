//! The allocator capability shared by every heap layer.

/// A heap that hands out blocks by size and recovers block sizes from
/// addresses alone.
///
/// Layers compose by wrapping: a decorator holds an inner `Heap` and forwards
/// to it, so every layer exposes the same three operations.
///
/// Heaps take `&mut self` and perform no locking. Sharing one between
/// execution contexts requires external serialization, such as
/// [`LockedHeap`](crate::global::LockedHeap).
pub trait Heap {
    /// Alignment of every block returned by [`allocate`](Self::allocate).
    const ALIGNMENT: usize;

    /// Allocates a block of at least `size` bytes.
    ///
    /// Returns `None` when the heap cannot satisfy the request.
    fn allocate(&mut self, size: usize) -> Option<*mut u8>;

    /// Returns a block to the heap and reports its recovered size.
    ///
    /// Null pointers and pointers the heap does not recognize are ignored and
    /// report `0`.
    ///
    /// # Safety
    ///
    /// If `ptr` was issued by this heap, it must be live: not released since
    /// it was last returned by [`allocate`](Self::allocate). The block must
    /// not be accessed after this call.
    unsafe fn release(&mut self, ptr: *mut u8) -> usize;

    /// Returns the usable size of the block at `ptr`, or `0` if the heap did
    /// not issue it.
    fn size_of(&self, ptr: *const u8) -> usize;

    /// Smallest block size the heap hands out.
    ///
    /// Requests below it are served as if they asked for it, so only requests
    /// of at least this size are bounded to twice their size.
    fn min_size(&self) -> usize;
}
