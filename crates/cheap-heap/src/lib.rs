//! A size-classed heap over a bump-pointer slab.
//!
//! This crate provides [`CheapHeap`], a fast and deterministic allocator that
//! rounds every request to a size class, keeps one free list per class, and
//! carves fresh memory from a pre-reserved [`BumpSlab`] only when a free list
//! is empty. Block sizes are recovered from addresses alone, so blocks carry
//! no header and releasing a pointer the heap never issued is a harmless
//! no-op.
//!
//! # Layers
//!
//! Every layer implements the [`Heap`] capability: `allocate`, `release`,
//! `size_of` and `min_size`. Decorators (such as a sampling layer) wrap any
//! `Heap` and expose the same shape, so layers stack by composition.
//!
//! # Usage Example
//!
//! ```rust
//! use cheap_heap::{CheapHeap, HeapConfig};
//! use size_class::SizeClassConfig;
//!
//! let mut heap = CheapHeap::new(HeapConfig {
//!     size_classes: SizeClassConfig {
//!         granularity: 16,
//!         linear_limit: 1024,
//!         max_size: 1024 * 1024,
//!     },
//!     region_size: 1024 * 1024,
//!     min_size: 16,
//! })
//! .unwrap();
//!
//! let ptr = heap.allocate(600).unwrap();
//! assert_eq!(heap.size_of(ptr), 608);
//!
//! unsafe {
//!     assert_eq!(heap.release(ptr), 608);
//! }
//! assert_eq!(heap.idle_bytes(), 608);
//!
//! // Released blocks are reused last-in, first-out.
//! assert_eq!(heap.allocate(600), Some(ptr));
//! ```
//!
//! # Thread Safety
//!
//! Heaps take `&mut self` and never lock. Share one between threads through
//! [`LockedHeap`], or give each execution context its own heap.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use self::{
    bump::BumpSlab, cheap_heap::CheapHeap, config::HeapConfig, error::HeapError,
    free_list::FreeList, global::LockedHeap, heap::Heap,
};

pub mod bump;
mod cheap_heap;
mod config;
mod error;
pub mod free_list;
pub mod global;
mod heap;

/// Largest number of size classes a heap supports.
pub const MAX_CLASSES: usize = 128;
