//! Statistical allocation sampling for heap profilers.
//!
//! [`SampleHeap`] wraps any [`Heap`] and counts the bytes that flow through
//! it in each direction. Every time the allocated (or released) byte count
//! crosses the sampling interval, it appends a [`Record`] to a per-process
//! signal log and raises a signal on the matching [`Channel`]. A profiler
//! installs handlers for the two signals and reads the log to learn how much
//! memory moved since the last sample.
//!
//! # Signal Log
//!
//! The log lives at `<log_dir>/<log_prefix><pid>`, by default
//! `/tmp/scalene-malloc-signal<pid>`. It is created when the heap is built and
//! removed when the heap is dropped. Each line is one record:
//!
//! ```text
//! M,1,10485824
//! F,2,10485776
//! ```
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use cheap_heap::HeapConfig;
//! use sample_heap::{SampleConfig, SampleHeap, read_records};
//!
//! let mut heap = SampleHeap::with_config(
//!     HeapConfig::DEFAULT,
//!     SampleConfig {
//!         interval_bytes: 1000,
//!         ..SampleConfig::DEFAULT
//!     },
//! )
//! .unwrap();
//!
//! heap.allocate(600).unwrap();
//! heap.allocate(500).unwrap();
//!
//! let records = read_records(heap.log_path()).unwrap();
//! assert_eq!(records[0].to_string(), "M,1,1120");
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[macro_use]
pub mod log;

mod channel;
mod config;
mod error;
mod record;
mod sample_heap;
mod signal_log;

pub use cheap_heap::Heap;

pub use self::{
    channel::Channel,
    config::{IntervalScale, SampleConfig},
    error::{ReadLogError, SampleHeapError},
    record::{ParseRecordError, Record, read_records},
    sample_heap::{SampleHeap, SamplingStats},
    signal_log::{MAX_PATH_LEN, SignalLog},
};
