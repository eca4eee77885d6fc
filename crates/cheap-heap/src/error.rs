use size_class::SizeClassError;
use snafu::{Location, Snafu};

use crate::MAX_CLASSES;

/// Failure to construct a heap.
///
/// Allocation and release never fail with an error: they report exhaustion
/// as `None` and unknown pointers as size `0`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HeapError {
    #[snafu(display("invalid size classes: {source}"))]
    SizeClass {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: SizeClassError,
    },
    #[snafu(display("{num_classes} size classes exceed the supported {MAX_CLASSES}"))]
    TooManyClasses {
        num_classes: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("minimum size {min_size} exceeds the largest size class {max_size}"))]
    MinSize {
        min_size: usize,
        max_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "region size {region_size} is not a multiple of the page size {page_size} holding a \
         {max_size}-byte block"
    ))]
    RegionSize {
        region_size: usize,
        page_size: usize,
        max_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{num_classes} regions of {region_size} bytes overflow the address space"))]
    ReservationOverflow {
        region_size: usize,
        num_classes: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to reserve {len} bytes of address space"))]
    Reserve {
        len: usize,
        #[snafu(implicit)]
        location: Location,
    },
}
