//! Size-class arithmetic for bucketed heaps.
//!
//! A [`SizeClasses`] table maps every request size to exactly one class: a
//! dense index and the rounded byte size that every block of the class has.
//! Classes are strictly increasing in size, so a heap can keep one free list
//! per class and index it directly.
//!
//! # Class layout
//!
//! The table is derived from a [`SizeClassConfig`]:
//!
//! - Sizes up to `linear_limit` round up to the next multiple of
//!   `granularity`. These are the densely packed small classes.
//! - Sizes above `linear_limit` round up to the next power of two, up to
//!   `max_size`.
//!
//! For any request of at least `granularity` bytes the rounded size is at most
//! twice the request.
//!
//! # Examples
//!
//! ```
//! use size_class::{SizeClassConfig, SizeClasses};
//!
//! let classes = SizeClasses::new(SizeClassConfig::DEFAULT).unwrap();
//!
//! let class = classes.lookup(100).unwrap();
//! assert_eq!(class.size(), 112);
//! assert_eq!(classes.class(class.index()), class);
//!
//! // Anything above the configured maximum has no class.
//! assert!(classes.lookup(classes.max_size() + 1).is_none());
//! ```

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use snafu::{Location, Snafu, ensure};

/// Alignment every class size is a multiple of.
pub const ALIGNMENT: usize = 16;

/// Parameters of a size-class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeClassConfig {
    /// Step between consecutive small classes.
    ///
    /// Must be a power of two and a multiple of [`ALIGNMENT`].
    pub granularity: usize,
    /// Largest size served by the linear (multiple-of-granularity) classes.
    ///
    /// Must be a power of two not smaller than `granularity`.
    pub linear_limit: usize,
    /// Largest size that has a class at all.
    ///
    /// Must be a power of two not smaller than `linear_limit`.
    pub max_size: usize,
}

impl SizeClassConfig {
    /// 16-byte steps up to 1 KiB, powers of two up to 1 GiB.
    pub const DEFAULT: Self = Self {
        granularity: 16,
        linear_limit: 1024,
        max_size: 1024 * 1024 * 1024,
    };
}

impl Default for SizeClassConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Snafu)]
pub enum SizeClassError {
    #[snafu(display(
        "granularity {granularity} is not a power of two multiple of {ALIGNMENT}"
    ))]
    Granularity {
        granularity: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "linear limit {linear_limit} is not a power of two of at least {granularity}"
    ))]
    LinearLimit {
        linear_limit: usize,
        granularity: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("max size {max_size} is not a power of two of at least {linear_limit}"))]
    MaxSize {
        max_size: usize,
        linear_limit: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// One bucket of allocation sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass {
    index: usize,
    size: usize,
}

impl SizeClass {
    /// Dense index of the class, `0..num_classes`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Byte size of every block in the class.
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }
}

/// A validated size-class table.
///
/// The table is pure arithmetic; it holds no per-class storage and is cheap to
/// copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeClasses {
    granularity_shift: u32,
    linear_limit: usize,
    linear_limit_shift: u32,
    linear_classes: usize,
    max_size: usize,
    num_classes: usize,
}

impl SizeClasses {
    /// Builds the table for `config`.
    pub fn new(config: SizeClassConfig) -> Result<Self, SizeClassError> {
        let SizeClassConfig {
            granularity,
            linear_limit,
            max_size,
        } = config;

        ensure!(
            granularity.is_power_of_two() && granularity.is_multiple_of(ALIGNMENT),
            GranularitySnafu { granularity }
        );
        ensure!(
            linear_limit.is_power_of_two() && linear_limit >= granularity,
            LinearLimitSnafu {
                linear_limit,
                granularity
            }
        );
        ensure!(
            max_size.is_power_of_two() && max_size >= linear_limit,
            MaxSizeSnafu {
                max_size,
                linear_limit
            }
        );

        let granularity_shift = granularity.trailing_zeros();
        let linear_limit_shift = linear_limit.trailing_zeros();
        let linear_classes = linear_limit >> granularity_shift;
        let geometric_classes = (max_size.trailing_zeros() - linear_limit_shift) as usize;

        Ok(Self {
            granularity_shift,
            linear_limit,
            linear_limit_shift,
            linear_classes,
            max_size,
            num_classes: linear_classes + geometric_classes,
        })
    }

    /// Number of classes in the table.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[must_use]
    pub const fn granularity(&self) -> usize {
        1 << self.granularity_shift
    }

    #[must_use]
    pub const fn linear_limit(&self) -> usize {
        self.linear_limit
    }

    /// Largest request that has a class.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the class serving a request of `size` bytes.
    ///
    /// A zero-byte request is served by the smallest class. Returns `None` if
    /// `size` exceeds [`max_size`](Self::max_size).
    #[inline]
    #[must_use]
    pub fn lookup(&self, size: usize) -> Option<SizeClass> {
        let size = size.max(1);
        if size <= self.linear_limit {
            let rounded = size.next_multiple_of(self.granularity());
            return Some(SizeClass {
                index: (rounded >> self.granularity_shift) - 1,
                size: rounded,
            });
        }
        if size > self.max_size {
            return None;
        }

        let rounded = size.next_power_of_two();
        let steps = (rounded.trailing_zeros() - self.linear_limit_shift) as usize;
        Some(SizeClass {
            index: self.linear_classes - 1 + steps,
            size: rounded,
        })
    }

    /// Returns the class with the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`num_classes`](Self::num_classes).
    #[inline]
    #[must_use]
    pub fn class(&self, index: usize) -> SizeClass {
        assert!(
            index < self.num_classes,
            "size class {index} out of range ({} classes)",
            self.num_classes
        );
        let size = if index < self.linear_classes {
            (index + 1) << self.granularity_shift
        } else {
            self.linear_limit << (index + 1 - self.linear_classes)
        };
        SizeClass { index, size }
    }

    /// Iterates over all classes in increasing size order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = SizeClass> + use<> {
        let classes = *self;
        (0..self.num_classes).map(move |index| classes.class(index))
    }
}
