/// Ratio the sampling interval is multiplied by when the malloc and free
/// trigger counts are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalScale {
    pub numerator: usize,
    pub denominator: usize,
}

impl IntervalScale {
    /// Leaves the interval unchanged.
    pub const IDENTITY: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Scales `interval`, saturating on overflow and never going below `1`.
    #[must_use]
    pub const fn apply(self, interval: usize) -> usize {
        let scaled = interval.saturating_mul(self.numerator) / self.denominator;
        if scaled == 0 { 1 } else { scaled }
    }
}

impl Default for IntervalScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Parameters of a [`SampleHeap`](crate::SampleHeap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleConfig {
    /// Bytes allocated (or freed) between two triggers of a channel.
    pub interval_bytes: usize,
    pub interval_scale: IntervalScale,
    /// Directory holding the signal log.
    pub log_dir: &'static str,
    /// File name of the signal log, before the process id.
    pub log_prefix: &'static str,
}

impl SampleConfig {
    /// Samples every 10,485,767 bytes into `/tmp/scalene-malloc-signal<pid>`.
    pub const DEFAULT: Self = Self {
        interval_bytes: 10_485_767,
        interval_scale: IntervalScale::IDENTITY,
        log_dir: "/tmp",
        log_prefix: "scalene-malloc-signal",
    };
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
