//! Signal channels used to wake an external profiler.
//!
//! Each [`Channel`] owns one POSIX signal. The signals carry no payload: they
//! only tell the profiler that a new record is waiting in the signal log.
//! Until the profiler installs its own handler the signals are ignored, so
//! raising one is harmless.
//!
//! Only one sampling heap per process should own the channels; the handler
//! disposition is process-wide state.

use std::io;

use libc::c_int;

/// Direction of the byte volume a record reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, derive_more::IsVariant,
)]
pub enum Channel {
    /// Bytes allocated.
    #[display("M")]
    Malloc,
    /// Bytes released.
    #[display("F")]
    Free,
}

impl Channel {
    /// Signal raised when the channel's sampling interval is crossed.
    #[must_use]
    pub const fn signal(self) -> c_int {
        match self {
            Self::Malloc => libc::SIGXCPU,
            Self::Free => libc::SIGXFSZ,
        }
    }

    /// Parses the single-character marker used in the signal log.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "M" => Some(Self::Malloc),
            "F" => Some(Self::Free),
            _ => None,
        }
    }

    /// Sets the channel's signal disposition to "ignore".
    ///
    /// Any handler installed before is replaced.
    pub(crate) fn ignore(self) -> io::Result<()> {
        let previous = unsafe { libc::signal(self.signal(), libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Delivers the channel's signal to the current process.
    pub(crate) fn raise(self) {
        cfg_if::cfg_if! {
            if #[cfg(feature = "disable-signals")] {
                let _ = self;
            } else {
                unsafe {
                    libc::raise(self.signal());
                }
            }
        }
    }
}
