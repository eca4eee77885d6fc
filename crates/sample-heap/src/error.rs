use std::{io, path::PathBuf};

use arrayvec::ArrayString;
use cheap_heap::HeapError;
use libc::c_int;
use snafu::{Location, Snafu};

use crate::{channel::Channel, record::ParseRecordError, signal_log::MAX_PATH_LEN};

/// Failure to construct a [`SampleHeap`](crate::SampleHeap).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SampleHeapError {
    #[snafu(display("failed to build the wrapped heap"))]
    Heap {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: HeapError,
    },
    #[snafu(display("sampling interval must not be zero"))]
    ZeroInterval {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("interval scale {numerator}/{denominator} has a zero term"))]
    ZeroScale {
        numerator: usize,
        denominator: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to ignore signal {signal} of the {channel} channel"))]
    IgnoreSignal {
        channel: Channel,
        signal: c_int,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: io::Error,
    },
    #[snafu(display("signal log path {dir}/{prefix}<pid> is too long"))]
    LogPath {
        dir: &'static str,
        prefix: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to create signal log {path}"))]
    CreateLog {
        path: ArrayString<MAX_PATH_LEN>,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: io::Error,
    },
}

/// Failure to read back a signal log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReadLogError {
    #[snafu(display("failed to read signal log {}", path.display()))]
    Read {
        path: PathBuf,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: io::Error,
    },
    #[snafu(display("malformed record on line {line}"))]
    Record {
        line: usize,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: ParseRecordError,
    },
}
