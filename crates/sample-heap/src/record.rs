//! Signal log records.
//!
//! Each trigger appends one line to the signal log:
//!
//! ```text
//! <marker>,<sequence>,<bytes>\n
//! ```
//!
//! `marker` is `M` for the malloc channel and `F` for the free channel,
//! `sequence` is the total number of triggers on both channels including this
//! one, and `bytes` is the accumulated byte count that crossed the interval.

use std::{fmt, fs, num::ParseIntError, path::Path, str::FromStr};

use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::{
    channel::Channel,
    error::{ReadLogError, ReadSnafu, RecordSnafu},
};

/// One trigger of a sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    pub channel: Channel,
    pub sequence: u64,
    pub bytes: usize,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.channel, self.sequence, self.bytes)
    }
}

#[derive(Debug, Snafu)]
pub enum ParseRecordError {
    #[snafu(display("record is missing the {field} field"))]
    MissingField { field: &'static str },
    #[snafu(display("unknown channel marker {marker:?}"))]
    UnknownChannel { marker: String },
    #[snafu(display("invalid {field} field"))]
    InvalidNumber {
        field: &'static str,
        source: ParseIntError,
    },
    #[snafu(display("record has more than three fields"))]
    TrailingField,
}

impl FromStr for Record {
    type Err = ParseRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(',');
        let marker = fields.next().context(MissingFieldSnafu { field: "channel" })?;
        let channel = Channel::from_marker(marker).context(UnknownChannelSnafu { marker })?;
        let sequence = fields
            .next()
            .context(MissingFieldSnafu { field: "sequence" })?
            .parse()
            .context(InvalidNumberSnafu { field: "sequence" })?;
        let bytes = fields
            .next()
            .context(MissingFieldSnafu { field: "bytes" })?
            .parse()
            .context(InvalidNumberSnafu { field: "bytes" })?;
        ensure!(fields.next().is_none(), TrailingFieldSnafu);

        Ok(Self {
            channel,
            sequence,
            bytes,
        })
    }
}

/// Reads every record of a signal log.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>, ReadLogError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).context(ReadSnafu { path })?;
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| line.parse::<Record>().context(RecordSnafu { line: index + 1 }))
        .collect()
}
