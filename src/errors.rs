//! Error taxonomy for the daemon.
//!
//! Kept as a flat enum with a hand-written `Display`/`std::error::Error`
//! impl rather than pulling in a derive crate for it, the same
//! low-ceremony approach `derive_builder`-based cron-pattern crates in
//! this ecosystem tend to use for their own error types.

use std::fmt;

#[derive(Debug)]
pub enum CronError {
    /// A schedule field failed to parse; carries the 1-based line number
    /// of the offending crontab line and a human-readable reason.
    InvalidPattern { lineno: u32, reason: String },
    /// `localtime`/`mktime`-equivalent recomposition produced no valid
    /// local time even after folding forward across a DST gap.
    InvalidDate,
    /// The day-axis search in `update_job` exceeded `MAX_LOOKAHEAD`
    /// day-advances without finding a valid date.
    LookaheadExceeded,
    /// Reading the crontab file failed (open/stat/read).
    Io(std::io::Error),
}

impl fmt::Display for CronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronError::InvalidPattern { lineno, reason } => {
                write!(f, "line {lineno}: {reason}")
            }
            CronError::InvalidDate => write!(f, "encountered an invalid date"),
            CronError::LookaheadExceeded => {
                write!(f, "exceeded the maximum lookahead while searching for a fire time")
            }
            CronError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for CronError {}

impl From<std::io::Error> for CronError {
    fn from(e: std::io::Error) -> Self {
        CronError::Io(e)
    }
}
