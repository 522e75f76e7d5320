//! Error types for totem-core.

use thiserror::Error;

/// Result type for totem-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating tribe data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A value supplied by the caller was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A habit index outside `0..HABITS_PER_DAY`.
    #[error("habit index {0} out of range (expected 0..5)")]
    HabitIndex(usize),

    /// A date or month key that does not parse.
    #[error("invalid date key: {0}")]
    InvalidDate(String),

    /// A timezone name the tz database does not know.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}
