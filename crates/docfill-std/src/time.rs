//! Time utilities.

use chrono::{DateTime, Local, TimeZone};

/// The layout of timestamps embedded into generated file names, e.g.
/// `20240131_174502`.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Returns the current local time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Formats a time as a file name stamp.
pub fn file_stamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(FILE_STAMP_FORMAT).to_string()
}
