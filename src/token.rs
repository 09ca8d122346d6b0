//! Daily authentication token.
//!
//! The token is the lowercase hex SHA-512 digest of
//! `username ‖ YYYY/MM/DD ‖ secret`. The service recomputes it with its own
//! notion of "today", so a token is good for one calendar day.

use chrono::{Local, NaiveDate};
use sha2::{Digest, Sha512};

/// Format used for the date component of the token.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Renders `date` as zero-padded `YYYY/MM/DD`.
pub fn date_stamp(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a `YYYY/MM/DD` stamp back into a calendar date.
pub fn parse_date_stamp(stamp: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(stamp, DATE_FORMAT).ok()
}

/// Today's date in the host's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Derives the 128-character token for `username` on `date`.
pub fn derive(username: &str, secret: &str, date: NaiveDate) -> String {
    let mut hasher = Sha512::new();
    hasher.update(username.as_bytes());
    hasher.update(date_stamp(date).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
