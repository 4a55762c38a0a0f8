//! Live HTTP messages passed through the interceptor

mod body;
mod request;
mod response;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use body::{buffer_body, Body};
pub use request::{HttpRequest, MultipartForm};
pub use response::HttpResponse;

use crate::{Result, TapeError};

/// Header name to list of values
///
/// Names are kept sorted; values under one name keep the order they were added.
pub type HeaderMultimap = BTreeMap<String, Vec<String>>;

/// Form field name to list of values
pub type ValueMap = BTreeMap<String, Vec<String>>;

/// HTTP protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl Version {
    /// HTTP/1.0
    pub const HTTP_10: Self = Self { major: 1, minor: 0 };
    /// HTTP/1.1
    pub const HTTP_11: Self = Self { major: 1, minor: 1 };
    /// HTTP/2.0
    pub const HTTP_2: Self = Self { major: 2, minor: 0 };
}

impl Default for Version {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TapeError::InvalidFormat(format!("Invalid protocol version: {s}"));

        let rest = s.strip_prefix("HTTP/").ok_or_else(invalid)?;
        let (major, minor) = rest.split_once('.').unwrap_or((rest, "0"));
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Append a value under a header name
pub fn add_header(headers: &mut HeaderMultimap, name: &str, value: impl Into<String>) {
    headers
        .entry(name.to_string())
        .or_default()
        .push(value.into());
}

/// First value of a header, matching the name case-insensitively
#[must_use]
pub fn header_value<'a>(headers: &'a HeaderMultimap, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}
