//! Test configuration: well-known property keys, the layered [`Properties`]
//! store, and the [`Protocol`] test media files are reached through.

pub mod keys;
mod properties;

pub use properties::Properties;

use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;

/// Transport a test media file is reachable through.
///
/// The scheme decides which configured file root a relative media path is
/// resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Local filesystem, `file://`.
    File,
    /// Plain HTTP, `http://`.
    Http,
    /// HTTP over TLS, `https://`.
    Https,
    /// Amazon S3 or compatible, `s3://`.
    S3,
    /// MongoDB GridFS, `mongodb://`.
    Mongodb,
}

impl Protocol {
    /// URI scheme, without the `://` separator.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::File => "file",
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::S3 => "s3",
            Protocol::Mongodb => "mongodb",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Protocol::File),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "s3" => Ok(Protocol::S3),
            "mongodb" => Ok(Protocol::Mongodb),
            other => Err(HarnessError::config(format!("unknown protocol '{other}'"))),
        }
    }
}
