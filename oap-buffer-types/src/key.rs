use std::{fmt::Display, str::FromStr, sync::Arc};
pub use time::OffsetDateTime as Timestamp;

use crate::BufferKeyErr;

/// Maximum string length of a buffer key.
pub const MAX_BUFFER_KEY_LEN: usize = 249;

/// Compact format for embedding a Timestamp in a file name, e.g. `20180827115945261`.
pub const FILE_TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] = time::macros::format_description!(
    "[year][month][day][hour][minute][second][subsecond digits:3]"
);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies a logical buffer, one per upstream data kind (e.g. `segment`, `jvm-metric`).
pub struct BufferKey {
    name: Arc<String>,
}

impl BufferKey {
    pub fn new<S: Into<String>>(key: S) -> Result<Self, BufferKeyErr> {
        let key = key.into();
        if is_valid_buffer_key(key.as_str()) {
            Ok(Self {
                name: Arc::new(key),
            })
        } else {
            Err(BufferKeyErr::InvalidBufferKey)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for BufferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl FromStr for BufferKey {
    type Err = BufferKeyErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BufferKey::new(s)
    }
}

/// A key names a directory, so it must be non-empty and must not be `.` or `..`.
pub fn is_valid_buffer_key(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_BUFFER_KEY_LEN
        && s != "."
        && s != ".."
        && s.chars().all(is_valid_buffer_key_char)
}

/// Returns true if this character can be used in a buffer key.
pub fn is_valid_buffer_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_buffer_key() {
        assert_eq!(BufferKey::new("segment").unwrap().name(), "segment");
        assert!(BufferKey::new("jvm-metric_v2.1").is_ok());
        assert!(BufferKey::new("").is_err());
        assert!(BufferKey::new("..").is_err());
        assert!(BufferKey::new("a/b").is_err());
        assert!(BufferKey::new("x".repeat(MAX_BUFFER_KEY_LEN + 1)).is_err());
        assert!("trace".parse::<BufferKey>().is_ok());
    }

    #[test]
    fn test_file_timestamp() {
        let ts = time::macros::datetime!(2018-08-27 11:59:45.261 UTC);
        assert_eq!(ts.format(FILE_TIMESTAMP_FORMAT).unwrap(), "20180827115945261");
    }
}
