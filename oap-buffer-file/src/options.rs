use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{FileErr, FileResult};
use oap_buffer_types::{BufferErr, BufferKey};

pub const DEFAULT_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_MAX_RECORD_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Options of one buffer. A buffer directory must not be shared by two running buffers.
pub struct BufferOptions {
    directory: PathBuf,
    max_segment_size: u64,
    max_record_size: usize,
    clean_on_restart: bool,
    poll_interval: Duration,
    cleanup_interval: Duration,
}

impl BufferOptions {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            max_segment_size: DEFAULT_SEGMENT_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            clean_on_restart: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    /// One directory per kind of data, under a common base.
    pub fn for_key<P: AsRef<Path>>(base: P, key: &BufferKey) -> Self {
        Self::new(base.as_ref().join(key.name()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// A segment is rotated once it grows beyond this many bytes.
    pub fn set_max_segment_size(&mut self, v: u64) -> FileResult<&mut Self> {
        if v == 0 {
            return Err(invalid("max_segment_size must be positive"));
        }
        self.max_segment_size = v;
        Ok(self)
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Larger records are refused by the writer, and larger frames are treated as garbage by the reader.
    pub fn set_max_record_size(&mut self, v: usize) -> FileResult<&mut Self> {
        if v == 0 {
            return Err(invalid("max_record_size must be positive"));
        }
        self.max_record_size = v;
        Ok(self)
    }

    pub fn clean_on_restart(&self) -> bool {
        self.clean_on_restart
    }

    /// Erase the directory, records and markers included, before initializing.
    pub fn set_clean_on_restart(&mut self, v: bool) -> &mut Self {
        self.clean_on_restart = v;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long the reader sleeps after it has caught up with the writer.
    pub fn set_poll_interval(&mut self, v: Duration) -> FileResult<&mut Self> {
        if v.is_zero() {
            return Err(invalid("poll_interval must be positive"));
        }
        self.poll_interval = v;
        Ok(self)
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn set_cleanup_interval(&mut self, v: Duration) -> FileResult<&mut Self> {
        if v.is_zero() {
            return Err(invalid("cleanup_interval must be positive"));
        }
        self.cleanup_interval = v;
        Ok(self)
    }

    /// Checks the combination of options. Individual values are checked by the setters already.
    pub fn validate(&self) -> FileResult<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(invalid("directory must not be empty"));
        }
        if self.max_record_size as u64 > self.max_segment_size {
            return Err(invalid(&format!(
                "max_record_size ({}) exceeds max_segment_size ({})",
                self.max_record_size, self.max_segment_size
            )));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> BufferErr<FileErr> {
    BufferErr::InvalidOption(msg.to_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_options() {
        let key: BufferKey = "trace-segment".parse().unwrap();
        let mut options = BufferOptions::for_key("/var/buffer", &key);
        assert_eq!(options.directory(), Path::new("/var/buffer/trace-segment"));
        assert_eq!(options.max_segment_size(), DEFAULT_SEGMENT_SIZE);
        assert_eq!(options.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(!options.clean_on_restart());
        options.validate().unwrap();

        assert!(matches!(
            options.set_max_segment_size(0),
            Err(BufferErr::InvalidOption(_))
        ));
        assert!(options.set_poll_interval(Duration::ZERO).is_err());
        assert_eq!(options.max_segment_size(), DEFAULT_SEGMENT_SIZE);

        options
            .set_max_segment_size(1024)
            .unwrap()
            .set_max_record_size(1024)
            .unwrap()
            .set_clean_on_restart(true);
        options.validate().unwrap();

        options.set_max_record_size(1025).unwrap();
        assert!(matches!(
            options.validate(),
            Err(BufferErr::InvalidOption(_))
        ));

        assert!(BufferOptions::new("").validate().is_err());
    }
}
