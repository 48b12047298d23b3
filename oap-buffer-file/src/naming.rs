use std::{
    cmp::Ordering,
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::FileErr;
use oap_buffer_runtime::file::list_dir;
use oap_buffer_types::{Timestamp, FILE_TIMESTAMP_FORMAT};

pub const DATA_FILE_PREFIX: &str = "data";
pub const FILE_EXTENSION: &str = "sw";

/// Width of the zero-padded sequence number, so that names sort like their numbers.
const SEQ_WIDTH: usize = 20;

/// Identifies a segment file in a buffer directory.
///
/// Segments are named `data_<seq>_<created at>.sw`. The sequence number alone decides the order;
/// the timestamp is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId {
    seq: u64,
    name: Arc<String>,
}

impl SegmentId {
    pub fn new(seq: u64, created_at: Timestamp) -> Self {
        let created_at = created_at
            .format(FILE_TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| "0".repeat(17));
        Self {
            seq,
            name: Arc::new(format!(
                "{DATA_FILE_PREFIX}_{seq:0width$}_{created_at}.{FILE_EXTENSION}",
                width = SEQ_WIDTH
            )),
        }
    }

    /// Returns None if this is not the name of a segment file.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name
            .strip_prefix(DATA_FILE_PREFIX)?
            .strip_prefix('_')?
            .strip_suffix(FILE_EXTENSION)?
            .strip_suffix('.')?;
        let (seq, created_at) = stem.split_once('_')?;
        if seq.len() != SEQ_WIDTH
            || !seq.bytes().all(|b| b.is_ascii_digit())
            || created_at.is_empty()
            || !created_at.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self {
            seq: seq.parse().ok()?,
            name: Arc::new(name.to_owned()),
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn path(&self, directory: &Path) -> PathBuf {
        directory.join(self.name.as_str())
    }

    /// The segment to create after this one.
    pub fn succ(&self) -> Self {
        Self::new(self.seq + 1, Timestamp::now_utc())
    }
}

impl Ord for SegmentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for SegmentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// All segments in the directory, oldest first. A missing directory has no segments.
pub async fn scan_segments(directory: &Path) -> Result<Vec<SegmentId>, FileErr> {
    let names = match list_dir(directory).await {
        Ok(names) => names,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FileErr::IoError(e)),
    };
    let mut segments: Vec<SegmentId> = names.iter().filter_map(|n| SegmentId::parse(n)).collect();
    segments.sort();
    Ok(segments)
}

/// The first segment to create in a directory holding `existing` (sorted) segments.
pub fn next_segment(existing: &[SegmentId], at_least_after: Option<&SegmentId>) -> SegmentId {
    let newest = existing.last().into_iter().chain(at_least_after).max();
    match newest {
        Some(newest) => newest.succ(),
        None => SegmentId::new(1, Timestamp::now_utc()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_segment_name() {
        let ts = time::macros::datetime!(2018-08-27 11:59:45.261 UTC);
        let id = SegmentId::new(1, ts);
        assert_eq!(
            id.file_name(),
            "data_00000000000000000001_20180827115945261.sw"
        );
        assert_eq!(SegmentId::parse(id.file_name()), Some(id.clone()));
        assert_eq!(id.seq(), 1);
        assert_eq!(
            id.path(Path::new("/tmp/buffer")),
            PathBuf::from("/tmp/buffer/data_00000000000000000001_20180827115945261.sw")
        );

        assert_eq!(SegmentId::parse("offset_write.sw"), None);
        assert_eq!(SegmentId::parse("offset_write.sw.tmp"), None);
        assert_eq!(SegmentId::parse("data_1_20180827115945261.sw"), None);
        assert_eq!(
            SegmentId::parse("data_0000000000000000000x_20180827115945261.sw"),
            None
        );
        assert_eq!(
            SegmentId::parse("data_00000000000000000001_.sw"),
            None
        );
    }

    #[test]
    fn test_segment_order() {
        let early = time::macros::datetime!(2030-01-01 00:00:00 UTC);
        let late = time::macros::datetime!(2018-01-01 00:00:00 UTC);
        // a clock going backwards does not affect the order
        let a = SegmentId::new(9, early);
        let b = SegmentId::new(10, late);
        assert!(a < b);
        assert!(a.file_name() < b.file_name());

        let mut ids = vec![b.clone(), a.clone()];
        ids.sort();
        assert_eq!(ids, vec![a.clone(), b.clone()]);

        assert_eq!(next_segment(&[], None).seq(), 1);
        assert_eq!(next_segment(&ids, None).seq(), 11);
        assert_eq!(next_segment(&[a.clone()], Some(&b)).seq(), 11);
        assert_eq!(next_segment(&[b], Some(&a)).seq(), 11);
    }
}
