use crate::format::FormatErr;
use oap_buffer_types::BufferResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileErr {
    #[error("IO Error: {0}")]
    IoError(#[source] std::io::Error),
    #[error("Directory {0} is not writable: {1}")]
    DirectoryUnwritable(String, #[source] std::io::Error),
    #[error("Failed to clean directory {0}: {1}")]
    CleanFailed(String, #[source] std::io::Error),
    #[error("FormatErr: {0}")]
    FormatErr(#[from] FormatErr),
    #[error("Record of {size} bytes exceeds the limit of {limit} bytes")]
    RecordTooLarge { size: usize, limit: usize },
    #[error("Writer Ended")]
    WriterEnded,
    #[error("Task Dead ({0})")]
    TaskDead(&'static str),
}

pub type FileResult<T> = BufferResult<T, FileErr>;
