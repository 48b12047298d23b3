//! ### `oap-buffer-file`: Disk-backed durable buffer
//!
//! A buffer sits between the handlers receiving telemetry and the layer persisting it. Records are
//! appended to segment files in a directory, and read back in order by a reader following the writer.
//! Two small marker files remember how far the writer and the reader got, so that nothing
//! acknowledged is lost when the process crashes.
//!
//! ```ignore
//! /var/oap/buffer/trace-segment
//! ├── data_00000000000000000001_20180827115945261.sw
//! ├── data_00000000000000000002_20180827120211009.sw
//! ├── offset_read.sw
//! └── offset_write.sw
//! ```
//!
//! Delivery is at-least-once: after a crash, a record may be delivered again.
//!
//! + [`BufferStream`] owns the writer and reader tasks of one directory
//! + [`AppendWriter`] and [`TailReader`] can also be used on their own
//! + [`format`] describes the bytes on disk

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

mod error;
pub mod format;
mod marker;
mod naming;
mod options;
mod reader;
mod stream;
#[cfg(all(test, any(feature = "runtime-tokio", feature = "runtime-async-std")))]
mod test_util;
mod writer;

pub use error::*;
pub use format::{
    encode_frame, frame_size, header_size, read_frame_header, FormatErr, FrameHeader, FrameIter,
    MAX_VARINT_LEN,
};
pub use marker::*;
pub use naming::*;
pub use options::*;
pub use reader::*;
pub use stream::*;
pub use writer::*;

/// Re-export for the executables and for callers feeding the buffer from a thread.
pub mod export {
    pub use flume;
}
