//! ### `oap-buffer-runtime`: Async runtime abstraction
//!
//! This crate provides a small set of functions aligning the type signatures between `async-std` and `tokio`,
//! so that the buffer can be built generic to both runtimes.
//!
//! The `file` feature adds the file and directory primitives used by the disk buffer.

#[cfg(all(feature = "runtime-async-std", feature = "runtime-tokio"))]
compile_error!("'runtime-async-std' and 'runtime-tokio' cannot be enabled at the same time");

#[cfg(feature = "file")]
pub mod file;
mod sleep;
mod task;
mod timeout;

pub use sleep::*;
pub use task::*;
pub use timeout::*;
