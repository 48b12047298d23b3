//! # OAP Buffer
//!
//! A disk-backed durable buffer for telemetry collectors. It sits between the handlers receiving data
//! from agents and the layer persisting it to storage, so that a crash or a slow storage backend never
//! loses what has been acknowledged.
//!
//! ## Features
//!
//! 1. Durable
//!
//! Every record is flushed to an append-only segment file before the write is acknowledged. The positions
//! of the writer and of the reader are persisted in small marker files, replaced atomically.
//!
//! 2. Independent
//!
//! The writer and the reader proceed at their own pace. Producers never wait for the consumer, and a slow
//! consumer only grows the backlog on disk, which is cleaned up segment by segment once consumed.
//!
//! 3. Async
//!
//! The buffer provides an async API, and it supports both `tokio` and `async-std`.
//!
//! ## Architecture
//!
//! `oap-buffer` is the facade crate re-exporting implementation from a number of sub-crates:
//!
//! + `oap-buffer-types`: codecs, callbacks, errors and the buffer lifecycle
//! + `oap-buffer-file`: the buffer itself, behind the `file` feature
//! + `oap-buffer-runtime`: the async runtime abstraction, behind the `runtime` feature
//!
//! ```ignore
//! use oap_buffer::{BufferOptions, BufferStream, StringCodec};
//!
//! let options = BufferOptions::new("/var/oap/buffer/trace-segment");
//! let mut buffer = BufferStream::new(options, StringCodec, |record: String| println!("{record}"));
//! buffer.initialize().await?;
//! buffer.write("hello".to_owned()).await?;
//! buffer.shutdown().await?;
//! ```

pub use oap_buffer_types::*;

#[cfg(feature = "oap-buffer-file")]
pub use oap_buffer_file::*;

#[cfg(feature = "oap-buffer-runtime")]
pub use oap_buffer_runtime as runtime;
