use crate::BufferState;
use std::str::Utf8Error;
use thiserror::Error;

/// Type alias of the [`Result`] type specific to `oap-buffer`.
pub type BufferResult<T, E> = std::result::Result<T, BufferErr<E>>;

#[derive(Error, Debug)]
/// Common errors that may occur.
pub enum BufferErr<E: std::error::Error> {
    #[error("Buffer is {actual}, expected {expected}")]
    InvalidState {
        expected: BufferState,
        actual: BufferState,
    },
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecErr),
    #[error("Backend error: {0}")]
    Backend(E),
    #[error("Runtime error: {0}")]
    Runtime(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
/// Errors that may happen when encoding or decoding a record
pub enum CodecErr {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Utf8Error: {0}")]
    Utf8Error(#[from] Utf8Error),
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    #[error("serde_json::Error {0}")]
    SerdeJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
/// Errors that may happen when handling BufferKey
pub enum BufferKeyErr {
    #[error("Invalid buffer key: valid pattern is [a-zA-Z0-9._-]{{1, 249}}")]
    InvalidBufferKey,
}

/// Function to construct a [`BufferErr::Runtime`] error variant.
pub fn runtime_error<T: std::error::Error, E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> BufferErr<T> {
    BufferErr::Runtime(Box::new(e))
}
