//! File and directory primitives with the same signatures across runtimes.
//!
//! All paths are `std::path::Path`; each runtime adapter converts as needed.

#[cfg(feature = "runtime-tokio")]
mod tokio_file;
#[cfg(feature = "runtime-tokio")]
pub use tokio_file::*;

#[cfg(feature = "runtime-async-std")]
mod async_std_file;
#[cfg(feature = "runtime-async-std")]
pub use async_std_file::*;

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
mod no_rt_file;
#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
pub use no_rt_file::*;

pub use std::io::SeekFrom;

/// Names of the entries directly under `path`. Names that are not valid UTF-8 are skipped.
pub async fn list_dir(path: &std::path::Path) -> Result<Vec<String>, std::io::Error> {
    Ok(read_dir_names(path)
        .await?
        .into_iter()
        .filter_map(|name| name.into_string().ok())
        .collect())
}

/// Flush the directory entry itself, so that a rename or create inside it is durable.
#[cfg(unix)]
pub async fn sync_dir(path: &std::path::Path) -> Result<(), std::io::Error> {
    let dir = open_read(path).await?;
    dir.sync_all().await
}

/// Directories cannot be opened for syncing here; entries are durable once the files are.
#[cfg(not(unix))]
pub async fn sync_dir(_path: &std::path::Path) -> Result<(), std::io::Error> {
    Ok(())
}
