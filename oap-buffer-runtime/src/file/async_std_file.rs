use async_std::{path::PathBuf as AsyncPathBuf, stream::StreamExt};
use std::{ffi::OsString, io::Error as IoError, path::Path};

pub use async_std::{
    fs::{File, OpenOptions},
    io::{prelude::SeekExt as AsyncSeekExt, ReadExt as AsyncReadExt, WriteExt as AsyncWriteExt},
};

fn convert(path: &Path) -> AsyncPathBuf {
    AsyncPathBuf::from(path.to_path_buf())
}

pub async fn open_read(path: &Path) -> Result<File, IoError> {
    File::open(convert(path)).await
}

/// Open for appending, creating the file if it does not exist.
pub async fn open_append(path: &Path) -> Result<File, IoError> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(convert(path))
        .await
}

/// Open for appending; fails if the file already exists.
pub async fn create_new(path: &Path) -> Result<File, IoError> {
    OpenOptions::new()
        .append(true)
        .create_new(true)
        .open(convert(path))
        .await
}

/// Open for writing from the beginning, truncating any existing content.
pub async fn create_truncate(path: &Path) -> Result<File, IoError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(convert(path))
        .await
}

pub async fn create_dir_all(path: &Path) -> Result<(), IoError> {
    async_std::fs::create_dir_all(convert(path)).await
}

pub async fn remove_dir_all(path: &Path) -> Result<(), IoError> {
    async_std::fs::remove_dir_all(convert(path)).await
}

pub async fn remove_file(path: &Path) -> Result<(), IoError> {
    async_std::fs::remove_file(convert(path)).await
}

pub async fn rename(from: &Path, to: &Path) -> Result<(), IoError> {
    async_std::fs::rename(convert(from), convert(to)).await
}

pub async fn read(path: &Path) -> Result<Vec<u8>, IoError> {
    async_std::fs::read(convert(path)).await
}

pub(crate) async fn read_dir_names(path: &Path) -> Result<Vec<OsString>, IoError> {
    let mut entries = async_std::fs::read_dir(convert(path)).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next().await {
        names.push(entry?.file_name());
    }
    Ok(names)
}
