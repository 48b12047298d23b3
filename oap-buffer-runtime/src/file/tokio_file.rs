use std::{ffi::OsString, io::Error as IoError, path::Path};

pub use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

pub async fn open_read(path: &Path) -> Result<File, IoError> {
    File::open(path).await
}

/// Open for appending, creating the file if it does not exist.
pub async fn open_append(path: &Path) -> Result<File, IoError> {
    OpenOptions::new().append(true).create(true).open(path).await
}

/// Open for appending; fails if the file already exists.
pub async fn create_new(path: &Path) -> Result<File, IoError> {
    OpenOptions::new()
        .append(true)
        .create_new(true)
        .open(path)
        .await
}

/// Open for writing from the beginning, truncating any existing content.
pub async fn create_truncate(path: &Path) -> Result<File, IoError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
}

pub async fn create_dir_all(path: &Path) -> Result<(), IoError> {
    tokio::fs::create_dir_all(path).await
}

pub async fn remove_dir_all(path: &Path) -> Result<(), IoError> {
    tokio::fs::remove_dir_all(path).await
}

pub async fn remove_file(path: &Path) -> Result<(), IoError> {
    tokio::fs::remove_file(path).await
}

pub async fn rename(from: &Path, to: &Path) -> Result<(), IoError> {
    tokio::fs::rename(from, to).await
}

pub async fn read(path: &Path) -> Result<Vec<u8>, IoError> {
    tokio::fs::read(path).await
}

pub(crate) async fn read_dir_names(path: &Path) -> Result<Vec<OsString>, IoError> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }
    Ok(names)
}
