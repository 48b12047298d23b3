use super::SeekFrom;
use futures::future::{ready, Future, Ready};
use std::{
    ffi::OsString,
    fs::Metadata,
    io::{Error as IoError, ErrorKind},
    path::Path,
};

pub struct File;

pub trait AsyncReadExt {
    type Future: Future<Output = Result<usize, IoError>>;

    fn read(&mut self, _: &mut [u8]) -> Self::Future;

    fn read_exact(&mut self, _: &mut [u8]) -> Self::Future;
}

pub trait AsyncWriteExt {
    type Future: Future<Output = Result<(), IoError>>;

    fn write_all(&mut self, _: &[u8]) -> Self::Future;
}

pub trait AsyncSeekExt {
    type Future: Future<Output = Result<u64, IoError>>;

    fn seek(&mut self, _: SeekFrom) -> Self::Future;
}

fn no_runtime() -> IoError {
    IoError::new(ErrorKind::Other, "Please enable a runtime")
}

impl File {
    pub async fn metadata(&self) -> Result<Metadata, IoError> {
        Err(no_runtime())
    }

    pub async fn flush(&mut self) -> Result<(), IoError> {
        Err(no_runtime())
    }

    pub async fn sync_all(&self) -> Result<(), IoError> {
        Err(no_runtime())
    }

    pub async fn sync_data(&self) -> Result<(), IoError> {
        Err(no_runtime())
    }
}

impl AsyncReadExt for File {
    type Future = Ready<Result<usize, IoError>>;

    fn read(&mut self, _: &mut [u8]) -> Self::Future {
        ready(Err(no_runtime()))
    }

    fn read_exact(&mut self, _: &mut [u8]) -> Self::Future {
        ready(Err(no_runtime()))
    }
}

impl AsyncWriteExt for File {
    type Future = Ready<Result<(), IoError>>;

    fn write_all(&mut self, _: &[u8]) -> Self::Future {
        ready(Err(no_runtime()))
    }
}

impl AsyncSeekExt for File {
    type Future = Ready<Result<u64, IoError>>;

    fn seek(&mut self, _: SeekFrom) -> Self::Future {
        ready(Err(no_runtime()))
    }
}

pub async fn open_read(_: &Path) -> Result<File, IoError> {
    Err(no_runtime())
}

pub async fn open_append(_: &Path) -> Result<File, IoError> {
    Err(no_runtime())
}

pub async fn create_new(_: &Path) -> Result<File, IoError> {
    Err(no_runtime())
}

pub async fn create_truncate(_: &Path) -> Result<File, IoError> {
    Err(no_runtime())
}

pub async fn create_dir_all(_: &Path) -> Result<(), IoError> {
    Err(no_runtime())
}

pub async fn remove_dir_all(_: &Path) -> Result<(), IoError> {
    Err(no_runtime())
}

pub async fn remove_file(_: &Path) -> Result<(), IoError> {
    Err(no_runtime())
}

pub async fn rename(_: &Path, _: &Path) -> Result<(), IoError> {
    Err(no_runtime())
}

pub async fn read(_: &Path) -> Result<Vec<u8>, IoError> {
    Err(no_runtime())
}

pub(crate) async fn read_dir_names(_: &Path) -> Result<Vec<OsString>, IoError> {
    Err(no_runtime())
}
