use std::{
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{format::Marker, FileErr, SegmentId};
use oap_buffer_runtime::file::{
    create_dir_all, create_truncate, read, rename, sync_dir, AsyncWriteExt,
};

/// How far the writer or the reader has progressed: a segment file name and a byte offset in it.
///
/// An empty file name means nothing has been written (or read) yet.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    file_name: String,
    offset: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Write,
    Read,
}

/// The persisted position of one [`Role`].
///
/// Every update replaces the marker file as a whole, by writing a temporary file and renaming it over.
/// A crash therefore leaves either the old or the new marker behind, never a torn one.
#[derive(Debug)]
pub struct MarkerFile {
    role: Role,
    path: PathBuf,
    temp_path: PathBuf,
    position: Position,
}

/// A position shared in memory between the writer and the reader of one buffer.
#[derive(Debug, Default)]
pub struct Progress {
    position: Mutex<Position>,
}

impl Position {
    pub fn new<S: Into<String>>(file_name: S, offset: u64) -> Self {
        Self {
            file_name: file_name.into(),
            offset,
        }
    }

    pub fn at(segment: &SegmentId, offset: u64) -> Self {
        Self::new(segment.file_name(), offset)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.file_name.is_empty()
    }

    /// The segment this position points into, if the file name is a segment name.
    pub fn segment(&self) -> Option<SegmentId> {
        SegmentId::parse(&self.file_name)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "<none>@{}", self.offset)
        } else {
            write!(f, "{}@{}", self.file_name, self.offset)
        }
    }
}

impl Role {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Write => "offset_write.sw",
            Self::Read => "offset_read.sw",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Read the persisted position of `role` without touching the directory.
///
/// Returns `Ok(None)` if there is no marker file.
pub async fn read_position(directory: &Path, role: Role) -> Result<Option<Position>, FileErr> {
    let bytes = match read(&directory.join(role.file_name())).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(FileErr::IoError(e)),
    };
    let marker = Marker::from_bytes(&bytes).map_err(FileErr::FormatErr)?;
    Ok(Some(Position::new(marker.file_name, marker.offset)))
}

impl MarkerFile {
    /// Load the marker of `role`, creating the directory if needed.
    ///
    /// An absent or unparsable marker yields an empty position; a corrupt one is logged.
    pub async fn load(directory: &Path, role: Role) -> Result<Self, FileErr> {
        create_dir_all(directory)
            .await
            .map_err(|e| FileErr::DirectoryUnwritable(directory.display().to_string(), e))?;
        let position = match read_position(directory, role).await {
            Ok(Some(position)) => position,
            Ok(None) => Position::default(),
            Err(FileErr::FormatErr(e)) => {
                log::warn!(
                    "Corrupt {role} marker in {}, starting fresh: {e}",
                    directory.display()
                );
                Position::default()
            }
            Err(e) => return Err(e),
        };
        let path = directory.join(role.file_name());
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        Ok(Self {
            role,
            path,
            temp_path: temp_path.into(),
            position,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Durably replace the marker. The in-memory position only changes if this succeeds.
    pub async fn persist(&mut self, position: Position) -> Result<(), FileErr> {
        let bytes = Marker {
            file_name: position.file_name.clone(),
            offset: position.offset,
        }
        .to_bytes()
        .map_err(FileErr::FormatErr)?;
        let mut file = create_truncate(&self.temp_path)
            .await
            .map_err(FileErr::IoError)?;
        file.write_all(&bytes).await.map_err(FileErr::IoError)?;
        file.flush().await.map_err(FileErr::IoError)?;
        file.sync_all().await.map_err(FileErr::IoError)?;
        drop(file);
        rename(&self.temp_path, &self.path)
            .await
            .map_err(FileErr::IoError)?;
        log::trace!("Persisted {} marker {position}", self.role);
        self.position = position;
        Ok(())
    }

    /// Make the marker's directory entry durable. A lost rename only leaves an older marker behind.
    pub async fn sync_directory(&self) {
        if let Some(directory) = self.path.parent() {
            if let Err(e) = sync_dir(directory).await {
                log::debug!("Cannot sync directory {}: {e}", directory.display());
            }
        }
    }
}

impl Progress {
    pub fn new(position: Position) -> Self {
        Self {
            position: Mutex::new(position),
        }
    }

    pub fn get(&self) -> Position {
        match self.position.lock() {
            Ok(position) => position.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, position: Position) {
        match self.position.lock() {
            Ok(mut current) => *current = position,
            Err(poisoned) => *poisoned.into_inner() = position,
        }
    }
}

#[cfg(test)]
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
mod test {
    use super::*;
    use crate::test_util::temp_dir;

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_marker_file() -> anyhow::Result<()> {
        let dir = temp_dir("marker-persist");
        let mut marker = MarkerFile::load(&dir, Role::Read).await?;
        assert!(dir.is_dir());
        assert_eq!(marker.position(), &Position::default());
        assert_eq!(read_position(&dir, Role::Read).await?, None);

        let position = Position::new("data_00000000000000000001_20180827115945261.sw", 42);
        marker.persist(position.clone()).await?;
        assert_eq!(marker.position(), &position);
        assert!(!dir.join("offset_read.sw.tmp").exists());

        let marker = MarkerFile::load(&dir, Role::Read).await?;
        assert_eq!(marker.position(), &position);
        // roles are independent
        let marker = MarkerFile::load(&dir, Role::Write).await?;
        assert!(marker.position().is_empty());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_corrupt_marker() -> anyhow::Result<()> {
        let dir = temp_dir("marker-corrupt");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(Role::Write.file_name()), b"not a marker")?;

        assert!(matches!(
            read_position(&dir, Role::Write).await,
            Err(FileErr::FormatErr(_))
        ));
        let marker = MarkerFile::load(&dir, Role::Write).await?;
        assert_eq!(marker.position(), &Position::default());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_progress() {
        let progress = Progress::default();
        assert!(progress.get().is_empty());
        progress.set(Position::new("data_00000000000000000002_20180827115945261.sw", 7));
        assert_eq!(progress.get().offset(), 7);
        assert_eq!(progress.get().segment().map(|s| s.seq()), Some(2));
        assert_eq!(format!("{}", Position::default()), "<none>@0");
    }
}
