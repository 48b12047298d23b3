use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    encode_frame, next_segment, scan_segments, BufferOptions, FileErr, FrameIter, MarkerFile,
    Position, Progress, Role, SegmentId,
};
use oap_buffer_runtime::file::{create_new, open_append, read, sync_dir, AsyncWriteExt, File};

/// Appends frames to the newest segment of a buffer directory, and keeps the write marker
/// pointing at the end of the last acknowledged frame.
///
/// There is only one `AppendWriter` per directory; it is owned by the writer task of a
/// [`crate::BufferStream`], which serializes concurrent producers.
pub struct AppendWriter {
    directory: PathBuf,
    max_segment_size: u64,
    max_record_size: usize,
    marker: MarkerFile,
    progress: Arc<Progress>,
    active: Option<Active>,
    newest: Option<SegmentId>,
}

struct Active {
    segment: SegmentId,
    file: File,
    size: u64,
}

impl AppendWriter {
    /// Recover the write position from the marker and the segments on disk.
    ///
    /// The segment to append to is the newer of the one named by the marker and the newest on disk.
    /// Its valid length is found by scanning its frames. If anything follows the last complete frame,
    /// the segment is left as is and the next append goes to a new segment.
    pub async fn initialize(
        directory: &Path,
        options: &BufferOptions,
        progress: Arc<Progress>,
    ) -> Result<Self, FileErr> {
        let mut marker = MarkerFile::load(directory, Role::Write).await?;
        marker.sync_directory().await;
        let segments = scan_segments(directory).await?;
        let marked = marker.position().segment();
        if !marker.position().is_empty() && marked.is_none() {
            log::warn!(
                "Write marker names an unknown file {}, ignored",
                marker.position().file_name()
            );
        }
        let marked_exists = marked.as_ref().map_or(false, |m| segments.contains(m));
        if let Some(marked) = &marked {
            if !marked_exists {
                log::warn!("Segment {marked} of the write marker is missing");
            }
        }
        let newest = segments.last().cloned();
        let candidate = match (&marked, &newest) {
            (Some(marked), Some(newest)) if marked_exists && marked >= newest => Some(marked.clone()),
            (_, Some(newest)) => {
                if marked_exists {
                    log::warn!("Found segment {newest} newer than the write marker");
                }
                Some(newest.clone())
            }
            (_, None) => None,
        };

        let mut writer = Self {
            directory: directory.to_owned(),
            max_segment_size: options.max_segment_size(),
            max_record_size: options.max_record_size(),
            marker,
            progress,
            active: None,
            newest: newest.into_iter().chain(marked).max(),
        };

        let position = match candidate {
            Some(segment) => writer.recover(segment, marked_exists).await?,
            None => Position::default(),
        };
        // also fails early if the directory is not writable
        writer
            .marker
            .persist(position.clone())
            .await
            .map_err(|e| match e {
                FileErr::IoError(e) => {
                    FileErr::DirectoryUnwritable(directory.display().to_string(), e)
                }
                e => e,
            })?;
        writer.progress.set(position);
        log::debug!(
            "AppendWriter initialized at {} in {}",
            writer.marker.position(),
            directory.display()
        );
        Ok(writer)
    }

    async fn recover(&mut self, segment: SegmentId, marked_exists: bool) -> Result<Position, FileErr> {
        let path = segment.path(&self.directory);
        let bytes = read(&path).await.map_err(FileErr::IoError)?;
        let mut frames = FrameIter::new(&bytes, 0, self.max_record_size);
        let count = frames.by_ref().count();
        let valid_end = frames.offset() as u64;
        let size = bytes.len() as u64;

        let marked = self.marker.position();
        if marked.file_name() == segment.file_name() && marked.offset() > valid_end {
            log::warn!(
                "Write marker {marked} is beyond the valid end {valid_end} of the segment"
            );
        }

        if valid_end < size {
            log::warn!(
                "Segment {segment} has {} trailing bytes after {count} frames, will rotate",
                size - valid_end
            );
        } else if size > self.max_segment_size {
            log::info!("Segment {segment} is full ({size} bytes), will rotate");
        } else {
            let file = open_append(&path).await.map_err(FileErr::IoError)?;
            self.active = Some(Active {
                segment: segment.clone(),
                file,
                size,
            });
        }

        let marked = self.marker.position();
        if valid_end == 0 && marked_exists && marked.file_name() != segment.file_name() {
            // nothing was acknowledged in the newer segment yet
            Ok(marked.clone())
        } else {
            Ok(Position::at(&segment, valid_end))
        }
    }

    /// Append one record. Returns the position right after it once it is durable.
    ///
    /// On error, the marker is not advanced and the next append starts a new segment.
    pub async fn append(&mut self, payload: &[u8]) -> Result<Position, FileErr> {
        if payload.len() > self.max_record_size {
            return Err(FileErr::RecordTooLarge {
                size: payload.len(),
                limit: self.max_record_size,
            });
        }
        let frame = encode_frame(payload);

        let mut active = match self.active.take() {
            Some(active) => active,
            None => self.create_segment().await?,
        };
        active.file.write_all(&frame).await.map_err(FileErr::IoError)?;
        active.file.flush().await.map_err(FileErr::IoError)?;
        active.file.sync_data().await.map_err(FileErr::IoError)?;
        active.size += frame.len() as u64;

        let position = Position::at(&active.segment, active.size);
        self.marker.persist(position.clone()).await?;
        self.progress.set(position.clone());

        if active.size > self.max_segment_size {
            log::info!(
                "Segment {} reached {} bytes, rotating",
                active.segment,
                active.size
            );
        } else {
            self.active = Some(active);
        }
        Ok(position)
    }

    async fn create_segment(&mut self) -> Result<Active, FileErr> {
        let existing = scan_segments(&self.directory).await?;
        let segment = next_segment(&existing, self.newest.as_ref());
        let file = create_new(&segment.path(&self.directory))
            .await
            .map_err(FileErr::IoError)?;
        self.newest = Some(segment.clone());
        // the first append into it is only durable once the directory entry is
        sync_dir(&self.directory)
            .await
            .map_err(FileErr::IoError)?;
        log::info!("Created segment {segment}");
        Ok(Active {
            segment,
            file,
            size: 0,
        })
    }

    /// Position after the last acknowledged record.
    pub fn position(&self) -> &Position {
        self.marker.position()
    }

    /// The segment the next append goes to, if it is already open.
    pub fn active_segment(&self) -> Option<&SegmentId> {
        self.active.as_ref().map(|a| &a.segment)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub async fn close(mut self) -> Result<(), FileErr> {
        if let Some(active) = self.active.take() {
            active.file.sync_all().await.map_err(FileErr::IoError)?;
            log::debug!("Closed segment {}", active.segment);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppendWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendWriter")
            .field("directory", &self.directory)
            .field("position", self.marker.position())
            .field("active", &self.active_segment())
            .finish()
    }
}

#[cfg(test)]
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
mod test {
    use super::*;
    use crate::test_util::temp_dir;
    use crate::frame_size;

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_append_and_rotate() -> anyhow::Result<()> {
        let dir = temp_dir("writer-rotate");
        let mut options = BufferOptions::new(&dir);
        options.set_max_segment_size(64)?.set_max_record_size(64)?;
        let progress = Arc::new(Progress::default());

        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        assert!(writer.position().is_empty());
        assert!(scan_segments(&dir).await?.is_empty());

        let first = writer.append(&[1u8; 30]).await?;
        assert_eq!(first.segment().map(|s| s.seq()), Some(1));
        assert_eq!(first.offset(), frame_size(30) as u64);
        assert_eq!(progress.get(), first);

        // 62 bytes, not yet beyond the limit
        writer.append(&[2u8; 30]).await?;
        assert_eq!(writer.active_segment().map(|s| s.seq()), Some(1));
        // 93 bytes
        let third = writer.append(&[3u8; 30]).await?;
        assert_eq!(third.segment().map(|s| s.seq()), Some(1));
        assert!(writer.active_segment().is_none());
        assert_eq!(scan_segments(&dir).await?.len(), 1);

        let fourth = writer.append(&[4u8; 30]).await?;
        assert_eq!(fourth.segment().map(|s| s.seq()), Some(2));
        assert_eq!(fourth.offset(), frame_size(30) as u64);

        assert!(matches!(
            writer.append(&[0u8; 65]).await,
            Err(FileErr::RecordTooLarge { size: 65, limit: 64 })
        ));
        writer.close().await?;

        let writer = AppendWriter::initialize(&dir, &options, progress).await?;
        assert_eq!(writer.position(), &fourth);
        assert_eq!(writer.active_segment().map(|s| s.seq()), Some(2));

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_recover_torn_tail() -> anyhow::Result<()> {
        let dir = temp_dir("writer-torn");
        let options = BufferOptions::new(&dir);
        let progress = Arc::new(Progress::default());

        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        let acked = writer.append(b"hello").await?;
        writer.close().await?;

        // half a frame: declares 5 bytes, has 2
        let segment = acked.segment().unwrap();
        let mut bytes = std::fs::read(segment.path(&dir))?;
        bytes.extend_from_slice(&[5, b'w', b'o']);
        std::fs::write(segment.path(&dir), &bytes)?;

        let mut writer = AppendWriter::initialize(&dir, &options, progress).await?;
        assert_eq!(writer.position(), &acked);
        assert!(writer.active_segment().is_none());
        let next = writer.append(b"world").await?;
        assert_eq!(next.segment().map(|s| s.seq()), Some(2));
        // the torn tail is never rewritten
        assert_eq!(std::fs::read(segment.path(&dir))?, bytes);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
