use std::{
    cmp::Ordering,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    read_frame_header, scan_segments, BufferOptions, FileErr, FrameHeader, MarkerFile, Position,
    Progress, Role, SegmentId, MAX_VARINT_LEN,
};
use oap_buffer_runtime::file::{open_read, AsyncReadExt, AsyncSeekExt, File, SeekFrom};

/// Reads frames in order from the read marker onwards, following the writer across segments.
///
/// A reader never reads beyond what the writer has acknowledged, if it is given the writer's [`Progress`],
/// and never moves to a segment the writer has not acknowledged anything in.
/// Without it, everything in the segment files is considered readable.
pub struct TailReader {
    directory: PathBuf,
    max_record_size: usize,
    marker: MarkerFile,
    write_progress: Option<Arc<Progress>>,
    segment: Option<SegmentId>,
    file: Option<File>,
    offset: u64,
}

enum Frame {
    Complete { payload: Vec<u8>, end: u64 },
    Pending,
    Garbage,
}

impl TailReader {
    pub async fn initialize(
        directory: &Path,
        options: &BufferOptions,
        write_progress: Option<Arc<Progress>>,
    ) -> Result<Self, FileErr> {
        let marker = MarkerFile::load(directory, Role::Read).await?;
        let mut reader = Self {
            directory: directory.to_owned(),
            max_record_size: options.max_record_size(),
            marker,
            write_progress,
            segment: None,
            file: None,
            offset: 0,
        };

        let position = reader.marker.position().clone();
        if !position.is_empty() {
            match position.segment() {
                Some(marked) => {
                    let segments = scan_segments(directory).await?;
                    if segments.contains(&marked) {
                        reader.segment = Some(marked);
                        reader.offset = position.offset();
                    } else {
                        log::warn!(
                            "Segment {marked} of the read marker is missing, some records may be lost; \
                             resuming from the oldest remaining segment"
                        );
                    }
                }
                None => log::warn!(
                    "Read marker names an unknown file {}, ignored",
                    position.file_name()
                ),
            }
        }
        if reader.segment.is_none() {
            reader.attach().await?;
        }
        log::debug!(
            "TailReader initialized at {} in {}",
            reader.marker.position(),
            directory.display()
        );
        Ok(reader)
    }

    /// Try to read the next record.
    ///
    /// If there is one, it is passed to `dispatch` before the read marker advances past it,
    /// and is then returned. `Ok(None)` means the reader has caught up with the writer.
    pub async fn poll_next<F>(&mut self, dispatch: F) -> Result<Option<Vec<u8>>, FileErr>
    where
        F: FnOnce(&[u8]),
    {
        loop {
            let segment = match &self.segment {
                Some(segment) => segment.clone(),
                None => match self.attach().await? {
                    Some(segment) => segment,
                    None => return Ok(None),
                },
            };
            let bound = self.bound(&segment).await?;
            let frame = match self.read_frame(bound).await {
                Ok(frame) => frame,
                Err(e) => {
                    self.file = None;
                    return Err(e);
                }
            };
            match frame {
                Frame::Complete { payload, end } => {
                    dispatch(&payload);
                    self.marker.persist(Position::at(&segment, end)).await?;
                    self.offset = end;
                    return Ok(Some(payload));
                }
                Frame::Pending | Frame::Garbage => {
                    let next = match self.newer_than(&segment).await? {
                        Some(next) => next,
                        None => return Ok(None),
                    };
                    if !self.reachable(&next) {
                        return Ok(None);
                    }
                    // the writer may have appended to this segment right before rotating
                    let rebound = self.bound(&segment).await?;
                    if rebound != bound {
                        continue;
                    }
                    if bound > self.offset {
                        log::warn!(
                            "Skipping {} bytes at the end of segment {segment}",
                            bound - self.offset
                        );
                    }
                    self.switch(next).await?;
                }
            }
        }
    }

    /// Bytes of `segment` that can be read.
    async fn bound(&mut self, segment: &SegmentId) -> Result<u64, FileErr> {
        let size = match self.file_size(segment).await? {
            Some(size) => size,
            None => return Ok(self.offset),
        };
        if size < self.offset {
            log::warn!(
                "Read offset {} is beyond the end of segment {segment} ({size} bytes), restarting the segment",
                self.offset
            );
            self.marker.persist(Position::at(segment, 0)).await?;
            self.offset = 0;
        }
        let progress = match &self.write_progress {
            Some(progress) => progress.get(),
            None => return Ok(size),
        };
        Ok(match progress.segment() {
            Some(written) => match segment.seq().cmp(&written.seq()) {
                Ordering::Less => size,
                Ordering::Equal => size.min(progress.offset()),
                Ordering::Greater => 0,
            },
            None => 0,
        })
    }

    async fn file_size(&mut self, segment: &SegmentId) -> Result<Option<u64>, FileErr> {
        if self.file.is_none() {
            match open_read(&segment.path(&self.directory)).await {
                Ok(file) => self.file = Some(file),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log::debug!("Segment {segment} not found");
                    return Ok(None);
                }
                Err(e) => return Err(FileErr::IoError(e)),
            }
        }
        match &self.file {
            Some(file) => Ok(Some(
                file.metadata().await.map_err(FileErr::IoError)?.len(),
            )),
            None => Ok(None),
        }
    }

    async fn read_frame(&mut self, bound: u64) -> Result<Frame, FileErr> {
        let available = bound.saturating_sub(self.offset);
        if available == 0 {
            return Ok(Frame::Pending);
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(Frame::Pending),
        };
        let mut head = vec![0u8; (available as usize).min(MAX_VARINT_LEN)];
        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(FileErr::IoError)?;
        file.read_exact(&mut head).await.map_err(FileErr::IoError)?;
        match read_frame_header(&head, self.max_record_size) {
            FrameHeader::Length {
                header_size,
                payload_size,
            } if (header_size + payload_size) as u64 <= available => {
                let start = self.offset + header_size as u64;
                let mut payload = vec![0u8; payload_size];
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(FileErr::IoError)?;
                file.read_exact(&mut payload)
                    .await
                    .map_err(FileErr::IoError)?;
                Ok(Frame::Complete {
                    payload,
                    end: start + payload_size as u64,
                })
            }
            FrameHeader::Length { .. } | FrameHeader::Incomplete => Ok(Frame::Pending),
            FrameHeader::Invalid => Ok(Frame::Garbage),
        }
    }

    async fn newer_than(&self, segment: &SegmentId) -> Result<Option<SegmentId>, FileErr> {
        Ok(scan_segments(&self.directory)
            .await?
            .into_iter()
            .find(|s| s.seq() > segment.seq()))
    }

    /// Whether the writer has acknowledged anything in `segment` or a later one.
    fn reachable(&self, segment: &SegmentId) -> bool {
        match &self.write_progress {
            Some(progress) => progress
                .get()
                .segment()
                .map_or(false, |written| segment.seq() <= written.seq()),
            None => true,
        }
    }

    /// Pick up the oldest segment, once the writer has reached it.
    async fn attach(&mut self) -> Result<Option<SegmentId>, FileErr> {
        let oldest = match scan_segments(&self.directory).await?.into_iter().next() {
            Some(oldest) if self.reachable(&oldest) => oldest,
            _ => return Ok(None),
        };
        self.switch(oldest.clone()).await?;
        Ok(Some(oldest))
    }

    async fn switch(&mut self, segment: SegmentId) -> Result<(), FileErr> {
        self.marker.persist(Position::at(&segment, 0)).await?;
        log::debug!("TailReader moved to segment {segment}");
        self.segment = Some(segment);
        self.file = None;
        self.offset = 0;
        Ok(())
    }

    /// Position after the last dispatched record.
    pub fn position(&self) -> &Position {
        self.marker.position()
    }

    pub fn current_segment(&self) -> Option<&SegmentId> {
        self.segment.as_ref()
    }
}

impl std::fmt::Debug for TailReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailReader")
            .field("directory", &self.directory)
            .field("position", self.marker.position())
            .finish()
    }
}

#[cfg(test)]
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
mod test {
    use super::*;
    use crate::test_util::temp_dir;
    use crate::{encode_frame, AppendWriter};

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_bounded_by_writer() -> anyhow::Result<()> {
        let dir = temp_dir("reader-bounded");
        let options = BufferOptions::new(&dir);
        let progress = Arc::new(Progress::default());
        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        let mut reader = TailReader::initialize(&dir, &options, Some(progress.clone())).await?;
        assert!(reader.current_segment().is_none());
        assert_eq!(reader.poll_next(|_| ()).await?, None);

        writer.append(b"one").await?;
        // bytes the writer has not acknowledged are invisible
        let segment = progress.get().segment().unwrap();
        let mut bytes = std::fs::read(segment.path(&dir))?;
        bytes.extend_from_slice(&encode_frame(b"unacknowledged"));
        std::fs::write(segment.path(&dir), &bytes)?;

        let mut seen = Vec::new();
        assert_eq!(
            reader.poll_next(|r| seen.push(r.to_vec())).await?,
            Some(b"one".to_vec())
        );
        assert_eq!(seen, vec![b"one".to_vec()]);
        assert_eq!(reader.position(), &progress.get());
        assert_eq!(reader.poll_next(|_| ()).await?, None);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_skip_garbage_on_rotation() -> anyhow::Result<()> {
        let dir = temp_dir("reader-garbage");
        std::fs::create_dir_all(&dir)?;
        let first = SegmentId::new(1, oap_buffer_types::Timestamp::now_utc());
        let second = first.succ();
        let mut bytes = encode_frame(b"a");
        // a varint that never ends
        bytes.extend_from_slice(&[0xFF; 12]);
        std::fs::write(first.path(&dir), &bytes)?;
        std::fs::write(second.path(&dir), encode_frame(b"b"))?;

        let options = BufferOptions::new(&dir);
        let mut reader = TailReader::initialize(&dir, &options, None).await?;
        assert_eq!(reader.current_segment(), Some(&first));
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"a".to_vec()));
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"b".to_vec()));
        assert_eq!(reader.current_segment(), Some(&second));
        assert_eq!(reader.poll_next(|_| ()).await?, None);
        assert_eq!(reader.position(), &Position::at(&second, 2));

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_stay_until_writer_rotates() -> anyhow::Result<()> {
        let dir = temp_dir("reader-rotates");
        let options = BufferOptions::new(&dir);
        let progress = Arc::new(Progress::default());
        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        let acked = writer.append(b"one").await?;
        writer.close().await?;

        // created, but the process died before the first append into it
        let first = acked.segment().unwrap();
        let second = first.succ();
        std::fs::write(second.path(&dir), b"")?;

        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        assert_eq!(progress.get(), acked);
        let mut reader = TailReader::initialize(&dir, &options, Some(progress.clone())).await?;
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"one".to_vec()));
        assert_eq!(reader.poll_next(|_| ()).await?, None);
        assert_eq!(reader.current_segment(), Some(&first));
        assert_eq!(reader.position(), &acked);

        // gone before anything was written into it
        std::fs::remove_file(second.path(&dir))?;
        drop(writer);
        drop(reader);
        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        let mut reader = TailReader::initialize(&dir, &options, Some(progress.clone())).await?;
        assert_eq!(reader.position(), &acked);
        let after = writer.append(b"after").await?;
        assert_eq!(after.segment(), Some(first));
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"after".to_vec()));
        assert_eq!(reader.position(), &after);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[cfg_attr(feature = "runtime-tokio", tokio::test)]
    #[cfg_attr(feature = "runtime-async-std", async_std::test)]
    async fn test_missing_read_segment() -> anyhow::Result<()> {
        let dir = temp_dir("reader-missing");
        let mut options = BufferOptions::new(&dir);
        options.set_max_segment_size(1)?;
        let progress = Arc::new(Progress::default());
        let mut writer = AppendWriter::initialize(&dir, &options, progress.clone()).await?;
        let a = writer.append(b"a").await?;
        let b = writer.append(b"b").await?;
        let c = writer.append(b"c").await?;
        assert_eq!(c.segment().map(|s| s.seq()), Some(3));

        let mut marker = MarkerFile::load(&dir, Role::Read).await?;
        marker.persist(b.clone()).await?;
        std::fs::remove_file(b.segment().unwrap().path(&dir))?;

        // falls back to the oldest remaining segment
        let mut reader = TailReader::initialize(&dir, &options, Some(progress.clone())).await?;
        assert_eq!(reader.current_segment(), a.segment().as_ref());
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"a".to_vec()));
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"c".to_vec()));
        assert_eq!(reader.poll_next(|_| ()).await?, None);

        let d = writer.append(b"d").await?;
        assert_eq!(d.segment().map(|s| s.seq()), Some(4));
        assert_eq!(reader.poll_next(|_| ()).await?, Some(b"d".to_vec()));
        assert_eq!(reader.position(), &d);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
