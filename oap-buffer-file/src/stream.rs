use flume::{bounded, unbounded, Receiver, Sender, TryRecvError};
use std::{
    cmp::Ordering,
    io::ErrorKind,
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    scan_segments, AppendWriter, BufferOptions, FileErr, FileResult, Position, Progress,
    SegmentId, TailReader,
};
use oap_buffer_runtime::{
    file::{create_dir_all, remove_dir_all, remove_file},
    spawn_task, timeout, TaskHandle,
};
use oap_buffer_types::{
    runtime_error, BufferErr, BufferState, Codec, RecordCallback, SharedState,
};

/// A durable buffer over one directory.
///
/// Records written are appended to segment files by a writer task. A reader task follows the writer,
/// decodes each record and hands it to the callback, at least once. Segments fully consumed by the
/// reader are removed periodically.
///
/// ```ignore
/// let options = BufferOptions::new("/var/oap/buffer/trace-segment");
/// let mut buffer = BufferStream::new(options, StringCodec, |record: String| println!("{record}"));
/// buffer.initialize().await?;
/// buffer.write("hello".to_owned()).await?;
/// buffer.shutdown().await?;
/// ```
pub struct BufferStream<C: Codec> {
    options: BufferOptions,
    codec: Arc<C>,
    callback: Arc<Mutex<Box<dyn RecordCallback<C::Record>>>>,
    state: SharedState,
    write_progress: Arc<Progress>,
    read_progress: Arc<Progress>,
    writer: Option<WriterTask>,
    reader: Option<ReaderTask>,
}

/// A handle to write into a running [`BufferStream`]. Cheap to clone; clones share the same writer.
pub struct BufferWriter<C: Codec> {
    codec: Arc<C>,
    sender: Sender<Request>,
    state: SharedState,
}

struct WriterTask {
    sender: Sender<Request>,
    handle: TaskHandle<()>,
}

struct ReaderTask {
    ctrl: Sender<()>,
    handle: TaskHandle<()>,
}

enum Request {
    Append {
        bytes: Vec<u8>,
        receipt: Sender<Result<Position, FileErr>>,
    },
    End(Sender<Result<(), FileErr>>),
}

impl<C: Codec> BufferStream<C> {
    pub fn new<F>(options: BufferOptions, codec: C, callback: F) -> Self
    where
        F: RecordCallback<C::Record>,
    {
        let callback: Box<dyn RecordCallback<C::Record>> = Box::new(callback);
        Self {
            options,
            codec: Arc::new(codec),
            callback: Arc::new(Mutex::new(callback)),
            state: SharedState::new(),
            write_progress: Default::default(),
            read_progress: Default::default(),
            writer: None,
            reader: None,
        }
    }

    pub fn options(&self) -> &BufferOptions {
        &self.options
    }

    pub fn state(&self) -> BufferState {
        self.state.get()
    }

    /// Recover the writer and the reader from the directory, then start both tasks.
    ///
    /// With `clean_on_restart`, the directory is erased first. If initialization fails,
    /// the buffer goes back to `Uninitialized` and may be initialized again.
    pub async fn initialize(&mut self) -> FileResult<()> {
        self.state
            .transit(BufferState::Uninitialized, BufferState::Initializing)
            .map_err(|actual| BufferErr::InvalidState {
                expected: BufferState::Uninitialized,
                actual,
            })?;
        match self.start().await {
            Ok(()) => {
                self.state
                    .transit(BufferState::Initializing, BufferState::Running)
                    .map_err(|actual| BufferErr::InvalidState {
                        expected: BufferState::Initializing,
                        actual,
                    })?;
                log::info!("Buffer {} is running", self.options.directory().display());
                Ok(())
            }
            Err(e) => {
                self.state
                    .transit(BufferState::Initializing, BufferState::Uninitialized)
                    .ok();
                Err(e)
            }
        }
    }

    async fn start(&mut self) -> FileResult<()> {
        self.options.validate()?;
        let directory = self.options.directory().to_owned();
        let display = || directory.display().to_string();

        if self.options.clean_on_restart() {
            match remove_dir_all(&directory).await {
                Ok(()) => log::info!("Erased buffer {}", display()),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => return Err(BufferErr::Backend(FileErr::CleanFailed(display(), e))),
            }
        }
        create_dir_all(&directory)
            .await
            .map_err(|e| BufferErr::Backend(FileErr::DirectoryUnwritable(display(), e)))?;

        let writer = AppendWriter::initialize(&directory, &self.options, self.write_progress.clone())
            .await
            .map_err(BufferErr::Backend)?;
        let reader = TailReader::initialize(
            &directory,
            &self.options,
            Some(self.write_progress.clone()),
        )
        .await
        .map_err(BufferErr::Backend)?;
        self.read_progress.set(reader.position().clone());

        self.writer = Some(spawn_writer(writer));
        self.reader = Some(spawn_reader(
            reader,
            self.codec.clone(),
            self.callback.clone(),
            self.read_progress.clone(),
            self.write_progress.clone(),
            &self.options,
        ));
        Ok(())
    }

    /// A handle for producers. Only available while running.
    pub fn writer(&self) -> FileResult<BufferWriter<C>> {
        self.ensure_running()?;
        match &self.writer {
            Some(writer) => Ok(BufferWriter {
                codec: self.codec.clone(),
                sender: writer.sender.clone(),
                state: self.state.clone(),
            }),
            None => Err(BufferErr::Backend(FileErr::WriterEnded)),
        }
    }

    /// Encode and append one record. Returns once the record is durable.
    pub async fn write(&self, record: C::Record) -> FileResult<Position> {
        self.writer()?.write(record).await
    }

    /// Where the writer is.
    pub fn write_position(&self) -> Position {
        self.write_progress.get()
    }

    /// Where the reader is.
    pub fn read_position(&self) -> Position {
        self.read_progress.get()
    }

    /// Whether the reader has dispatched everything the writer has acknowledged.
    pub fn caught_up(&self) -> bool {
        caught_up(&self.read_progress.get(), &self.write_progress.get())
    }

    /// Remove the segments the reader is done with. The reader task does this periodically.
    pub async fn cleanup(&self) -> FileResult<Vec<SegmentId>> {
        cleanup(
            self.options.directory(),
            &self.read_progress.get(),
            &self.write_progress.get(),
        )
        .await
        .map_err(BufferErr::Backend)
    }

    /// Let pending appends finish, then stop both tasks and close the files.
    pub async fn shutdown(&mut self) -> FileResult<()> {
        self.state
            .transit(BufferState::Running, BufferState::ShuttingDown)
            .map_err(|actual| BufferErr::InvalidState {
                expected: BufferState::Running,
                actual,
            })?;
        let mut result = Ok(());

        if let Some(writer) = self.writer.take() {
            let (s, r) = bounded(1);
            if writer.sender.send_async(Request::End(s)).await.is_ok() {
                match r.recv_async().await {
                    Ok(Ok(())) => (),
                    Ok(Err(e)) => result = Err(BufferErr::Backend(e)),
                    Err(_) => result = Err(BufferErr::Backend(FileErr::TaskDead("writer"))),
                }
            }
            if let Err(e) = writer.handle.await {
                result = Err(runtime_error(e));
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.ctrl.send(()).ok();
            if let Err(e) = reader.handle.await {
                result = Err(runtime_error(e));
            }
        }

        self.state
            .transit(BufferState::ShuttingDown, BufferState::Closed)
            .ok();
        log::info!("Buffer {} is closed", self.options.directory().display());
        result
    }

    fn ensure_running(&self) -> FileResult<()> {
        ensure_running(&self.state)
    }
}

impl<C: Codec> BufferWriter<C> {
    pub async fn write(&self, record: C::Record) -> FileResult<Position> {
        ensure_running(&self.state)?;
        let bytes = self.codec.encode(record)?;
        self.write_bytes(bytes).await
    }

    /// Append bytes that are already encoded.
    pub async fn write_bytes(&self, bytes: Vec<u8>) -> FileResult<Position> {
        ensure_running(&self.state)?;
        let err = || Err(BufferErr::Backend(FileErr::WriterEnded));
        let (receipt, r) = bounded(1);
        if self
            .sender
            .send_async(Request::Append { bytes, receipt })
            .await
            .is_err()
        {
            return err();
        }
        match r.recv_async().await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(e)) => Err(BufferErr::Backend(e)),
            Err(_) => err(),
        }
    }
}

impl<C: Codec> Clone for BufferWriter<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            sender: self.sender.clone(),
            state: self.state.clone(),
        }
    }
}

fn ensure_running(state: &SharedState) -> FileResult<()> {
    if state.is_running() {
        Ok(())
    } else {
        Err(BufferErr::InvalidState {
            expected: BufferState::Running,
            actual: state.get(),
        })
    }
}

fn spawn_writer(mut writer: AppendWriter) -> WriterTask {
    let (sender, receiver) = unbounded();
    let handle = spawn_task(async move {
        while let Ok(request) = receiver.recv_async().await {
            match request {
                Request::Append { bytes, receipt } => {
                    let result = writer.append(&bytes).await;
                    if let Err(e) = &result {
                        log::warn!("Append to {} failed: {e}", writer.directory().display());
                    }
                    receipt.send(result).ok();
                }
                Request::End(receipt) => {
                    let directory = writer.directory().to_owned();
                    receipt.send(writer.close().await).ok();
                    log::debug!("Writer End {}", directory.display());
                    return;
                }
            }
        }
        // every handle is gone
        let directory = writer.directory().to_owned();
        if let Err(e) = writer.close().await {
            log::error!("Failed to close writer of {}: {e}", directory.display());
        }
        log::debug!("Writer End {}", directory.display());
    });
    WriterTask { sender, handle }
}

fn spawn_reader<C: Codec>(
    mut reader: TailReader,
    codec: Arc<C>,
    callback: Arc<Mutex<Box<dyn RecordCallback<C::Record>>>>,
    read_progress: Arc<Progress>,
    write_progress: Arc<Progress>,
    options: &BufferOptions,
) -> ReaderTask {
    let (ctrl, stop): (Sender<()>, Receiver<()>) = unbounded();
    let directory = options.directory().to_owned();
    let poll_interval = options.poll_interval();
    let cleanup_interval = options.cleanup_interval();

    let handle = spawn_task(async move {
        let mut last_cleanup = Instant::now();
        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => (),
            }
            let idle = match reader
                .poll_next(|bytes| match codec.decode(bytes) {
                    Ok(record) => match callback.lock() {
                        Ok(mut callback) => callback.call(record),
                        Err(poisoned) => poisoned.into_inner().call(record),
                    },
                    Err(e) => log::error!(
                        "Dropping undecodable record of {} bytes: {e}",
                        bytes.len()
                    ),
                })
                .await
            {
                Ok(record) => {
                    read_progress.set(reader.position().clone());
                    record.is_none()
                }
                Err(e) => {
                    log::error!("Failed to read {}: {e}", directory.display());
                    true
                }
            };
            if last_cleanup.elapsed() >= cleanup_interval {
                last_cleanup = Instant::now();
                if let Err(e) =
                    cleanup(&directory, reader.position(), &write_progress.get()).await
                {
                    log::warn!("Failed to clean up {}: {e}", directory.display());
                }
            }
            if idle && wait_stop(&stop, poll_interval).await {
                break;
            }
        }
        log::debug!("Reader End {}", directory.display());
    });
    ReaderTask { ctrl, handle }
}

/// Returns true if told to stop within `dur`.
async fn wait_stop(stop: &Receiver<()>, dur: Duration) -> bool {
    timeout(dur, stop.recv_async()).await.is_ok()
}

fn caught_up(read: &Position, write: &Position) -> bool {
    let writing = match write.segment() {
        Some(segment) => segment.seq(),
        None => return true,
    };
    let reading = match read.segment() {
        Some(segment) => segment.seq(),
        None => return false,
    };
    match reading.cmp(&writing) {
        Ordering::Less => false,
        Ordering::Equal => read.offset() >= write.offset(),
        Ordering::Greater => true,
    }
}

/// Remove every segment older than the one being read, except the one being written.
///
/// A segment the reader is still in, or the writer is appending to, is never removed.
pub async fn cleanup(
    directory: &Path,
    read: &Position,
    write: &Position,
) -> Result<Vec<SegmentId>, FileErr> {
    let reading = match read.segment() {
        Some(segment) => segment.seq(),
        None => return Ok(Vec::new()),
    };
    let writing = write.segment().map(|s| s.seq());
    let mut removed = Vec::new();
    for segment in scan_segments(directory).await? {
        if segment.seq() >= reading || Some(segment.seq()) == writing {
            continue;
        }
        match remove_file(&segment.path(directory)).await {
            Ok(()) => {
                log::info!("Removed consumed segment {segment}");
                removed.push(segment);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(FileErr::IoError(e)),
        }
    }
    Ok(removed)
}

impl<C: Codec> std::fmt::Debug for BufferStream<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStream")
            .field("directory", &self.options.directory())
            .field("state", &self.state.get())
            .field("write", &self.write_progress.get())
            .field("read", &self.read_progress.get())
            .finish()
    }
}

impl<C: Codec> std::fmt::Debug for BufferWriter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferWriter")
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use oap_buffer_types::Timestamp;

    #[test]
    fn test_caught_up() {
        let first = SegmentId::new(1, Timestamp::now_utc());
        let second = first.succ();
        let empty = Position::default();

        assert!(caught_up(&empty, &empty));
        assert!(!caught_up(&empty, &Position::at(&first, 10)));
        assert!(!caught_up(&Position::at(&first, 5), &Position::at(&first, 10)));
        assert!(caught_up(&Position::at(&first, 10), &Position::at(&first, 10)));
        assert!(!caught_up(&Position::at(&first, 10), &Position::at(&second, 3)));
        // a read marker ahead of the writer counts as caught up
        assert!(caught_up(&Position::at(&second, 0), &Position::at(&first, 10)));
    }

    fn only_send_sync<T: Send + Sync>(_: T) {}

    #[test]
    fn buffer_is_send_sync() {
        #[allow(dead_code)]
        fn ensure_send_sync(
            b: BufferStream<oap_buffer_types::RawCodec>,
            w: BufferWriter<oap_buffer_types::RawCodec>,
        ) {
            only_send_sync(b);
            only_send_sync(w);
        }
    }
}
