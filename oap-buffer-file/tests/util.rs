#![allow(dead_code)]
use oap_buffer_file::{export::flume::Receiver, BufferOptions, BufferStream};
use oap_buffer_runtime::{sleep, timeout};
use oap_buffer_types::{Codec, Timestamp};
use std::{path::PathBuf, time::Duration};

const PATIENCE: Duration = Duration::from_secs(10);

pub fn temp_dir(name: &str) -> Result<PathBuf, std::io::Error> {
    let now = Timestamp::now_utc();
    let path = std::env::temp_dir().join(format!("oap-buffer-{name}-{}", now.unix_timestamp_nanos()));
    std::fs::create_dir(&path)?;
    Ok(path)
}

/// Options that make tests fast: the reader polls often and never cleans up by itself.
pub fn test_options(dir: &PathBuf) -> anyhow::Result<BufferOptions> {
    let mut options = BufferOptions::new(dir);
    options
        .set_poll_interval(Duration::from_millis(5))?
        .set_cleanup_interval(Duration::from_secs(3600))?;
    Ok(options)
}

/// Receive exactly `n` records, failing if they take too long.
pub async fn recv_n<T>(receiver: &Receiver<T>, n: usize) -> anyhow::Result<Vec<T>> {
    let mut records = Vec::with_capacity(n);
    for _ in 0..n {
        records.push(timeout(PATIENCE, receiver.recv_async()).await??);
    }
    Ok(records)
}

/// Fails if anything arrives within a few poll intervals.
pub async fn expect_nothing<T>(receiver: &Receiver<T>) -> anyhow::Result<()> {
    sleep(Duration::from_millis(100)).await;
    anyhow::ensure!(receiver.is_empty(), "Unexpected record");
    Ok(())
}

pub async fn wait_caught_up<C: Codec>(buffer: &BufferStream<C>) -> anyhow::Result<()> {
    let mut waited = Duration::ZERO;
    while !buffer.caught_up() {
        anyhow::ensure!(waited < PATIENCE, "Reader is stuck at {}", buffer.read_position());
        sleep(Duration::from_millis(5)).await;
        waited += Duration::from_millis(5);
    }
    Ok(())
}

pub fn segment_count(dir: &PathBuf) -> std::io::Result<usize> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("data_"))
        .count())
}

/// Wait until exactly `n` segments are left in `dir`.
pub async fn wait_segment_count(dir: &PathBuf, n: usize) -> anyhow::Result<()> {
    let mut waited = Duration::ZERO;
    while segment_count(dir)? != n {
        anyhow::ensure!(waited < PATIENCE, "{} segments left", segment_count(dir)?);
        sleep(Duration::from_millis(5)).await;
        waited += Duration::from_millis(5);
    }
    Ok(())
}
