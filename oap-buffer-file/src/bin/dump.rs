//! This program prints the content of a buffer directory: both markers, every segment and every record.
//! It never modifies the directory, so it is safe to run against a live buffer.
//!
//! ```ignore
//! # write marker: data_00000000000000000002_20230605135553001.sw@30
//! # read marker: data_00000000000000000001_20230605135550127.sw@12
//! # segment data_00000000000000000001_20230605135550127.sw (24 bytes)
//! [0] hello
//! [6] world
//! ...
//! ```
use anyhow::Result;
use clap::Parser;
use oap_buffer_file::{read_position, scan_segments, FrameIter, Role, DEFAULT_MAX_RECORD_SIZE};
use oap_buffer_runtime::file::read;
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[clap(long, help = "Buffer directory to inspect")]
    dir: PathBuf,
    #[clap(long, help = "If set, skip printing the records")]
    header_only: bool,
    #[clap(
        long,
        help = "Frames declaring a larger size are considered garbage",
        default_value_t = DEFAULT_MAX_RECORD_SIZE
    )]
    max_record_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        dir,
        header_only,
        max_record_size,
    } = Args::parse();

    for role in [Role::Write, Role::Read] {
        match read_position(&dir, role).await {
            Ok(Some(position)) => println!("# {role} marker: {position}"),
            Ok(None) => println!("# {role} marker: absent"),
            Err(e) => println!("# {role} marker: corrupt ({e})"),
        }
    }

    for segment in scan_segments(&dir).await? {
        let bytes = read(&segment.path(&dir)).await?;
        println!("# segment {segment} ({} bytes)", bytes.len());

        let mut frames = FrameIter::new(&bytes, 0, max_record_size);
        let mut count = 0;
        loop {
            let offset = frames.offset();
            let payload = match frames.next() {
                Some(payload) => payload,
                None => break,
            };
            count += 1;
            if header_only {
                continue;
            }
            match std::str::from_utf8(payload) {
                Ok(text) => println!("[{offset}] {text}"),
                Err(_) => println!("[{offset}] <BINARY BLOB>"),
            }
        }
        println!("# {count} records");
        if frames.remaining() > 0 {
            log::warn!(
                "Segment {segment} has {} trailing bytes after offset {}",
                frames.remaining(),
                frames.offset()
            );
        }
    }

    Ok(())
}
