//! This program writes every line typed into the console into a buffer, and prints every record
//! the buffer delivers back. Run it twice on the same directory to see records survive a restart.
use anyhow::Result;
use clap::Parser;
use oap_buffer_file::export::flume::{unbounded, Receiver};
use oap_buffer_file::{
    BufferOptions, BufferStream, DEFAULT_MAX_RECORD_SIZE, DEFAULT_SEGMENT_SIZE,
};
use oap_buffer_runtime::sleep;
use oap_buffer_types::StringCodec;
use std::path::PathBuf;

#[derive(Debug, Parser)]
struct Args {
    #[clap(long, help = "Buffer directory", default_value = "buffer")]
    dir: PathBuf,
    #[clap(
        long,
        help = "Rotate segments beyond this many bytes",
        default_value_t = DEFAULT_SEGMENT_SIZE
    )]
    max_segment_size: u64,
    #[clap(long, help = "Erase the buffer before starting")]
    clean: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::info!("Please type something into the console and press enter:");

    let (sender, receiver) = unbounded();

    let handle = std::thread::spawn(move || -> Result<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(relay(args, receiver))
    });

    loop {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => break, // this means stdin is closed
            Ok(_) => (),
            Err(e) => return Err(e.into()),
        }
        if sender.send(line).is_err() {
            break;
        }
    }
    std::mem::drop(sender);

    match handle.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Relay thread panicked"),
    }
}

async fn relay(args: Args, receiver: Receiver<String>) -> Result<()> {
    let mut options = BufferOptions::new(args.dir);
    options
        .set_max_segment_size(args.max_segment_size)?
        .set_max_record_size(DEFAULT_MAX_RECORD_SIZE.min(args.max_segment_size as usize))?
        .set_clean_on_restart(args.clean);
    let poll_interval = options.poll_interval();

    let mut buffer = BufferStream::new(options, StringCodec, |line: String| {
        println!("> {line}");
    });
    buffer.initialize().await?;

    while let Ok(line) = receiver.recv_async().await {
        let position = buffer.write(line.trim_end().to_owned()).await?;
        log::debug!("Written up to {position}");
    }

    while !buffer.caught_up() {
        sleep(poll_interval).await;
    }
    buffer.shutdown().await?;

    Ok(())
}
