use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use piper_device::stdio::{StdioCapture, StdioPlayback};
use piper_pacing::TokenBucket;
use piper_session::{DrainLoop, Inlet, Outlet, Pipe, ProducerLoop};
use piper_transport::Metadata;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "piper", about = "Shared-memory audio transport")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new backing file.
    Create {
        path: PathBuf,
        format: String,
        channels: u32,
        rate: u32,
        period_ms: u32,
        buffer: u32,
        capacity: u32,
    },
    /// Print metadata and layout for an existing backing file.
    Info { path: PathBuf },
    /// Pipe stdin into the transport.
    Feed { path: PathBuf },
    /// Pipe the transport out to stdout.
    Drain { path: PathBuf },
    /// Reset a stuck session to INVALID.
    Unclog { path: PathBuf },
}

fn bytes_per_sample(format: &str) -> Option<u32> {
    match format {
        "S8" | "U8" => Some(1),
        "S16_LE" | "S16_BE" | "U16_LE" | "U16_BE" => Some(2),
        "S24_LE" | "S24_BE" | "S24_3LE" | "S24_3BE" => Some(3),
        "S32_LE" | "S32_BE" | "FLOAT_LE" | "FLOAT_BE" => Some(4),
        "FLOAT64_LE" | "FLOAT64_BE" => Some(8),
        _ => None,
    }
}

fn install_quit_handler() -> anyhow::Result<Arc<AtomicBool>> {
    let quit = Arc::new(AtomicBool::new(false));
    for signal in [
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGQUIT,
        signal_hook::consts::SIGHUP,
    ] {
        signal_hook::flag::register(signal, Arc::clone(&quit))?;
    }
    Ok(quit)
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Command::Create {
            path,
            format,
            channels,
            rate,
            period_ms,
            buffer,
            capacity,
        } => {
            if buffer <= 1 || capacity <= buffer {
                error!("buffer must be > 1 and capacity must be > buffer");
                return Ok(2);
            }
            let bps = match bytes_per_sample(&format) {
                Some(b) => b,
                None => {
                    error!(format, "unrecognized sample format");
                    return Ok(2);
                }
            };
            let frame_size = bps * channels;
            let frames_per_period = (rate as u64 * period_ms as u64 / 1000) as u32;
            let period_size = frame_size * frames_per_period;
            let period_time = period_ms as u64 * 1_000_000;

            let metadata = Metadata::new(
                &format,
                channels,
                rate,
                frame_size,
                period_size,
                period_time,
                capacity - buffer,
                buffer,
            )?;
            let pipe = Pipe::create(&path, metadata, capacity)?;
            info!(path = %path.display(), slots = capacity, "created pipe");
            drop(pipe);
            Ok(0)
        }
        Command::Info { path } => {
            let pipe = Pipe::open(&path)?;
            let metadata = pipe.metadata();
            println!("path: {}", path.display());
            println!("format: {}", metadata.format_name());
            println!("channels: {}", metadata.channels);
            println!("rate: {}", metadata.rate);
            println!("frame_size: {}", metadata.frame_size);
            println!("period_size: {}", metadata.period_size);
            println!("period_time_ns: {}", metadata.period_time);
            println!("readable: {}", metadata.readable);
            println!("writable: {}", metadata.writable);
            println!("slot_count: {}", pipe.backer().slot_count());
            Ok(0)
        }
        Command::Feed { path } => {
            let quit = install_quit_handler()?;
            let pipe = Pipe::open(&path)?;
            let inlet = match Inlet::new(&pipe) {
                Ok(inlet) => inlet,
                Err(err) => {
                    error!(%err, "failed to acquire writer session");
                    return Ok(1);
                }
            };
            let period = std::time::Duration::from_nanos(pipe.metadata().period_time);
            let bucket = TokenBucket::new(4, 1, period)?;
            let mut loop_ = ProducerLoop::new(inlet, bucket);
            let mut source = StdioCapture::new();
            match loop_.run(&mut source, &quit) {
                Ok(()) => Ok(0),
                Err(piper_session::SessionError::EndOfStream) => Ok(0),
                Err(err) => {
                    error!(%err, "feed loop aborted");
                    Ok(3)
                }
            }
        }
        Command::Drain { path } => {
            let quit = install_quit_handler()?;
            let pipe = Pipe::open(&path)?;
            let outlet = Outlet::new(&pipe);
            let period = std::time::Duration::from_nanos(pipe.metadata().period_time);
            let bucket = TokenBucket::new(4, 1, period)?;
            let mut loop_ = DrainLoop::new(outlet, bucket);
            let mut sink = StdioPlayback::new();
            match loop_.run(&mut sink, &quit) {
                Ok(()) => Ok(0),
                Err(err) => {
                    error!(%err, "drain loop aborted");
                    Ok(3)
                }
            }
        }
        Command::Unclog { path } => {
            let pipe = Pipe::open(&path)?;
            pipe.transport().unclog();
            info!(path = %path.display(), "session unclogged");
            Ok(0)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "fatal error");
            3
        }
    };
    std::process::exit(code);
}
