use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use h5live_capture::demux::{route, Routed};
use h5live_capture::sink::StreamSink;
use h5live_capture::transport::{LiveSession, DEFAULT_ENDPOINT};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// h5live-capture command line arguments
#[derive(Parser, Debug)]
#[command(name = "h5live-capture")]
#[command(version, about = "Capture tool for wcloud H5 player live endpoints", long_about = None)]
struct CliArgs {
    /// Live endpoint websocket URI
    #[arg(short = 'u', long, value_name = "URI", default_value = DEFAULT_ENDPOINT)]
    uri: String,

    /// Plaintext handshake parameter (encoded before send)
    #[arg(short = 'p', long, value_name = "VALUE", default_value = "")]
    param: String,

    /// Directory for captured stream files
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting h5live-capture v{}", env!("CARGO_PKG_VERSION"));
    tokio::fs::create_dir_all(&args.output_dir).await?;

    run(args).await?;
    Ok(())
}

/// Single receive loop: one outstanding receive at a time, flushes inline.
/// Returns only on fatal transport or flush failure.
async fn run(args: CliArgs) -> h5live_capture::Result<()> {
    let mut sink = StreamSink::new(&args.output_dir);

    tracing::info!("Connecting to {}", args.uri);
    let mut session = LiveSession::connect(&args.uri, &args.param).await?;

    loop {
        let frame = session.next_frame().await?;
        match route(&frame) {
            Routed::Channel(channel, payload) => {
                if let Some(path) = sink.append(channel, payload)? {
                    tracing::info!(channel = %channel, path = %path.display(), "buffer flushed");
                }
            }
            Routed::Ignored => {
                tracing::trace!(len = frame.len(), "unrecognized frame ignored");
            }
        }
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "h5live_capture=error",
        LogLevel::Warn => "h5live_capture=warn",
        LogLevel::Info => "h5live_capture=info",
        LogLevel::Debug => "h5live_capture=debug",
        LogLevel::Trace => "h5live_capture=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
