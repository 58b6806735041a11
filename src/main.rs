use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use xlog::{global, Options, Severity, StderrSink, Xlog};

/// Write one record through the configured logging pipelines
#[derive(Parser, Debug)]
#[command(name = "xlog", version)]
#[command(about = "Write a record to the JSON and text log pipelines")]
struct Args {
    /// TOML file with logging options (defaults apply to anything missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write through the text pipeline instead of the JSON one
    #[arg(long)]
    text: bool,

    /// Send console output to stderr instead of stdout
    #[arg(long)]
    stderr: bool,

    /// Severity: debug, info, warn, error, dpanic, panic or fatal
    level: String,

    /// Message words, joined with spaces
    #[arg(required = true)]
    message: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics of the logger itself go to stderr, filtered by RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "xlog=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let options = match &args.config {
        Some(path) => Options::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Options::default(),
    }
    .with_env_overrides();

    let mut builder = Xlog::builder(options);
    if args.stderr {
        builder = builder.console(StderrSink);
    }
    let xlog = builder.build().context("Failed to open log destinations")?;
    for path in xlog.log_files() {
        tracing::info!("Logging to: {}", path.display());
    }
    global::install(xlog).context("Failed to install logging context")?;

    let xlog = global::get();
    let logger = if args.text { xlog.text() } else { xlog.json() };
    let severity = Severity::parse(&args.level);
    let message = args.message.join(" ");

    let escalation = logger.log(severity, format_args!("{}", message), &[]);
    global::sync();

    if let Some(escalation) = escalation {
        escalation.raise();
    }
    Ok(())
}
