//! Command-line reader for files stored on sharded cloud storage.

mod config;
mod parts;

use anyhow::{Context, Result};
use cirrus_client::{Account, metrics};
use cirrus_core::ShardCategory;
use cirrus_stream::DownloadStream;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cirrus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "CIRRUS_CONFIG", default_value = "cirrus.toml")]
    config: PathBuf,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, default_value_t = false)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a file, or a byte range of it, to stdout or a file
    Cat {
        /// Part as PATH=SIZE or PUBLIC_LINK=SIZE; repeat in file order for
        /// split files
        #[arg(long = "part", required = true)]
        parts: Vec<String>,

        /// Display name of a split file
        #[arg(long)]
        name: Option<String>,

        /// Inclusive byte range: START-END or START-
        #[arg(long)]
        range: Option<String>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the current shard for every category
    Shards,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `cat` output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    metrics::register_metrics();

    let config = config::load_config(&cli.config)?;
    let account = Account::connect(&config).context("failed to create account context")?;

    let result = match cli.command {
        Commands::Cat {
            parts,
            name,
            range,
            output,
        } => handle_cat(&account, name, &parts, range.as_deref(), output).await,
        Commands::Shards => handle_shards(&account).await,
    };

    if cli.metrics {
        eprint!("{}", metrics::render().context("failed to render metrics")?);
    }
    result
}

async fn handle_cat(
    account: &Account,
    name: Option<String>,
    parts: &[String],
    range: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let file = parts::logical_file(name, parts)?;
    let (start, end) = match range {
        Some(arg) => parts::parse_range(arg)?,
        None => (None, None),
    };

    let mut stream = DownloadStream::open(account, file, start, end)?;
    tracing::info!(
        file = stream.name(),
        range = ?stream.range(),
        bytes = stream.len(),
        "streaming"
    );

    let copied = match output {
        Some(path) => {
            let mut out = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            let copied = tokio::io::copy(&mut stream, &mut out).await?;
            out.flush().await?;
            copied
        }
        None => {
            let mut out = tokio::io::stdout();
            let copied = tokio::io::copy(&mut stream, &mut out).await?;
            out.flush().await?;
            copied
        }
    };

    stream.close().await?;
    tracing::info!(bytes = copied, "done");
    Ok(())
}

async fn handle_shards(account: &Account) -> Result<()> {
    let shards = account
        .directory()
        .snapshot()
        .await
        .context("failed to fetch shard directory")?;

    for category in ShardCategory::ALL {
        match shards.get(&category) {
            Some(endpoint) => {
                let banned = if account.blacklist().is_banned(endpoint) {
                    " (banned)"
                } else {
                    ""
                };
                println!("{:<20} {}{banned}", category.as_str(), endpoint.url());
            }
            None => println!("{:<20} -", category.as_str()),
        }
    }
    Ok(())
}
