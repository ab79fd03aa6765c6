use std::env;
use std::io::Write;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use diffmark_core::{
    config::SearchConfig,
    search::SearchSession,
    source::{SourceRegistry, WorkdirChangeSource},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "diffmark-search")]
#[command(about = "Find regex matches inside the changed characters of a git working tree", long_about = None)]
struct Args {
    /// Any path inside the repository to search
    repo: Utf8PathBuf,

    /// Regular expression to look for in added text
    #[arg(allow_hyphen_values = true)]
    pattern: String,

    /// JSON file with search settings
    #[arg(long)]
    config: Option<Utf8PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SearchConfig::load(path.as_std_path())
            .with_context(|| format!("failed to load config from {path}"))?,
        None => SearchConfig::default(),
    };

    let source = WorkdirChangeSource::open(args.repo.as_std_path(), &config)
        .with_context(|| format!("failed to open repository at {}", args.repo))?;
    let mut registry = SourceRegistry::new();
    registry.register(source);

    let session = SearchSession::new(registry, config);
    let outcome = session
        .search(&args.pattern)
        .with_context(|| format!("search for {:?} failed", args.pattern))?
        .context("search pass was superseded")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &outcome).context("failed to write results")?;
    writeln!(out).context("failed to write results")?;
    Ok(())
}

/// `DIFFMARK_LOG` wins over `RUST_LOG`; without either only warnings are shown.
fn init_logging() {
    let filter = env::var("DIFFMARK_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .map_or_else(|_| EnvFilter::new("warn"), EnvFilter::new);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
