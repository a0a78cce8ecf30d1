use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use work_reconciler::{reconcile_files, ReconcileConfig, RunPaths};

#[derive(Parser)]
#[command(
    name = "reconcile",
    about = "Match harvested titles of historical works against a canonical catalog",
    version,
    long_about = None
)]
struct Cli {
    /// Harvested records: author, title, url
    #[arg(long)]
    records: PathBuf,

    /// Author inference table: author, author_payload
    #[arg(long)]
    authors: PathBuf,

    /// Canonical works: author_id, work_id, title
    #[arg(long)]
    works: PathBuf,

    /// Where to write the decision table
    #[arg(long)]
    output: PathBuf,

    /// TOML config; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tab-separated form/lemma lexicon, overrides the config entry
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Process records on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReconcileConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReconcileConfig::default(),
    };
    if let Some(lexicon) = cli.lexicon {
        config.normalization.lexicon_path = Some(lexicon);
    }
    if cli.sequential {
        config.runtime.parallel = false;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        records = %cli.records.display(),
        works = %cli.works.display(),
        "starting reconciliation"
    );

    let paths = RunPaths {
        records: &cli.records,
        authors: &cli.authors,
        works: &cli.works,
        output: &cli.output,
    };
    let summary = reconcile_files(&paths, &config).context("reconciliation failed")?;

    info!(
        records = summary.records,
        rows = summary.decisions,
        matched = summary.matched,
        flagged = summary.flagged_rows,
        output = %cli.output.display(),
        "done"
    );
    Ok(())
}
