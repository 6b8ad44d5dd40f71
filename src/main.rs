use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use climate_etl::config::PipelineConfig;
use climate_etl::data::preview::pretty_head;
use climate_etl::pipeline;

/// Fetch the climate datasets, clean them and store them in SQLite.
#[derive(Parser)]
#[command(name = "climate-etl", version, about, long_about = None)]
struct Cli {
    /// TOML file overriding the built-in datasets and settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database to write to
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Only fetch, clean and store; skip the cross-dataset analyse step
    #[arg(long)]
    skip_analyse: bool,

    /// Print the first N rows of every cleaned table
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "5")]
    preview: Option<usize>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database = database;
    }
    if cli.skip_analyse {
        config.analyse.enabled = false;
    }

    let summary = pipeline::run(&config).context("running climate pipeline")?;

    if let Some(rows) = cli.preview {
        for (name, table) in &summary.cleaned {
            println!("{name}\n{}\n", pretty_head(table, rows)?);
        }
    }
    for (name, table) in summary.cleaned.iter().chain(&summary.analysed) {
        let (rows, cols) = table.shape();
        println!("{name}: {rows} rows x {cols} columns");
    }
    Ok(())
}
