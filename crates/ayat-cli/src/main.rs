//! Ayat CLI - 命令行工具

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ayat_core::AyatConfig;

mod app;
mod eval_cmd;
mod fuse_cmd;
mod train_cmd;

#[derive(Parser)]
#[command(name = "ayat")]
#[command(about = "Ayat - Quranic verse ranking by fusing word-embedding models", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

/// 覆盖配置文件中的融合默认值
#[derive(Args, Debug, Clone, Default)]
pub struct FusionOverrides {
    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Return every result above the threshold
    #[arg(long, conflicts_with = "limit")]
    pub unbounded: bool,
    /// Fixed fused-score threshold
    #[arg(short, long)]
    pub threshold: Option<f32>,
    /// Use the adaptive 75th-percentile threshold
    #[arg(long, conflicts_with = "threshold")]
    pub adaptive: bool,
    /// Bonus added when two or more models agree
    #[arg(long)]
    pub voting_bonus: Option<f32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank verses for a query
    Fuse {
        /// Query text
        query: String,
        /// Fusion method (weighted, voting, meta)
        #[arg(short, long, default_value = "weighted")]
        method: String,
        #[command(flatten)]
        overrides: FusionOverrides,
    },
    /// Evaluate retrieval methods against ground truth
    Evaluate {
        /// Ground-truth query id
        query_id: String,
        /// Query text
        query: String,
        /// Comma-separated methods (default: all)
        #[arg(long, value_delimiter = ',')]
        methods: Vec<String>,
        #[command(flatten)]
        overrides: FusionOverrides,
    },
    /// Compare weighted, voting and meta fusion in one pass
    Compare {
        query_id: String,
        query: String,
        #[command(flatten)]
        overrides: FusionOverrides,
    },
    /// Collect meta-ranker training samples for a query
    Samples {
        query_id: String,
        query: String,
        /// Append samples to this JSON file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        overrides: FusionOverrides,
    },
    /// Train the meta-ranker from a samples file
    Train {
        /// JSON array of training samples
        samples: PathBuf,
        /// Artifact path (default: meta_ranker_path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show meta-ranker feature importance
    Importance {
        /// Artifact path (default: meta_ranker_path from config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let default_filter = if cli.verbose { "ayat=debug,info" } else { "ayat=info,warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.unwrap_or_else(AyatConfig::default_path);
    let config = AyatConfig::load(&config_path)?;
    tracing::debug!("Using configuration {}", config_path.display());

    match cli.command {
        Commands::Fuse { query, method, overrides } => {
            fuse_cmd::run(&config, &query, &method, &overrides)?;
        }
        Commands::Evaluate { query_id, query, methods, overrides } => {
            eval_cmd::evaluate(&config, &query_id, &query, &methods, &overrides)?;
        }
        Commands::Compare { query_id, query, overrides } => {
            eval_cmd::compare(&config, &query_id, &query, &overrides)?;
        }
        Commands::Samples { query_id, query, output, overrides } => {
            eval_cmd::samples(&config, &query_id, &query, output.as_deref(), &overrides)?;
        }
        Commands::Train { samples, output } => {
            train_cmd::train(&config, &samples, output.as_deref())?;
        }
        Commands::Importance { model } => {
            train_cmd::importance(&config, model.as_deref())?;
        }
    }

    Ok(())
}
