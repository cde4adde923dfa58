mod chart_export;
mod models;
mod orchestrator;
mod regression;
mod shares;
mod tables;
mod topics;
mod trends;

use anyhow::Result;
use clap::Parser;
use orchestrator::{run_pipeline, PipelineConfig, COURSERA_RAW_FILE, UDEMY_RAW_FILE};
use tracing::{info, warn};

/// Course-topic trends - yearly topic shares across course platforms,
/// cross-referenced against search interest
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the raw catalog CSVs (default: "data")
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    /// Root directory for generated tables and chart data (default: "results")
    #[arg(short, long, default_value = "results")]
    output_dir: String,

    /// Search keyword for the interest-over-time series
    #[arg(short, long, default_value = "machine learning")]
    keyword: String,

    /// Snapshot year applied to the Coursera catalog when it carries no
    /// usable Year column (default: 2025)
    #[arg(long)]
    snapshot_year: Option<i32>,

    /// Skip the network fetch; regression and trend charts become skips
    #[arg(long)]
    skip_trends: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting course_topic_trends");

    let args = Args::parse();
    let data_dir = std::path::PathBuf::from(&args.data_dir);

    // Friendlier note up front; missing inputs degrade to empty outputs
    // rather than aborting, so this is a warning and not an error.
    for file in [UDEMY_RAW_FILE, COURSERA_RAW_FILE] {
        let path = data_dir.join(file);
        if !path.exists() {
            warn!("Expected input not found - path={} (stage will be skipped)", path.display());
        }
    }

    let cfg = PipelineConfig {
        data_dir,
        output_dir: std::path::PathBuf::from(&args.output_dir),
        keyword: args.keyword,
        snapshot_year: args.snapshot_year,
        skip_trends: args.skip_trends,
    };

    run_pipeline(&cfg).await
}
