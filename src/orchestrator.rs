use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::chart_export::write_all_charts;
use crate::models::{InterestPoint, NormalizedRecord, ShareRecord};
use crate::regression::{fit_lead_lag, LeadLag};
use crate::shares::topic_share_by_year;
use crate::tables::{read_table, write_records, RawTable};
use crate::topics::{clean_coursera, clean_udemy, slug_topic};
use crate::trends::fetch_interest_yearly;

pub const UDEMY_RAW_FILE: &str = "udemy_online_education_courses_dataset.csv";
pub const COURSERA_RAW_FILE: &str = "Coursera.csv";

/// Fallback fetch range when the Udemy share table is empty.
const DEFAULT_TREND_RANGE: (i32, i32) = (2010, 2017);

const NORMALIZED_HEADERS: [&str; 2] = ["year", "topic"];
const SHARE_HEADERS: [&str; 4] = ["year", "topic", "share", "platform"];
const INTEREST_HEADERS: [&str; 2] = ["year", "interest"];

pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keyword: String,
    pub snapshot_year: Option<i32>,
    pub skip_trends: bool,
}

/// End-to-end run: read raw catalogs, clean, aggregate shares, persist
/// tables, fetch yearly search interest, fit the lead-lag regression, and
/// write the chart bundle. Missing inputs and thin data degrade to logged
/// skips; only unexpected orchestration errors propagate.
pub async fn run_pipeline(cfg: &PipelineConfig) -> Result<()> {
    let pipeline_start = std::time::Instant::now();
    info!(
        "Pipeline started - data_dir={}, output_dir={}, keyword={}",
        cfg.data_dir.display(),
        cfg.output_dir.display(),
        cfg.keyword
    );

    // 1) output layout (idempotent)
    let outputs_dir = cfg.output_dir.join("outputs");
    let figs_dir = cfg.output_dir.join("figs");
    std::fs::create_dir_all(&outputs_dir)
        .with_context(|| format!("create {}", outputs_dir.display()))?;
    std::fs::create_dir_all(&figs_dir).with_context(|| format!("create {}", figs_dir.display()))?;
    debug!("Output directories ready - outputs={}, figs={}", outputs_dir.display(), figs_dir.display());

    // 2) read raw tables; a missing file is an empty dataset downstream
    let udemy_raw = read_table(&cfg.data_dir.join(UDEMY_RAW_FILE));
    let coursera_raw = read_table(&cfg.data_dir.join(COURSERA_RAW_FILE));

    // 3) clean both catalogs and persist the normalized tables
    let clean_start = std::time::Instant::now();
    let udemy_clean: Vec<NormalizedRecord> =
        udemy_raw.as_ref().map(clean_udemy).unwrap_or_default();
    let coursera_clean: Vec<NormalizedRecord> = coursera_raw
        .as_ref()
        .map(|t: &RawTable| clean_coursera(t, cfg.snapshot_year))
        .unwrap_or_default();

    write_records(&outputs_dir.join("udemy_clean.csv"), &NORMALIZED_HEADERS, &udemy_clean);
    write_records(&outputs_dir.join("coursera_clean.csv"), &NORMALIZED_HEADERS, &coursera_clean);
    info!(
        "Cleaning completed - duration={:.2}s, udemy_rows={}, coursera_rows={}",
        clean_start.elapsed().as_secs_f32(),
        udemy_clean.len(),
        coursera_clean.len()
    );

    // 4) yearly topic shares per platform
    let share_start = std::time::Instant::now();
    let udemy_shares = topic_share_by_year(&udemy_clean, "Udemy");
    let coursera_shares = topic_share_by_year(&coursera_clean, "Coursera");

    write_records(&outputs_dir.join("udemy_topic_shares.csv"), &SHARE_HEADERS, &udemy_shares);
    write_records(&outputs_dir.join("coursera_topic_shares.csv"), &SHARE_HEADERS, &coursera_shares);
    info!(
        "Share aggregation completed - duration={:.2}s, udemy_cells={}, coursera_cells={}",
        share_start.elapsed().as_secs_f32(),
        udemy_shares.len(),
        coursera_shares.len()
    );

    // 5) yearly search interest; range from observed Udemy share years
    let (start_year, end_year) = trend_year_range(&udemy_shares);
    let interest: Vec<InterestPoint> = if cfg.skip_trends {
        info!("Trends fetch skipped - --skip-trends set");
        Vec::new()
    } else {
        let fetch_start = std::time::Instant::now();
        let client = Client::builder().build()?;
        let series = fetch_interest_yearly(&client, &cfg.keyword, start_year, end_year).await;
        info!(
            "Trends stage completed - duration={:.2}s, years={}..={}, points={}",
            fetch_start.elapsed().as_secs_f32(),
            start_year,
            end_year,
            series.len()
        );
        series
    };

    persist_interest(&outputs_dir, &cfg.keyword, &interest);

    // 6) lead-lag regression: delta share ~ prior-year interest
    let regression = fit_lead_lag(&udemy_shares, "Udemy", &interest);
    match &regression {
        LeadLag::Fitted(fit) => info!(
            "Lead-lag result - r2={:.4}: {:.1}% of delta-share variance explained by prior-year interest",
            fit.r2,
            fit.r2 * 100.0
        ),
        LeadLag::Skipped { reason } => {
            info!("Lead-lag result - skipped ({}), neutral r2=0.0", reason)
        }
    }

    // 7) chart bundle (last, so the regression chart can ride along)
    write_all_charts(
        &figs_dir,
        &udemy_shares,
        &coursera_shares,
        &interest,
        &regression,
        &cfg.keyword,
    )?;

    info!(
        "Pipeline completed - total_duration={:.2}s, udemy_share_cells={}, coursera_share_cells={}, interest_points={}",
        pipeline_start.elapsed().as_secs_f32(),
        udemy_shares.len(),
        coursera_shares.len(),
        interest.len()
    );
    Ok(())
}

/// Fetch range: one year before the earliest observed share year through the
/// latest, so the lagged join has a prior-year observation for every delta.
fn trend_year_range(shares: &[ShareRecord]) -> (i32, i32) {
    let min = shares.iter().map(|s| s.year).min();
    let max = shares.iter().map(|s| s.year).max();
    match (min, max) {
        (Some(min), Some(max)) => (min - 1, max),
        _ => DEFAULT_TREND_RANGE,
    }
}

/// Write the yearly series CSV (even when empty, as a schema-bearing trace)
/// and a small JSON preview of the first 5 points for quick inspection.
fn persist_interest(outputs_dir: &Path, keyword: &str, interest: &[InterestPoint]) {
    let kw_slug = slug_topic(Some(keyword)).to_lowercase();
    write_records(
        &outputs_dir.join(format!("trends_{kw_slug}_yearly.csv")),
        &INTEREST_HEADERS,
        interest,
    );

    if interest.is_empty() {
        info!("[skip] No interest data, preview not written");
        return;
    }
    let preview: Vec<&InterestPoint> = interest.iter().take(5).collect();
    let path = outputs_dir.join(format!("trends_{kw_slug}_preview.json"));
    match serde_json::to_vec_pretty(&preview) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&path, bytes) {
                warn!("Could not write preview JSON - path={}, error={}", path.display(), e);
            } else {
                debug!("Wrote preview - path={}", path.display());
            }
        }
        Err(e) => warn!("Could not encode preview JSON - error={}", e),
    }
}
