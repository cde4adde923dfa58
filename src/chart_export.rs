// src/chart_export.rs
//
// Chart-data JSON artifacts for the fixed chart set. Rendering itself is a
// frontend concern; each file here is one chart's already-aggregated data
// plus enough labeling to draw it.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::models::{InterestPoint, ShareRecord};
use crate::regression::LeadLag;

/// Udemy topics that get a dedicated share-over-time line chart.
const UDEMY_TREND_TOPICS: [&str; 4] =
    ["Business_Finance", "Web_Development", "Graphic_Design", "Musical_Instruments"];

const COURSERA_BAR_TOP_K: usize = 10;

/* -------------------------------------------------------------------------- */
/* Entry point                                                                */
/* -------------------------------------------------------------------------- */

/// Write every chart artifact into `figs_dir`, plus an index manifest.
/// Charts with no backing data are skipped with a log line, not an error.
pub fn write_all_charts(
    figs_dir: &Path,
    udemy_shares: &[ShareRecord],
    coursera_shares: &[ShareRecord],
    interest: &[InterestPoint],
    regression: &LeadLag,
    keyword: &str,
) -> Result<()> {
    fs::create_dir_all(figs_dir).with_context(|| format!("create {figs_dir:?}"))?;

    let mut written: Vec<String> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    // 1) Per-topic Udemy share lines
    for topic in UDEMY_TREND_TOPICS {
        let name = format!("chart.udemy_share.{}.json", topic.to_lowercase());
        match build_topic_line(udemy_shares, "Udemy", topic) {
            Some(line) => {
                write_json(figs_dir.join(&name), &line)?;
                written.push(name);
            }
            None => {
                info!("[skip] No Udemy rows for topic={}", topic);
                skipped.push(name);
            }
        }
    }

    // 2) Coursera top-topics bar for the latest snapshot year
    match build_top_topics_bar(coursera_shares, "Coursera", COURSERA_BAR_TOP_K) {
        Some(bar) => {
            write_json(figs_dir.join("chart.coursera_top_topics.json"), &bar)?;
            written.push("chart.coursera_top_topics.json".into());
        }
        None => {
            info!("[skip] No Coursera rows for top-topics bar");
            skipped.push("chart.coursera_top_topics.json".into());
        }
    }

    // 3) Udemy topic x year heatmap
    match build_heatmap(udemy_shares, "Udemy") {
        Some(heatmap) => {
            write_json(figs_dir.join("chart.udemy_topic_heatmap.json"), &heatmap)?;
            written.push("chart.udemy_topic_heatmap.json".into());
        }
        None => {
            info!("[skip] Empty heatmap pivot");
            skipped.push("chart.udemy_topic_heatmap.json".into());
        }
    }

    // 4) Combined: Udemy lines vs Coursera snapshot dots on shared topics
    match build_platform_comparison(udemy_shares, coursera_shares) {
        Some(cmp) => {
            write_json(figs_dir.join("chart.platform_comparison.json"), &cmp)?;
            written.push("chart.platform_comparison.json".into());
        }
        None => {
            info!("[skip] No overlapping topics between platforms");
            skipped.push("chart.platform_comparison.json".into());
        }
    }

    // 5) Yearly interest line
    if interest.is_empty() {
        info!("[skip] No interest data for trend line");
        skipped.push("chart.interest_line.json".into());
    } else {
        write_json(
            figs_dir.join("chart.interest_line.json"),
            &json!({ "keyword": keyword, "series": interest }),
        )?;
        written.push("chart.interest_line.json".into());
    }

    // 6) Regression scatter + fitted line
    match regression {
        LeadLag::Fitted(fit) => {
            write_json(
                figs_dir.join("chart.delta_share_vs_interest.json"),
                &json!({
                    "keyword": keyword,
                    "r2": fit.r2,
                    "slope": fit.slope,
                    "intercept": fit.intercept,
                    "points": fit.points,
                }),
            )?;
            written.push("chart.delta_share_vs_interest.json".into());
        }
        LeadLag::Skipped { reason } => {
            info!("[skip] No regression chart - reason={}", reason);
            skipped.push("chart.delta_share_vs_interest.json".into());
        }
    }

    // 7) Manifest
    let index = json!({
        "version": 1,
        "keyword": keyword,
        "files": written,
        "skipped": skipped,
    });
    write_json(figs_dir.join("charts.index.json"), &index)?;

    debug!("Chart bundle written - directory={}", figs_dir.display());
    Ok(())
}

fn write_json<P: AsRef<Path>, T: ?Sized + Serialize>(path: P, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .map(|_| ())
        .map_err(|e| e.into())
}

/* -------------------------------------------------------------------------- */
/* Chart builders (pure)                                                      */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Serialize)]
struct SharePoint {
    year: i32,
    share: f64,
}

#[derive(Debug, Serialize)]
struct TopicLine {
    platform: String,
    topic: String,
    series: Vec<SharePoint>,
}

fn build_topic_line(shares: &[ShareRecord], platform: &str, topic: &str) -> Option<TopicLine> {
    let mut series: Vec<SharePoint> = shares
        .iter()
        .filter(|s| s.platform == platform && s.topic == topic)
        .map(|s| SharePoint { year: s.year, share: s.share })
        .collect();
    if series.is_empty() {
        return None;
    }
    series.sort_by_key(|p| p.year);
    Some(TopicLine { platform: platform.to_string(), topic: topic.to_string(), series })
}

#[derive(Debug, Serialize)]
struct TopicBar {
    topic: String,
    share: f64,
}

#[derive(Debug, Serialize)]
struct TopTopicsBar {
    platform: String,
    year: i32,
    bars: Vec<TopicBar>,
}

/// Top-k topics by share for the platform's latest year, largest first.
fn build_top_topics_bar(shares: &[ShareRecord], platform: &str, top_k: usize) -> Option<TopTopicsBar> {
    let rows: Vec<&ShareRecord> = shares.iter().filter(|s| s.platform == platform).collect();
    let year = rows.iter().map(|s| s.year).max()?;

    let mut bars: Vec<TopicBar> = rows
        .iter()
        .filter(|s| s.year == year)
        .map(|s| TopicBar { topic: s.topic.clone(), share: s.share })
        .collect();
    bars.sort_by(|a, b| b.share.total_cmp(&a.share).then(a.topic.cmp(&b.topic)));
    bars.truncate(top_k);
    Some(TopTopicsBar { platform: platform.to_string(), year, bars })
}

#[derive(Debug, Serialize)]
struct Heatmap {
    platform: String,
    topics: Vec<String>,
    years: Vec<i32>,
    /// Row-major: shares[topic_idx][year_idx], missing cells 0.0.
    shares: Vec<Vec<f64>>,
}

fn build_heatmap(share_records: &[ShareRecord], platform: &str) -> Option<Heatmap> {
    let rows: Vec<&ShareRecord> =
        share_records.iter().filter(|s| s.platform == platform).collect();
    if rows.is_empty() {
        return None;
    }

    let topics: Vec<String> = rows
        .iter()
        .map(|s| s.topic.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let years: Vec<i32> = rows.iter().map(|s| s.year).collect::<BTreeSet<_>>().into_iter().collect();

    let cell: BTreeMap<(&str, i32), f64> =
        rows.iter().map(|s| ((s.topic.as_str(), s.year), s.share)).collect();

    let shares = topics
        .iter()
        .map(|t| {
            years
                .iter()
                .map(|&y| cell.get(&(t.as_str(), y)).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    Some(Heatmap { platform: platform.to_string(), topics, years, shares })
}

#[derive(Debug, Serialize)]
struct ComparisonTopic {
    topic: String,
    udemy: Vec<SharePoint>,
    coursera: Vec<SharePoint>,
}

#[derive(Debug, Serialize)]
struct PlatformComparison {
    topics: Vec<ComparisonTopic>,
}

/// Topics present on both platforms: Udemy as year-sorted lines, Coursera
/// snapshot shares as dots.
fn build_platform_comparison(
    udemy: &[ShareRecord],
    coursera: &[ShareRecord],
) -> Option<PlatformComparison> {
    let u_topics: BTreeSet<&str> = udemy.iter().map(|s| s.topic.as_str()).collect();
    let c_topics: BTreeSet<&str> = coursera.iter().map(|s| s.topic.as_str()).collect();
    let common: Vec<&str> = u_topics.intersection(&c_topics).copied().collect();
    if common.is_empty() {
        return None;
    }

    let topics = common
        .into_iter()
        .map(|topic| {
            let mut u_series: Vec<SharePoint> = udemy
                .iter()
                .filter(|s| s.topic == topic)
                .map(|s| SharePoint { year: s.year, share: s.share })
                .collect();
            u_series.sort_by_key(|p| p.year);
            let c_series: Vec<SharePoint> = coursera
                .iter()
                .filter(|s| s.topic == topic)
                .map(|s| SharePoint { year: s.year, share: s.share })
                .collect();
            ComparisonTopic { topic: topic.to_string(), udemy: u_series, coursera: c_series }
        })
        .collect();

    Some(PlatformComparison { topics })
}
