use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::InterestPoint;

/// Escalating waits between attempts; Google Trends rate-limits hard (429),
/// so the whole explore+widgetdata sequence retries on this schedule.
const RETRY_DELAYS_SECS: [u64; 5] = [0, 2, 4, 8, 16];

/// One weekly observation straight off the timeline endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPoint {
    pub epoch_secs: i64,
    pub interest: f64,
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: Timeline,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(rename = "timelineData")]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    time: String, // unix seconds as a string
    #[serde(default)]
    value: Vec<f64>,
}

fn trends_base_url() -> String {
    std::env::var("TRENDS_BASE_URL").unwrap_or_else(|_| "https://trends.google.com".to_string())
}

/// Trends API responses carry an XSSI guard prefix (`)]}'` plus a comma)
/// before the JSON body; strip it before parsing.
fn strip_xssi_prefix(body: &str) -> &str {
    match body.find('{') {
        Some(idx) => &body[idx..],
        None => body,
    }
}

async fn fetch_weekly_once(
    client: &Client,
    keyword: &str,
    timeframe: &str,
    geo: &str,
) -> Result<Vec<WeeklyPoint>> {
    let base = trends_base_url();

    // step 1: explore, to obtain the TIMESERIES widget token
    let explore_req = serde_json::json!({
        "comparisonItem": [{ "keyword": keyword, "geo": geo, "time": timeframe }],
        "category": 0,
        "property": "",
    });
    let explore_req = explore_req.to_string();
    let body = client
        .get(format!("{base}/trends/api/explore"))
        .query(&[("hl", "en-US"), ("tz", "360"), ("req", explore_req.as_str())])
        .send()
        .await
        .context("explore request failed")?
        .error_for_status()
        .context("explore returned an error status")?
        .text()
        .await
        .context("reading explore body")?;

    let explore: ExploreResponse =
        serde_json::from_str(strip_xssi_prefix(&body)).context("decoding explore JSON")?;
    let widget = explore
        .widgets
        .into_iter()
        .find(|w| w.id == "TIMESERIES")
        .context("no TIMESERIES widget in explore response")?;

    // step 2: widgetdata/multiline, the actual interest-over-time series
    let widget_req = widget.request.to_string();
    let body = client
        .get(format!("{base}/trends/api/widgetdata/multiline"))
        .query(&[
            ("hl", "en-US"),
            ("tz", "360"),
            ("req", widget_req.as_str()),
            ("token", widget.token.as_str()),
        ])
        .send()
        .await
        .context("widgetdata request failed")?
        .error_for_status()
        .context("widgetdata returned an error status")?
        .text()
        .await
        .context("reading widgetdata body")?;

    let multiline: MultilineResponse =
        serde_json::from_str(strip_xssi_prefix(&body)).context("decoding widgetdata JSON")?;

    Ok(timeline_points(multiline))
}

/// Points with an unparseable timestamp or no value drop out silently.
fn timeline_points(multiline: MultilineResponse) -> Vec<WeeklyPoint> {
    multiline
        .default
        .timeline_data
        .into_iter()
        .filter_map(|p| {
            let epoch_secs = p.time.trim().parse::<i64>().ok()?;
            let interest = *p.value.first()?;
            Some(WeeklyPoint { epoch_secs, interest })
        })
        .collect()
}

/// Fetch the weekly interest series for one keyword, retrying on the backoff
/// schedule. Exhausted retries mean an empty series, never an error; the
/// caller treats that as "no data".
pub async fn fetch_interest_weekly(
    client: &Client,
    keyword: &str,
    timeframe: &str,
    geo: &str,
) -> Vec<WeeklyPoint> {
    let start = std::time::Instant::now();
    for delay in RETRY_DELAYS_SECS {
        if delay > 0 {
            debug!("Trends retry backoff - delay={}s, keyword={}", delay, keyword);
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
        match fetch_weekly_once(client, keyword, timeframe, geo).await {
            Ok(points) => {
                info!(
                    "Trends fetch completed - keyword={}, timeframe={}, points={}, duration={:.2}s",
                    keyword,
                    timeframe,
                    points.len(),
                    start.elapsed().as_secs_f32()
                );
                return points;
            }
            Err(e) => {
                warn!("Trends fetch attempt failed - keyword={}, error={:#}", keyword, e);
            }
        }
    }
    warn!("Trends fetch exhausted retries - keyword={}, returning empty series", keyword);
    Vec::new()
}

/// Average weekly points into one observation per calendar year, sorted by
/// year. Pure; the network never reaches this function.
pub fn aggregate_yearly(weekly: &[WeeklyPoint]) -> Vec<InterestPoint> {
    let mut buckets: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for p in weekly {
        let Some(dt) = DateTime::from_timestamp(p.epoch_secs, 0) else {
            continue;
        };
        let entry = buckets.entry(dt.year()).or_insert((0.0, 0));
        entry.0 += p.interest;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(year, (sum, n))| InterestPoint { year, interest: sum / n as f64 })
        .collect()
}

/// Fetch and yearly-average interest for a closed year range
/// (Jan 1 of `start_year` through Dec 31 of `end_year`).
pub async fn fetch_interest_yearly(
    client: &Client,
    keyword: &str,
    start_year: i32,
    end_year: i32,
) -> Vec<InterestPoint> {
    let timeframe = format!("{start_year}-01-01 {end_year}-12-31");
    let weekly = fetch_interest_weekly(client, keyword, &timeframe, "").await;
    if weekly.is_empty() {
        return Vec::new();
    }
    let yearly = aggregate_yearly(&weekly);
    debug!(
        "Yearly aggregation - keyword={}, weekly_points={}, years={}",
        keyword,
        weekly.len(),
        yearly.len()
    );
    yearly
}
