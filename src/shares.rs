use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{NormalizedRecord, ShareRecord};

/// Compute within-year topic shares for one platform: count rows per
/// (year, topic), divide by the year's total, and label every output row
/// with the platform. Empty input is empty output, never an error.
///
/// Output is sorted by (year, topic); per (platform, year) the shares sum
/// to 1.0 within floating-point tolerance.
pub fn topic_share_by_year(records: &[NormalizedRecord], platform: &str) -> Vec<ShareRecord> {
    if records.is_empty() {
        debug!("Share aggregation - no input rows, platform={}", platform);
        return Vec::new();
    }

    let mut counts: BTreeMap<(i32, &str), usize> = BTreeMap::new();
    let mut totals: BTreeMap<i32, usize> = BTreeMap::new();
    for r in records {
        *counts.entry((r.year, r.topic.as_str())).or_insert(0) += 1;
        *totals.entry(r.year).or_insert(0) += 1;
    }

    let out: Vec<ShareRecord> = counts
        .into_iter()
        .map(|((year, topic), n)| ShareRecord {
            year,
            topic: topic.to_string(),
            share: n as f64 / totals[&year] as f64,
            platform: platform.to_string(),
        })
        .collect();

    debug!(
        "Share aggregation - platform={}, input_rows={}, cells={}, years={}",
        platform,
        records.len(),
        out.len(),
        totals.len()
    );
    out
}
