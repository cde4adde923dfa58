use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{InterestPoint, ShareRecord};

/// Minimum joined rows required before fitting; below this the regression
/// is a reported skip, not a failure.
pub const MIN_REGRESSION_ROWS: usize = 10;

/// One joined observation: prior-year search interest against the current
/// year's change in topic share, plus the fitted value for chart rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionPoint {
    pub interest_lag: f64,
    pub delta_share: f64,
    pub fitted: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadLagFit {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
    /// Sorted by `interest_lag` so the fitted line renders cleanly.
    pub points: Vec<RegressionPoint>,
}

/// Outcome of the lead-lag fit. Thin data is a skip with a reason; `r2()`
/// reads 0.0 for skips so callers can report a neutral goodness-of-fit.
#[derive(Debug, Clone, Serialize)]
pub enum LeadLag {
    Skipped { reason: String },
    Fitted(LeadLagFit),
}

impl LeadLag {
    pub fn r2(&self) -> f64 {
        match self {
            LeadLag::Skipped { .. } => 0.0,
            LeadLag::Fitted(fit) => fit.r2,
        }
    }
}

/// Regress year-over-year topic-share deltas on the prior year's search
/// interest for one platform.
///
/// Within each topic, shares sort by year and difference against the
/// previous observed year; the interest series shifts forward one year so
/// interest(t-1) lines up with delta(t). Rows missing either side drop out
/// of the join. Fewer than [`MIN_REGRESSION_ROWS`] joined rows, or an empty
/// input on either side, skips the fit.
pub fn fit_lead_lag(shares: &[ShareRecord], platform: &str, interest: &[InterestPoint]) -> LeadLag {
    let platform_shares: Vec<&ShareRecord> =
        shares.iter().filter(|s| s.platform == platform).collect();

    if platform_shares.is_empty() || interest.is_empty() {
        warn!(
            "Regression skipped - platform={}, share_rows={}, interest_rows={}",
            platform,
            platform_shares.len(),
            interest.len()
        );
        return LeadLag::Skipped { reason: "not enough data".to_string() };
    }

    // topic -> year -> share, year-sorted per topic
    let mut by_topic: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for s in &platform_shares {
        by_topic.entry(s.topic.as_str()).or_default().insert(s.year, s.share);
    }

    // interest(t-1) keyed by t
    let lagged: BTreeMap<i32, f64> =
        interest.iter().map(|p| (p.year + 1, p.interest)).collect();

    let mut points = Vec::new();
    for years in by_topic.values() {
        let mut prev: Option<f64> = None;
        for (year, share) in years {
            if let (Some(prev_share), Some(&interest_lag)) = (prev, lagged.get(year)) {
                points.push(RegressionPoint {
                    interest_lag,
                    delta_share: share - prev_share,
                    fitted: 0.0,
                });
            }
            prev = Some(*share);
        }
    }

    if points.len() < MIN_REGRESSION_ROWS {
        warn!(
            "Regression skipped - platform={}, joined_rows={}, required={}",
            platform,
            points.len(),
            MIN_REGRESSION_ROWS
        );
        return LeadLag::Skipped { reason: format!("too few joined rows ({})", points.len()) };
    }

    let (slope, intercept) = ols_line(&points);
    for p in points.iter_mut() {
        p.fitted = slope * p.interest_lag + intercept;
    }
    points.sort_by(|a, b| a.interest_lag.total_cmp(&b.interest_lag));

    let r2 = r_squared(&points);
    debug!(
        "Regression fitted - platform={}, rows={}, slope={:.6}, intercept={:.6}",
        platform,
        points.len(),
        slope,
        intercept
    );
    info!("Regression completed - platform={}, r2={:.4}", platform, r2);

    LeadLag::Fitted(LeadLagFit { slope, intercept, r2, points })
}

/// Closed-form single-predictor least squares: slope = cov(x,y)/var(x).
fn ols_line(points: &[RegressionPoint]) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.interest_lag).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.delta_share).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for p in points {
        let dx = p.interest_lag - mean_x;
        cov += dx * (p.delta_share - mean_y);
        var += dx * dx;
    }

    if var == 0.0 {
        // degenerate predictor: flat line at the mean response
        return (0.0, mean_y);
    }
    let slope = cov / var;
    (slope, mean_y - slope * mean_x)
}

fn r_squared(points: &[RegressionPoint]) -> f64 {
    let n = points.len() as f64;
    let mean_y = points.iter().map(|p| p.delta_share).sum::<f64>() / n;

    let ss_res: f64 = points.iter().map(|p| (p.delta_share - p.fitted).powi(2)).sum();
    let ss_tot: f64 = points.iter().map(|p| (p.delta_share - mean_y).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(year: i32, topic: &str, share: f64) -> ShareRecord {
        ShareRecord { year, topic: topic.to_string(), share, platform: "Udemy".to_string() }
    }

    fn interest(year: i32, value: f64) -> InterestPoint {
        InterestPoint { year, interest: value }
    }

    /// Shares whose per-topic deltas follow delta = 0.01 * interest(t-1)
    /// exactly, across two topics and seven years (12 delta rows).
    fn linear_fixture() -> (Vec<ShareRecord>, Vec<InterestPoint>) {
        let mut shares = Vec::new();
        let mut series = Vec::new();
        for (i, year) in (2010..=2016).enumerate() {
            let v = 10.0 + i as f64 * 5.0;
            series.push(interest(year, v));
        }
        for topic in ["Business_Finance", "Web_Development"] {
            let mut s = 0.10;
            shares.push(share(2010, topic, s));
            for year in 2011..=2016 {
                let lag = series.iter().find(|p| p.year == year - 1).unwrap().interest;
                s += 0.01 * lag;
                shares.push(share(year, topic, s));
            }
        }
        (shares, series)
    }

    #[test]
    fn empty_shares_skip_with_zero_r2() {
        let out = fit_lead_lag(&[], "Udemy", &[interest(2015, 50.0)]);
        assert!(matches!(out, LeadLag::Skipped { .. }));
        assert_eq!(out.r2(), 0.0);
    }

    #[test]
    fn empty_interest_skips() {
        let out = fit_lead_lag(&[share(2015, "Business", 1.0)], "Udemy", &[]);
        assert!(matches!(out, LeadLag::Skipped { .. }));
        assert_eq!(out.r2(), 0.0);
    }

    #[test]
    fn wrong_platform_rows_do_not_count() {
        let shares = vec![share(2015, "Business", 1.0)];
        let out = fit_lead_lag(&shares, "Coursera", &[interest(2014, 40.0)]);
        assert!(matches!(out, LeadLag::Skipped { .. }));
    }

    #[test]
    fn fewer_than_ten_joined_rows_skips() {
        // one topic, 6 years -> 5 deltas, all joinable, still under the floor
        let shares: Vec<ShareRecord> =
            (2010..=2015).map(|y| share(y, "Business", 0.1 * (y - 2009) as f64)).collect();
        let series: Vec<InterestPoint> = (2009..=2015).map(|y| interest(y, 42.0)).collect();
        let out = fit_lead_lag(&shares, "Udemy", &series);
        assert!(matches!(out, LeadLag::Skipped { .. }));
        assert_eq!(out.r2(), 0.0);
    }

    #[test]
    fn perfectly_linear_data_fits_with_r2_one() {
        let (shares, series) = linear_fixture();
        let out = fit_lead_lag(&shares, "Udemy", &series);
        let LeadLag::Fitted(fit) = out else {
            panic!("expected a fit, got {out:?}");
        };
        assert_eq!(fit.points.len(), 12);
        assert!((fit.r2 - 1.0).abs() < 1e-9, "r2 = {}", fit.r2);
        assert!((fit.slope - 0.01).abs() < 1e-9, "slope = {}", fit.slope);
    }

    #[test]
    fn fitted_points_are_sorted_by_predictor() {
        let (shares, series) = linear_fixture();
        let LeadLag::Fitted(fit) = fit_lead_lag(&shares, "Udemy", &series) else {
            panic!("expected a fit");
        };
        for pair in fit.points.windows(2) {
            assert!(pair[0].interest_lag <= pair[1].interest_lag);
        }
    }

    #[test]
    fn first_year_per_topic_produces_no_delta() {
        // 2010 rows contribute no delta; only 2011..=2016 do (6 per topic).
        let (shares, series) = linear_fixture();
        let LeadLag::Fitted(fit) = fit_lead_lag(&shares, "Udemy", &series) else {
            panic!("expected a fit");
        };
        assert_eq!(fit.points.len(), 2 * 6);
    }
}
