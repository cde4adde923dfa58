use serde::{Deserialize, Serialize};

/// Sentinel topic for missing, empty, or unparseable labels.
pub const OTHER_TOPIC: &str = "Other";

/// Acceptable year range for cleaned records; guards against parser
/// artifacts and placeholder dates in the raw catalogs.
pub const MIN_YEAR: i32 = 2007;
pub const MAX_YEAR: i32 = 2030;

/// One cleaned catalog row: the publication year and the canonical topic
/// token. The token is the cross-platform join key, so it must come out of
/// the same slug pass regardless of source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub year: i32,
    pub topic: String,
}

/// Fraction of a platform's courses in one (year, topic) cell.
/// For a fixed (platform, year), shares over all topics sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub year: i32,
    pub topic: String,
    pub share: f64, // [0.0, 1.0]
    pub platform: String,
}

/// One yearly-averaged search-interest observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPoint {
    pub year: i32,
    pub interest: f64,
}
