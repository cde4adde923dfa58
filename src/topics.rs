use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{NormalizedRecord, MAX_YEAR, MIN_YEAR, OTHER_TOPIC};
use crate::tables::RawTable;

/// Turn a free-text label into a canonical topic token: runs of
/// non-ASCII-alphanumeric characters become single underscores, each segment
/// is capitalized, and anything empty or unparseable maps to "Other".
/// Idempotent, so a token that went through once comes back unchanged.
pub fn slug_topic(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return OTHER_TOPIC.to_string();
    };

    let parts: Vec<String> = raw
        .trim()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
        .map(capitalize_segment)
        .collect();

    if parts.is_empty() {
        OTHER_TOPIC.to_string()
    } else {
        parts.join("_")
    }
}

fn capitalize_segment(segment: &str) -> String {
    let mut out = segment.to_ascii_lowercase();
    // Segments are pure ASCII alphanumerics after the split above.
    out[..1].make_ascii_uppercase();
    out
}

/// Remap Coursera's subject vocabulary onto the Udemy topic buckets so the
/// two catalogs overlap. Unknown labels pass through untouched and get
/// slugged by the caller. The table is fixed configuration data.
pub fn map_coursera_subject(raw: &str) -> &str {
    match raw {
        "Business" => "Business_Finance",
        "Information Technology" => "Web_Development",
        "Computer Science" => "Web_Development",
        "Data Science" => "Data_Science",
        "Health" => "Health_Fitness",
        "Arts And Humanities" => "Graphic_Design",
        "Personal Development" => "Personal_Development",
        "Physical Science And Engineering" => "Other",
        "Social Sciences" => "Other",
        "Language Learning" => "Other",
        "Math And Logic" => "Data_Tools",
        other => other,
    }
}

/// Extract a calendar year from a timestamp-ish cell. Accepts RFC3339 and
/// the common dateless/zoneless shapes seen in the Udemy dump; anything else
/// is a row-level "no year", never an error.
fn parse_timestamp_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.year());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.year());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.year());
    }
    None
}

fn year_in_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

/// Clean the Udemy catalog (timestamp-bearing source) down to
/// `{year, topic}`. Rows without a parseable in-range publication year are
/// dropped; the subject is slugged directly, no taxonomy remap.
pub fn clean_udemy(table: &RawTable) -> Vec<NormalizedRecord> {
    let ts_col = table.column("published_timestamp");
    let subject_col = table.column("subject");

    let mut out = Vec::new();
    let mut dropped = 0usize;
    for row in 0..table.len() {
        let year = ts_col
            .and_then(|col| table.cell(row, col))
            .and_then(parse_timestamp_year);

        let Some(year) = year.filter(|&y| year_in_range(y)) else {
            dropped += 1;
            continue;
        };

        let topic = slug_topic(subject_col.and_then(|col| table.cell(row, col)));
        out.push(NormalizedRecord { year, topic });
    }

    debug!("Udemy clean - input={}, kept={}, dropped={}", table.len(), out.len(), dropped);
    out
}

/// Clean the Coursera catalog (snapshot source) down to `{year, topic}`.
///
/// The source has no reliable per-row dates: when a `Year` column exists,
/// every row gets the integer median of its parseable values; otherwise the
/// snapshot hint (or 2025) applies. Collapsing per-row years into one
/// representative year is a deliberate precision loss carried over from the
/// upstream data handling.
pub fn clean_coursera(table: &RawTable, snapshot_year_hint: Option<i32>) -> Vec<NormalizedRecord> {
    let fallback_year = snapshot_year_hint.unwrap_or(2025);
    let year = match table.column("Year") {
        Some(col) => {
            let mut years: Vec<f64> = (0..table.len())
                .filter_map(|row| table.cell(row, col))
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect();
            if years.is_empty() {
                fallback_year
            } else {
                years.sort_by(|a, b| a.total_cmp(b));
                median(&years) as i32
            }
        }
        None => fallback_year,
    };

    // Primary category column, then the secondary spelling, then a constant.
    let category_col = table.column("Subject").or_else(|| table.column("Category"));

    let mut out = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let raw = category_col
            .and_then(|col| table.cell(row, col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(OTHER_TOPIC);
        let topic = slug_topic(Some(map_coursera_subject(raw)));
        out.push(NormalizedRecord { year, topic });
    }

    debug!("Coursera clean - rows={}, representative_year={}", out.len(), year);
    out
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udemy_table(rows: Vec<Vec<&str>>) -> RawTable {
        RawTable::new(
            vec!["published_timestamp".into(), "subject".into()],
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }

    #[test]
    fn slug_basic_and_idempotent() {
        assert_eq!(slug_topic(Some("Information Technology")), "Information_Technology");
        assert_eq!(slug_topic(Some("  web   development!! ")), "Web_Development");
        assert_eq!(slug_topic(Some("Web_Development")), "Web_Development");

        for s in ["Business Finance", "a--b__c", "3D & Animation", "données"] {
            let once = slug_topic(Some(s));
            assert_eq!(slug_topic(Some(once.as_str())), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn slug_output_charset_is_clean() {
        for s in ["  !!weird--input  ", "a*b*c", "___", "MiXeD CaSe 42"] {
            let out = slug_topic(Some(s));
            assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            assert!(!out.starts_with('_') && !out.ends_with('_'));
            assert!(!out.contains("__"));
        }
    }

    #[test]
    fn slug_missing_or_empty_is_other() {
        assert_eq!(slug_topic(None), "Other");
        assert_eq!(slug_topic(Some("")), "Other");
        assert_eq!(slug_topic(Some("   ")), "Other");
        assert_eq!(slug_topic(Some("!!!")), "Other");
    }

    #[test]
    fn coursera_subject_map_values() {
        assert_eq!(map_coursera_subject("Business"), "Business_Finance");
        assert_eq!(map_coursera_subject("Information Technology"), "Web_Development");
        assert_eq!(map_coursera_subject("Computer Science"), "Web_Development");
        assert_eq!(map_coursera_subject("Data Science"), "Data_Science");
        assert_eq!(map_coursera_subject("Health"), "Health_Fitness");
        assert_eq!(map_coursera_subject("Arts And Humanities"), "Graphic_Design");
        assert_eq!(map_coursera_subject("Personal Development"), "Personal_Development");
        assert_eq!(map_coursera_subject("Physical Science And Engineering"), "Other");
        assert_eq!(map_coursera_subject("Social Sciences"), "Other");
        assert_eq!(map_coursera_subject("Language Learning"), "Other");
        assert_eq!(map_coursera_subject("Math And Logic"), "Data_Tools");
        // no entry: passes through unchanged (case-sensitive)
        assert_eq!(map_coursera_subject("business"), "business");
        assert_eq!(map_coursera_subject("Music"), "Music");
    }

    #[test]
    fn udemy_clean_drops_bad_and_out_of_range_years() {
        let table = udemy_table(vec![
            vec!["2005-01-01T00:00:00Z", "Business"],
            vec!["2015-06-01T12:00:00Z", "Business"],
            vec!["2031-01-01T00:00:00Z", "Business"],
            vec!["not a date", "Business"],
        ]);
        let out = clean_udemy(&table);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], NormalizedRecord { year: 2015, topic: "Business".into() });
    }

    #[test]
    fn udemy_clean_accepts_common_timestamp_shapes() {
        let table = udemy_table(vec![
            vec!["2013-02-14T07:03:41Z", "Web Development"],
            vec!["2016-08-30 18:26:57", "Web Development"],
            vec!["2017-01-18", "Web Development"],
        ]);
        let out = clean_udemy(&table);
        assert_eq!(
            out.iter().map(|r| r.year).collect::<Vec<_>>(),
            vec![2013, 2016, 2017]
        );
    }

    #[test]
    fn udemy_clean_missing_timestamp_column_drops_everything() {
        let table = RawTable::new(
            vec!["subject".into()],
            vec![vec!["Business".into()], vec!["Design".into()]],
        );
        assert!(clean_udemy(&table).is_empty());
    }

    #[test]
    fn udemy_clean_missing_subject_defaults_to_other() {
        let table = RawTable::new(
            vec!["published_timestamp".into()],
            vec![vec!["2015-06-01T00:00:00Z".into()]],
        );
        let out = clean_udemy(&table);
        assert_eq!(out, vec![NormalizedRecord { year: 2015, topic: "Other".into() }]);
    }

    #[test]
    fn coursera_clean_uses_hint_when_no_year_column() {
        let table = RawTable::new(vec!["Subject".into()], vec![vec!["Business".into()]]);
        let out = clean_coursera(&table, Some(2020));
        assert_eq!(out, vec![NormalizedRecord { year: 2020, topic: "Business_Finance".into() }]);
    }

    #[test]
    fn coursera_clean_defaults_to_2025_without_hint() {
        let table = RawTable::new(vec!["Subject".into()], vec![vec!["Health".into()]]);
        let out = clean_coursera(&table, None);
        assert_eq!(out, vec![NormalizedRecord { year: 2025, topic: "Health_Fitness".into() }]);
    }

    #[test]
    fn coursera_clean_collapses_years_to_median() {
        let table = RawTable::new(
            vec!["Year".into(), "Subject".into()],
            vec![
                vec!["2018".into(), "Business".into()],
                vec!["2020".into(), "Health".into()],
                vec!["2021".into(), "garbage-year-below".into()],
                vec!["n/a".into(), "Data Science".into()],
            ],
        );
        let out = clean_coursera(&table, Some(1999));
        assert!(out.iter().all(|r| r.year == 2020));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn coursera_clean_year_column_all_garbage_falls_back_to_hint() {
        let table = RawTable::new(
            vec!["Year".into(), "Subject".into()],
            vec![vec!["??".into(), "Business".into()]],
        );
        let out = clean_coursera(&table, Some(2019));
        assert_eq!(out[0].year, 2019);
    }

    #[test]
    fn coursera_clean_falls_back_to_category_column() {
        let table = RawTable::new(
            vec!["Category".into()],
            vec![vec!["Math And Logic".into()]],
        );
        let out = clean_coursera(&table, Some(2022));
        assert_eq!(out[0].topic, "Data_Tools");
    }

    #[test]
    fn coursera_clean_no_category_columns_is_all_other() {
        let table = RawTable::new(
            vec!["course_title".into()],
            vec![vec!["Intro to Things".into()], vec!["More Things".into()]],
        );
        let out = clean_coursera(&table, Some(2022));
        assert!(out.iter().all(|r| r.topic == "Other"));
    }

    #[test]
    fn coursera_clean_blank_category_cell_is_other() {
        let table = RawTable::new(
            vec!["Subject".into()],
            vec![vec!["   ".into()]],
        );
        let out = clean_coursera(&table, Some(2022));
        assert_eq!(out[0].topic, "Other");
    }
}
