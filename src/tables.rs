use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::{debug, warn};

/// A raw flat table: header row plus string cells, input order preserved.
/// Column lookup is exact and case-sensitive; a missing cell reads as `None`
/// so the cleaners can apply their own defaults.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawTable { headers, rows }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a CSV into a [`RawTable`]; `None` on a missing or unreadable file.
/// Downstream stages treat an absent table as "no data", not a failure.
pub fn read_table(path: &Path) -> Option<RawTable> {
    if !path.exists() {
        warn!("Input file not found - path={}", path.display());
        return None;
    }

    let mut reader = match ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(r) => r,
        Err(e) => {
            warn!("Error opening CSV - path={}, error={}", path.display(), e);
            return None;
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            warn!("Error reading CSV header - path={}, error={}", path.display(), e);
            return None;
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(rec) => rows.push(rec.iter().map(str::to_string).collect()),
            Err(e) => {
                // One mangled line should not sink the table.
                debug!("Skipping malformed CSV row - path={}, error={}", path.display(), e);
            }
        }
    }

    debug!("Read table - path={}, rows={}, columns={}", path.display(), rows.len(), headers.len());
    Some(RawTable { headers, rows })
}

/// Write serializable records as CSV with an explicit header row and no index
/// column. The header is written even for an empty record set so the output
/// always carries its schema. Returns false on failure instead of raising;
/// the pipeline continues best-effort.
pub fn write_records<T: Serialize>(path: &Path, headers: &[&str], records: &[T]) -> bool {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Error creating output directory - path={}, error={}", parent.display(), e);
            return false;
        }
    }

    let write = || -> csv::Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(headers)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    };

    match write() {
        Ok(()) => {
            debug!("Wrote table - path={}, rows={}", path.display(), records.len());
            true
        }
        Err(e) => {
            warn!("Error writing CSV - path={}, error={}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RawTable {
        RawTable::new(
            vec!["Year".into(), "Subject".into()],
            vec![
                vec!["2020".into(), "Business".into()],
                vec!["2021".into()], // short row
            ],
        )
    }

    #[test]
    fn column_lookup_is_exact_and_case_sensitive() {
        let t = sample_table();
        assert_eq!(t.column("Year"), Some(0));
        assert_eq!(t.column("year"), None);
        assert_eq!(t.column("Category"), None);
    }

    #[test]
    fn short_rows_read_as_missing_cells() {
        let t = sample_table();
        assert_eq!(t.cell(1, 0), Some("2021"));
        assert_eq!(t.cell(1, 1), None);
    }

    #[test]
    fn read_table_missing_file_is_none() {
        let path = Path::new("definitely/does/not/exist.csv");
        assert!(read_table(path).is_none());
    }
}
