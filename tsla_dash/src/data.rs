//! CSV data source: the spreadsheet export read into raw text rows.
//!
//! Nothing here interprets cell contents beyond "present or empty"; that is
//! the job of [`crate::series::SeriesAdapter`].

use crate::config::ColumnMap;
use crate::debug_hooks;
use crate::error::DataFormatError;
use crate::series::{Series, SeriesAdapter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One data row as text. `row` is 1-based and counts data rows only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub row: usize,
    pub timestamp: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
    pub support: Option<String>,
    pub resistance: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Format(#[from] DataFormatError),
}

pub trait DataSource {
    fn describe(&self) -> String;
    fn rows(&self) -> Result<Vec<RawRow>, LoadError>;

    fn load_series(&self) -> Result<Series, LoadError> {
        let rows = self.rows()?;
        Ok(SeriesAdapter::adapt(&rows)?)
    }
}

pub struct CsvSource {
    path: PathBuf,
    columns: ColumnMap,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P, columns: ColumnMap) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns,
        }
    }
}

impl DataSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn rows(&self) -> Result<Vec<RawRow>, LoadError> {
        debug_hooks::log_data_load_start(&self.path);
        let file = File::open(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(read_rows(file, &self.columns)?)
    }
}

struct ColumnIndex {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    support: Option<usize>,
    resistance: Option<usize>,
    direction: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &ColumnMap) -> Result<Self, DataFormatError> {
        let find = |name: &str| {
            let wanted = name.trim().to_lowercase();
            headers.iter().position(|h| h.trim().to_lowercase() == wanted)
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| DataFormatError::MissingColumn {
                column: name.to_string(),
            })
        };

        Ok(Self {
            timestamp: require(&columns.timestamp)?,
            open: require(&columns.open)?,
            high: require(&columns.high)?,
            low: require(&columns.low)?,
            close: require(&columns.close)?,
            volume: require(&columns.volume)?,
            support: find(&columns.support),
            resistance: find(&columns.resistance),
            direction: find(&columns.direction),
        })
    }
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let raw = record.get(idx?)?.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Reads every data row. Support, resistance and direction columns are
/// optional; the OHLCV and timestamp columns are not.
pub fn read_rows<R: Read>(reader: R, columns: &ColumnMap) -> Result<Vec<RawRow>, DataFormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let idx = ColumnIndex::resolve(&headers, columns)?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow {
            row: i + 1,
            timestamp: cell(&record, Some(idx.timestamp)),
            open: cell(&record, Some(idx.open)),
            high: cell(&record, Some(idx.high)),
            low: cell(&record, Some(idx.low)),
            close: cell(&record, Some(idx.close)),
            volume: cell(&record, Some(idx.volume)),
            support: cell(&record, idx.support),
            resistance: cell(&record, idx.resistance),
            direction: cell(&record, idx.direction),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
timestamp,direction,Support,Resistance,open,high,low,close,volume
2022-08-25 00:00:00,LONG,\"[280.1, 283.4]\",\"[300.2]\",296.0,302.0,291.6,296.1,53230000
2022-08-26 00:00:00,,[],\"[299.5, 305.0]\",297.4,302.0,284.3,288.1,57163900
";

    #[test]
    fn reads_rows_by_header_name() {
        let rows = read_rows(SAMPLE.as_bytes(), &ColumnMap::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.row, 1);
        assert_eq!(first.timestamp.as_deref(), Some("2022-08-25 00:00:00"));
        assert_eq!(first.direction.as_deref(), Some("LONG"));
        assert_eq!(first.support.as_deref(), Some("[280.1, 283.4]"));
        assert_eq!(first.close.as_deref(), Some("296.1"));

        let second = &rows[1];
        assert_eq!(second.direction, None);
        assert_eq!(second.support.as_deref(), Some("[]"));
    }

    #[test]
    fn header_match_ignores_case() {
        let csv = "TIMESTAMP,Open,HIGH,low,Close,Volume\n2024-01-02,1,2,0.5,1.5,10\n";
        let rows = read_rows(csv.as_bytes(), &ColumnMap::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].support, None);
        assert_eq!(rows[0].direction, None);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let csv = "timestamp,open,high,low,volume\n2024-01-02,1,2,0.5,10\n";
        let err = read_rows(csv.as_bytes(), &ColumnMap::default()).unwrap_err();
        match err {
            DataFormatError::MissingColumn { column } => assert_eq!(column, "close"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = "timestamp,open,high,low,close,volume\n2024-01-02,1,2,0.5,1.5,10\n,,,,,\n";
        let rows = read_rows(csv.as_bytes(), &ColumnMap::default()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn csv_source_loads_series_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = CsvSource::new(file.path(), ColumnMap::default());
        let series = source.load_series().unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path().join("nope.csv"), ColumnMap::default());
        assert!(matches!(source.load_series(), Err(LoadError::Io { .. })));
    }
}
