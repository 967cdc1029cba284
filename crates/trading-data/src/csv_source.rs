//! CSV candle source.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use trading_core::error::{DataError, MalformedInputError};
use trading_core::types::Candle;

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "ts", alias = "Timestamp", alias = "time")]
    timestamp: String,
    #[serde(alias = "Open", alias = "o")]
    open: f64,
    #[serde(alias = "High", alias = "h")]
    high: f64,
    #[serde(alias = "Low", alias = "l")]
    low: f64,
    #[serde(alias = "Close", alias = "c")]
    close: f64,
    #[serde(alias = "Volume", alias = "vol", default)]
    volume: f64,
    /// `0` marks a candle that was still forming
    #[serde(alias = "confirmed", default)]
    confirm: Option<String>,
}

/// CSV file of candles.
///
/// Rows are returned in file order; newest-first files stay newest-first.
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    /// Create a new CSV data source.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all candles from the file.
    pub fn load(&self) -> Result<Vec<Candle>, DataError> {
        let candles = Self::load_from_reader(File::open(&self.path)?)?;
        debug!(path = %self.path.display(), candles = candles.len(), "Loaded candles");
        Ok(candles)
    }

    /// Load candles from any CSV reader with a header row.
    pub fn load_from_reader<R: Read>(reader: R) -> Result<Vec<Candle>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut candles = Vec::new();

        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            // Header is line 1
            let line = candles.len() + 2;

            let timestamp = parse_timestamp(&record.timestamp)?;
            for (field, value) in [
                ("open", record.open),
                ("high", record.high),
                ("low", record.low),
                ("close", record.close),
                ("volume", record.volume),
            ] {
                if !value.is_finite() {
                    return Err(DataError::Malformed {
                        line,
                        source: MalformedInputError::InvalidField {
                            field,
                            value: value.to_string(),
                        },
                    });
                }
            }

            let mut candle = Candle::new(
                timestamp,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
            );
            if record.confirm.as_deref().map(str::trim) == Some("0") {
                candle = candle.unconfirmed();
            }
            candles.push(candle);
        }

        Ok(candles)
    }
}

/// Parse epoch seconds, epoch milliseconds, RFC 3339 or plain dates.
fn parse_timestamp(raw: &str) -> Result<i64, DataError> {
    let raw = raw.trim();

    if let Ok(ts) = raw.parse::<i64>() {
        // Assume milliseconds if > 10 digits
        if ts > 10_000_000_000 {
            return Ok(ts);
        }
        return ts
            .checked_mul(1000)
            .ok_or_else(|| DataError::ParseError(format!("Timestamp out of range: {}", raw)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Some(dt) = NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    Err(DataError::ParseError(format!("Could not parse timestamp: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("2024-01-15T10:00:00Z").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("2024-01-15 10:00:00").unwrap(), 1_705_312_800_000);
        assert!(parse_timestamp("2024-01-15").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_timestamp_out_of_range() {
        let raw = i64::MIN.to_string();
        assert!(matches!(parse_timestamp(&raw), Err(DataError::ParseError(_))));
        assert_eq!(parse_timestamp("-60").unwrap(), -60_000);
    }

    #[test]
    fn test_load_keeps_file_order() {
        let csv = "timestamp,open,high,low,close,volume,confirm\n\
                   1700000120000,3,4,2,3.5,10,0\n\
                   1700000060000,2,3,1,2.5,10,1\n\
                   1700000000000,1,2,0.5,1.5,10,1\n";

        let candles = CsvDataSource::load_from_reader(csv.as_bytes()).unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp, 1_700_000_120_000);
        assert_eq!(candles[2].close, 1.5);
        assert!(!candles[0].confirmed);
        assert!(candles[1].confirmed);
    }

    #[test]
    fn test_load_header_aliases_without_confirm() {
        let csv = "Date,Open,High,Low,Close,Volume\n2024-01-15,100,110,95,105,1000\n";
        let candles = CsvDataSource::load_from_reader(csv.as_bytes()).unwrap();

        assert_eq!(candles[0].high, 110.0);
        assert!(candles[0].confirmed);
    }

    #[test]
    fn test_load_rejects_bad_rows() {
        let non_numeric = "timestamp,open,high,low,close\n1,1,abc,1,1\n";
        assert!(matches!(
            CsvDataSource::load_from_reader(non_numeric.as_bytes()),
            Err(DataError::ParseError(_))
        ));

        let non_finite = "timestamp,open,high,low,close\n1,1,2,0.5,1\n2,1,inf,0.5,1\n";
        match CsvDataSource::load_from_reader(non_finite.as_bytes()) {
            Err(DataError::Malformed { line, source }) => {
                assert_eq!(line, 3);
                assert!(matches!(source, MalformedInputError::InvalidField { field: "high", .. }));
            }
            other => panic!("expected a malformed row, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CsvDataSource::new("/nonexistent/candles.csv"),
            Err(DataError::NoDataAvailable(_))
        ));
    }
}
