//! Raw panel ingest (CSV/TSV, and Parquet with the `parquet` feature).
//!
//! Strategy: read every cell as text, pull out the four key columns, then keep
//! each remaining column as an optional `f64` series if all of its non-missing
//! cells parse as numbers. Date columns are normalised to calendar-month keys
//! by [`Panel::from_parts`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ucr_core::{Error, Result};

use crate::frame::Panel;

/// Names of the key columns in the raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Reporting-unit identifier column.
    pub unit: String,
    /// State-name column.
    pub state: String,
    /// Observation-date column.
    pub date: String,
    /// Treatment-onset date column.
    pub onset: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            unit: "ori".to_string(),
            state: "state".to_string(),
            date: "date".to_string(),
            onset: "nibrs_start_date".to_string(),
        }
    }
}

const MISSING_TOKENS: &[&str] = &["", "na", "nan", "nat", ".", "null", "none"];

fn is_missing(s: &str) -> bool {
    let t = s.trim();
    MISSING_TOKENS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

/// Parse a date cell. Returns `None` for unparseable text.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Some((y, m)) = s.split_once('-') {
        if let (Ok(y), Ok(m)) = (y.parse::<i32>(), m.parse::<u32>()) {
            return NaiveDate::from_ymd_opt(y, m, 1);
        }
    }
    if s.len() == 4 {
        if let Ok(y) = s.parse::<i32>() {
            return NaiveDate::from_ymd_opt(y, 1, 1);
        }
    }
    None
}

/// Load a raw panel file.
///
/// Fails with [`Error::MissingFile`] if `path` does not exist and with
/// [`Error::SchemaMismatch`] if any configured key column is absent.
pub fn load_panel(path: &Path, config: &LoaderConfig) -> Result<Panel> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
    tracing::info!(path = %path.display(), format = %ext, "loading panel");

    let table = match ext.as_str() {
        "csv" | "txt" => read_delimited(path, b',')?,
        "tsv" => read_delimited(path, b'\t')?,
        #[cfg(feature = "parquet")]
        "parquet" | "pq" => parquet_table::read(path)?,
        other => {
            return Err(Error::Validation(format!(
                "unsupported panel file extension '.{other}' (expected .csv or .tsv{})",
                if cfg!(feature = "parquet") { ", .parquet" } else { "" }
            )));
        }
    };

    let panel = table.into_panel(config, &path.display().to_string())?;
    tracing::info!(rows = panel.len(), units = panel.n_units(), "panel loaded");
    Ok(panel)
}

/// Text table: header plus columns of cells.
pub(crate) struct TextTable {
    pub(crate) headers: Vec<String>,
    pub(crate) columns: Vec<Vec<String>>,
}

impl TextTable {
    fn take(&mut self, name: &str, context: &str) -> Result<Vec<String>> {
        let j = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::schema(name, context))?;
        self.headers.remove(j);
        Ok(self.columns.remove(j))
    }

    fn into_panel(mut self, config: &LoaderConfig, context: &str) -> Result<Panel> {
        // Both date columns are checked first so a missing onset column is
        // reported even when the unit column is also absent.
        let dates = self.take(&config.date, context)?;
        let onsets = self.take(&config.onset, context)?;
        let ori = self.take(&config.unit, context)?;
        let state = self.take(&config.state, context)?;

        let mut date = Vec::with_capacity(dates.len());
        for (i, s) in dates.iter().enumerate() {
            let d = parse_date(s).ok_or_else(|| {
                Error::Validation(format!(
                    "row {}: unparseable {} value '{}'",
                    i + 1,
                    config.date,
                    s
                ))
            })?;
            date.push(d);
        }

        let mut onset = Vec::with_capacity(onsets.len());
        for (i, s) in onsets.iter().enumerate() {
            if is_missing(s) {
                onset.push(None);
                continue;
            }
            let d = parse_date(s).ok_or_else(|| {
                Error::Validation(format!(
                    "row {}: unparseable {} value '{}'",
                    i + 1,
                    config.onset,
                    s
                ))
            })?;
            onset.push(Some(d));
        }

        let mut numeric = BTreeMap::new();
        for (name, cells) in self.headers.into_iter().zip(self.columns) {
            match parse_numeric(&cells) {
                Some(col) => {
                    numeric.insert(name, col);
                }
                None => tracing::debug!(column = %name, "skipping non-numeric column"),
            }
        }

        let ori = ori.into_iter().map(|s| s.trim().to_string()).collect();
        let state = state.into_iter().map(|s| s.trim().to_string()).collect();
        Panel::from_parts(ori, state, date, onset, numeric)
    }
}

fn parse_numeric(cells: &[String]) -> Option<Vec<Option<f64>>> {
    let mut out = Vec::with_capacity(cells.len());
    for s in cells {
        if is_missing(s) {
            out.push(None);
        } else {
            out.push(Some(s.trim().parse::<f64>().ok()?));
        }
    }
    Some(out)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<TextTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result?;
        for (j, field) in record.iter().enumerate() {
            if j < columns.len() {
                columns[j].push(field.to_string());
            }
        }
    }
    Ok(TextTable { headers, columns })
}

#[cfg(feature = "parquet")]
mod parquet_table {
    use std::fs::File;
    use std::path::Path;

    use arrow::array::{Array, StringArray};
    use arrow::compute::cast;
    use arrow::datatypes::DataType;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use ucr_core::{Error, Result};

    use super::TextTable;

    /// Read every column of a Parquet file as text (dates render as ISO dates).
    pub(super) fn read(path: &Path) -> Result<TextTable> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::Validation(format!("parquet: {e}")))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| Error::Validation(format!("parquet: {e}")))?;

        let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for batch in reader {
            let batch = batch.map_err(|e| Error::Validation(format!("arrow: {e}")))?;
            for (j, col) in batch.columns().iter().enumerate() {
                let text = cast(col, &DataType::Utf8)
                    .map_err(|e| Error::Validation(format!("arrow cast: {e}")))?;
                let text = text
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| {
                        Error::Computation("cast to Utf8 did not yield strings".into())
                    })?;
                for i in 0..text.len() {
                    let cell =
                        if text.is_null(i) { String::new() } else { text.value(i).to_string() };
                    columns[j].push(cell);
                }
            }
        }
        Ok(TextTable { headers, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_file(name: &str, contents: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let mut p = std::env::temp_dir();
        p.push(format!("ucr_loader_{}_{}_{}", std::process::id(), nanos, name));
        std::fs::write(&p, contents).unwrap();
        p
    }

    #[test]
    fn parses_common_date_spellings() {
        let want = NaiveDate::from_ymd_opt(2019, 3, 1).unwrap();
        assert_eq!(parse_date("2019-03-01"), Some(want));
        assert_eq!(parse_date("2019/03/01"), Some(want));
        assert_eq!(parse_date("03/01/2019"), Some(want));
        assert_eq!(parse_date("2019-03-01 00:00:00"), Some(want));
        assert_eq!(parse_date("2019-03"), Some(want));
        assert_eq!(parse_date("2019"), NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(parse_date("March"), None);
    }

    #[test]
    fn loads_csv_with_month_keys() {
        let path = tmp_file(
            "ok.csv",
            "ori,state,date,nibrs_start_date,crime,crime_rate,agency_name\n\
             AL0010000,Alabama,2019-01-15,2019-03-01,12,3.5,Foo PD\n\
             AL0010000,Alabama,2019-02-15,2019-03-01,-1,,Foo PD\n\
             AK0010000,Alaska,2019-01-15,,7,1.0,Bar PD\n",
        );
        let panel = load_panel(&path, &LoaderConfig::default()).unwrap();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.date_key()[1].to_string(), "2019-02");
        assert_eq!(panel.onset_key()[0].map(|k| k.to_string()).as_deref(), Some("2019-03"));
        assert_eq!(panel.onset_key()[2], None);
        assert_eq!(panel.column("crime").unwrap(), &[Some(12.0), Some(-1.0), Some(7.0)]);
        assert_eq!(panel.column("crime_rate").unwrap()[1], None);
        assert!(!panel.has_column("agency_name"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_panel(Path::new("/definitely/not/here.csv"), &LoaderConfig::default());
        assert!(matches!(err, Err(Error::MissingFile(_))));
    }

    #[test]
    fn missing_date_column_is_schema_mismatch() {
        let path = tmp_file("nodate.csv", "ori,state,date,crime\nA,Iowa,2019-01-01,1\n");
        let err = load_panel(&path, &LoaderConfig::default());
        match err {
            Err(Error::SchemaMismatch { column, .. }) => assert_eq!(column, "nibrs_start_date"),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let path = tmp_file("panel.xlsx", "irrelevant");
        assert!(matches!(load_panel(&path, &LoaderConfig::default()), Err(Error::Validation(_))));
        std::fs::remove_file(path).ok();
    }
}
