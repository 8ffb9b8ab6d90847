//! Column-wise panel storage.
//!
//! A [`Panel`] holds one row per (reporting unit, period) pair. Key columns
//! (ORI, state, dates, month keys) are typed; every other input column is kept
//! as an optional `f64` series addressed by name. Panels are never mutated in
//! place by pipeline stages: filters and corrections return new snapshots.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use ucr_core::{Error, MonthKey, Result};

/// Calendar-month key of a date.
pub fn month_key(date: NaiveDate) -> MonthKey {
    MonthKey { year: date.year(), month: date.month() }
}

/// One row of a panel, used to build panels and to inspect single rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRecord {
    /// Reporting-unit identifier (ORI).
    pub ori: String,
    /// State name.
    pub state: String,
    /// Observation date.
    pub date: NaiveDate,
    /// Treatment-onset date; `None` for never-treated units.
    pub onset: Option<NaiveDate>,
    /// Numeric columns by name.
    pub values: BTreeMap<String, Option<f64>>,
}

impl PanelRecord {
    /// Record with no numeric values.
    pub fn new(
        ori: impl Into<String>,
        state: impl Into<String>,
        date: NaiveDate,
        onset: Option<NaiveDate>,
    ) -> Self {
        Self { ori: ori.into(), state: state.into(), date, onset, values: BTreeMap::new() }
    }

    /// Builder-style numeric value setter.
    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), Some(value));
        self
    }
}

/// Column-wise panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    ori: Vec<String>,
    state: Vec<String>,
    date: Vec<NaiveDate>,
    onset: Vec<Option<NaiveDate>>,
    date_key: Vec<MonthKey>,
    onset_key: Vec<Option<MonthKey>>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl Panel {
    /// Assemble a panel from its columns; month keys are derived here.
    pub fn from_parts(
        ori: Vec<String>,
        state: Vec<String>,
        date: Vec<NaiveDate>,
        onset: Vec<Option<NaiveDate>>,
        columns: BTreeMap<String, Vec<Option<f64>>>,
    ) -> Result<Self> {
        let n = ori.len();
        if state.len() != n || date.len() != n || onset.len() != n {
            return Err(Error::Validation(format!(
                "key columns have different lengths: ori={}, state={}, date={}, onset={}",
                n,
                state.len(),
                date.len(),
                onset.len()
            )));
        }
        for (name, col) in &columns {
            if col.len() != n {
                return Err(Error::Validation(format!(
                    "column '{}' has length {} but the panel has {} rows",
                    name,
                    col.len(),
                    n
                )));
            }
        }
        let date_key = date.iter().map(|d| month_key(*d)).collect();
        let onset_key = onset.iter().map(|d| d.map(month_key)).collect();
        Ok(Self { ori, state, date, onset, date_key, onset_key, columns })
    }

    /// Build a panel from records. Columns missing from a record become `None`.
    pub fn from_records(records: Vec<PanelRecord>) -> Self {
        let names: BTreeSet<String> =
            records.iter().flat_map(|r| r.values.keys().cloned()).collect();
        let n = records.len();
        let mut columns: BTreeMap<String, Vec<Option<f64>>> =
            names.into_iter().map(|k| (k, Vec::with_capacity(n))).collect();

        let mut ori = Vec::with_capacity(n);
        let mut state = Vec::with_capacity(n);
        let mut date = Vec::with_capacity(n);
        let mut onset = Vec::with_capacity(n);
        for r in records {
            for (name, col) in columns.iter_mut() {
                col.push(r.values.get(name).copied().flatten());
            }
            ori.push(r.ori);
            state.push(r.state);
            date.push(r.date);
            onset.push(r.onset);
        }
        let date_key = date.iter().map(|d| month_key(*d)).collect();
        let onset_key = onset.iter().map(|d: &Option<NaiveDate>| d.map(month_key)).collect();
        Self { ori, state, date, onset, date_key, onset_key, columns }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ori.len()
    }

    /// True when the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.ori.is_empty()
    }

    /// Unit identifiers, one per row.
    pub fn ori(&self) -> &[String] {
        &self.ori
    }

    /// State names, one per row.
    pub fn state(&self) -> &[String] {
        &self.state
    }

    /// Observation dates.
    pub fn date(&self) -> &[NaiveDate] {
        &self.date
    }

    /// Treatment-onset dates.
    pub fn onset(&self) -> &[Option<NaiveDate>] {
        &self.onset
    }

    /// Observation month keys.
    pub fn date_key(&self) -> &[MonthKey] {
        &self.date_key
    }

    /// Treatment-onset month keys.
    pub fn onset_key(&self) -> &[Option<MonthKey>] {
        &self.onset_key
    }

    /// Names of the numeric columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// True if a numeric column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Numeric column by name.
    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice).ok_or_else(|| Error::schema(name, "panel"))
    }

    /// New panel with `name` replaced (or added).
    pub fn with_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Panel> {
        if values.len() != self.len() {
            return Err(Error::Validation(format!(
                "replacement for '{}' has {} values, panel has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        let mut out = self.clone();
        out.columns.insert(name.to_string(), values);
        Ok(out)
    }

    /// Row indices grouped by unit, ordered by ORI. Row order within a unit is preserved.
    pub fn unit_rows(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut map: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, ori) in self.ori.iter().enumerate() {
            map.entry(ori.as_str()).or_default().push(i);
        }
        map
    }

    /// Number of distinct units.
    pub fn n_units(&self) -> usize {
        self.ori.iter().collect::<BTreeSet<_>>().len()
    }

    /// Distinct observation-period keys.
    pub fn distinct_periods(&self) -> BTreeSet<MonthKey> {
        self.date_key.iter().copied().collect()
    }

    /// New panel with only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Panel {
        Panel {
            ori: rows.iter().map(|&i| self.ori[i].clone()).collect(),
            state: rows.iter().map(|&i| self.state[i].clone()).collect(),
            date: rows.iter().map(|&i| self.date[i]).collect(),
            onset: rows.iter().map(|&i| self.onset[i]).collect(),
            date_key: rows.iter().map(|&i| self.date_key[i]).collect(),
            onset_key: rows.iter().map(|&i| self.onset_key[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(k, col)| (k.clone(), rows.iter().map(|&i| col[i]).collect()))
                .collect(),
        }
    }

    /// New panel keeping every row of the units for which `keep` returns true.
    ///
    /// `keep` receives the ORI and that unit's row indices. Original row order
    /// is preserved.
    pub fn retain_units<F>(&self, mut keep: F) -> Panel
    where
        F: FnMut(&str, &[usize]) -> bool,
    {
        let mut kept = vec![false; self.len()];
        for (ori, rows) in self.unit_rows() {
            if keep(ori, &rows) {
                for i in rows {
                    kept[i] = true;
                }
            }
        }
        let rows: Vec<usize> = (0..self.len()).filter(|&i| kept[i]).collect();
        self.select_rows(&rows)
    }

    /// Row `i` as a record.
    pub fn record(&self, i: usize) -> PanelRecord {
        PanelRecord {
            ori: self.ori[i].clone(),
            state: self.state[i].clone(),
            date: self.date[i],
            onset: self.onset[i],
            values: self.columns.iter().map(|(k, col)| (k.clone(), col[i])).collect(),
        }
    }
}
