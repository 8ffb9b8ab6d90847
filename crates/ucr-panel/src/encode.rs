//! Integer-time encoding.
//!
//! The group-time estimator needs integer period labels, integer unit ids and
//! an integer treatment-onset period with `0` meaning "never treated". This
//! module joins the panel's month keys against a [`PeriodIndex`] and derives
//! those columns.

use std::collections::BTreeMap;
use std::path::Path;

use ucr_core::{Error, Frequency, MonthKey, Result};

use crate::frame::Panel;

/// Mapping from calendar-month key to ordinal period (1..=T).
///
/// Annual indices may give every month of a year the same ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodIndex {
    map: BTreeMap<MonthKey, u32>,
}

impl PeriodIndex {
    /// Build from explicit pairs. Indices must be positive, and an index may
    /// only repeat within one calendar year.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (MonthKey, u32)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut year_of: BTreeMap<u32, i32> = BTreeMap::new();
        for (k, v) in pairs {
            if v == 0 {
                return Err(Error::Validation(format!(
                    "period index for {k} is 0; 0 is reserved for never-treated"
                )));
            }
            if let Some(&year) = year_of.get(&v) {
                if year != k.year {
                    return Err(Error::Validation(format!(
                        "period index {v} assigned to both {year} and {}",
                        k.year
                    )));
                }
            }
            year_of.insert(v, k.year);
            if map.insert(k, v).is_some() {
                return Err(Error::Validation(format!("month key {k} listed twice")));
            }
        }
        Ok(Self { map })
    }

    /// Number the panel's distinct observation keys 1..=T in calendar order.
    pub fn dense_from_panel(panel: &Panel) -> Self {
        let map =
            panel.distinct_periods().into_iter().zip(1u32..).collect::<BTreeMap<MonthKey, u32>>();
        Self { map }
    }

    /// Read a `key,index` CSV. The key column may also be named `month` or
    /// `date`, the index column `period` or `time`.
    pub fn from_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let headers: Vec<String> =
            rdr.headers()?.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |names: &[&str], what: &str| {
            headers
                .iter()
                .position(|h| names.contains(&h.as_str()))
                .ok_or_else(|| Error::schema(what, path.display().to_string()))
        };
        let key_col = find(&["key", "month", "date"], "key")?;
        let idx_col = find(&["index", "period", "time"], "index")?;

        let mut pairs = Vec::new();
        for (row, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let raw_key = rec.get(key_col).unwrap_or("").trim();
            // Accept full dates in the key column by truncating to the month.
            let key: MonthKey = match raw_key.get(..7) {
                Some(prefix) if raw_key.len() >= 7 => prefix.parse()?,
                _ => raw_key.parse()?,
            };
            let idx: u32 = rec.get(idx_col).unwrap_or("").trim().parse().map_err(|_| {
                Error::Validation(format!("period index row {}: invalid index", row + 1))
            })?;
            pairs.push((key, idx));
        }
        Self::from_pairs(pairs)
    }

    /// Ordinal of a key.
    pub fn get(&self, key: &MonthKey) -> Option<u32> {
        self.map.get(key).copied()
    }

    /// Ordinal of a key at `frequency`.
    ///
    /// Annual lookups fall back to the first indexed month of the key's year,
    /// so a mid-year date lands in its year's period.
    pub fn lookup(&self, key: &MonthKey, frequency: Frequency) -> Option<u32> {
        match frequency {
            Frequency::Monthly => self.get(key),
            Frequency::Annual => self.get(key).or_else(|| {
                let first = MonthKey { year: key.year, month: 1 };
                let last = MonthKey { year: key.year, month: 12 };
                self.map.range(first..=last).next().map(|(_, &v)| v)
            }),
        }
    }

    /// Number of distinct periods.
    pub fn len(&self) -> usize {
        self.map.values().collect::<std::collections::BTreeSet<_>>().len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A panel plus the integer columns the estimator consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPanel {
    /// Underlying panel.
    pub panel: Panel,
    /// Observation period (1..=T), one per row.
    pub period: Vec<u32>,
    /// Treatment-onset period, `0` for never-treated.
    pub onset_period: Vec<u32>,
    /// Dense unit id (1..=N, ordered by ORI).
    pub unit_id: Vec<u32>,
    /// Dense state group (1..=S, ordered by state name).
    pub state_group: Vec<u32>,
}

impl EncodedPanel {
    /// Same encoding over a replacement panel with identical row layout.
    pub fn with_panel(&self, panel: Panel) -> Result<Self> {
        if panel.len() != self.panel.len() || panel.ori() != self.panel.ori() {
            return Err(Error::Validation("replacement panel has a different row layout".into()));
        }
        Ok(Self { panel, ..self.clone() })
    }

    /// Number of distinct state groups.
    pub fn n_state_groups(&self) -> usize {
        self.state_group.iter().max().copied().unwrap_or(0) as usize
    }
}

/// Encode observation and onset dates as integers.
///
/// Keys are matched with [`PeriodIndex::lookup`]: exact months for monthly
/// data, calendar years for annual data.
///
/// With `placebo` set, every non-missing onset is pushed one year later. That
/// is 12 periods for monthly data but a single period for annual data, where a
/// literal shift of 12 would move onsets twelve years. Missing onsets become
/// `0`. A key that is not in the index raises [`Error::JoinMiss`], except for
/// missing onsets which are the legitimate never-treated case.
pub fn encode_time(
    panel: &Panel,
    index: &PeriodIndex,
    frequency: Frequency,
    placebo: bool,
) -> Result<EncodedPanel> {
    let n = panel.len();
    let shift = if placebo { frequency.periods_per_year() } else { 0 };

    let mut period = Vec::with_capacity(n);
    let mut onset_period = Vec::with_capacity(n);
    for i in 0..n {
        let key = panel.date_key()[i];
        let t = index.lookup(&key, frequency).ok_or_else(|| Error::JoinMiss {
            which: "date",
            key: key.to_string(),
            unit: panel.ori()[i].clone(),
        })?;
        period.push(t);

        let g = match panel.onset_key()[i] {
            None => 0,
            Some(k) => {
                let g = index.lookup(&k, frequency).ok_or_else(|| Error::JoinMiss {
                    which: "onset",
                    key: k.to_string(),
                    unit: panel.ori()[i].clone(),
                })?;
                g + shift
            }
        };
        onset_period.push(g);
    }

    let unit_id = dense_ids(panel.ori());
    let state_group = dense_ids(panel.state());

    tracing::info!(
        rows = n,
        periods = index.len(),
        units = unit_id.iter().max().copied().unwrap_or(0),
        states = state_group.iter().max().copied().unwrap_or(0),
        never_treated_rows = onset_period.iter().filter(|&&g| g == 0).count(),
        placebo,
        "time encoded"
    );

    Ok(EncodedPanel { panel: panel.clone(), period, onset_period, unit_id, state_group })
}

/// Dense 1-based ids in sorted label order.
fn dense_ids(labels: &[String]) -> Vec<u32> {
    let ids: BTreeMap<&str, u32> = labels
        .iter()
        .map(String::as_str)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .zip(1u32..)
        .collect();
    labels.iter().map(|l| ids[l.as_str()]).collect()
}
