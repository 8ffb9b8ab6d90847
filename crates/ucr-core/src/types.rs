//! Closed-set types shared by every stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Observation frequency of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One observation per unit per calendar month.
    Monthly,
    /// One observation per unit per year.
    #[serde(alias = "yearly")]
    Annual,
}

impl Frequency {
    /// Count threshold above which a zero-rate unit is treated as a reporting error.
    pub fn discrepancy_threshold(self) -> f64 {
        match self {
            Frequency::Monthly => 500.0,
            Frequency::Annual => 5000.0,
        }
    }

    /// Number of periods in one calendar year.
    pub fn periods_per_year(self) -> u32 {
        match self {
            Frequency::Monthly => 12,
            Frequency::Annual => 1,
        }
    }

    /// Lowercase tag used in logs and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Annual => "annual",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Frequency::Monthly),
            "annual" | "yearly" | "year" => Ok(Frequency::Annual),
            other => Err(Error::Validation(format!("unknown frequency '{other}'"))),
        }
    }
}

/// Which UCR series a run analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// FBI Uniform Crime Reporting series.
    #[serde(rename = "fbi")]
    Fbi,
    /// Alternative UCR series.
    #[serde(rename = "alt", alias = "alternative")]
    Alternative,
}

impl DataSource {
    /// Data-type tag used as the file-name prefix.
    pub fn tag(self) -> &'static str {
        match self {
            DataSource::Fbi => "fbi",
            DataSource::Alternative => "alt",
        }
    }

    /// Human-readable label used in captions and table headers.
    pub fn label(self) -> &'static str {
        match self {
            DataSource::Fbi => "FBI UCR",
            DataSource::Alternative => "Alternative UCR",
        }
    }

    /// The other source, used for two-source comparison tables.
    pub fn other(self) -> Self {
        match self {
            DataSource::Fbi => DataSource::Alternative,
            DataSource::Alternative => DataSource::Fbi,
        }
    }
}

impl FromStr for DataSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fbi" => Ok(DataSource::Fbi),
            "alt" | "alternative" => Ok(DataSource::Alternative),
            other => Err(Error::Validation(format!("unknown data source '{other}'"))),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Crime categories analysed, in master-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeCategory {
    /// All offences.
    Crime,
    /// Murder.
    Murder,
    /// Rape.
    Rape,
    /// Robbery.
    Robbery,
    /// Assault (all).
    Assault,
    /// Aggravated assault.
    AggAssault,
    /// Burglary.
    Burglary,
    /// Theft.
    Theft,
}

impl CrimeCategory {
    /// Every category in the fixed master-table order.
    pub const ALL: [CrimeCategory; 8] = [
        CrimeCategory::Crime,
        CrimeCategory::Murder,
        CrimeCategory::Rape,
        CrimeCategory::Robbery,
        CrimeCategory::Assault,
        CrimeCategory::AggAssault,
        CrimeCategory::Burglary,
        CrimeCategory::Theft,
    ];

    /// Full (column) name, e.g. `agg_assault`.
    pub fn name(self) -> &'static str {
        match self {
            CrimeCategory::Crime => "crime",
            CrimeCategory::Murder => "murder",
            CrimeCategory::Rape => "rape",
            CrimeCategory::Robbery => "robbery",
            CrimeCategory::Assault => "assault",
            CrimeCategory::AggAssault => "agg_assault",
            CrimeCategory::Burglary => "burglary",
            CrimeCategory::Theft => "theft",
        }
    }

    /// Short abbreviation used in file names, e.g. `aa`.
    pub fn abbreviation(self) -> &'static str {
        match self {
            CrimeCategory::Crime => "c",
            CrimeCategory::Murder => "m",
            CrimeCategory::Rape => "p",
            CrimeCategory::Robbery => "r",
            CrimeCategory::Assault => "a",
            CrimeCategory::AggAssault => "aa",
            CrimeCategory::Burglary => "b",
            CrimeCategory::Theft => "t",
        }
    }

    /// Header used in tables and plot captions.
    pub fn human_name(self) -> &'static str {
        match self {
            CrimeCategory::Crime => "Total Crime",
            CrimeCategory::Murder => "Murder",
            CrimeCategory::Rape => "Rape",
            CrimeCategory::Robbery => "Robbery",
            CrimeCategory::Assault => "Assault",
            CrimeCategory::AggAssault => "Aggravated Assault",
            CrimeCategory::Burglary => "Burglary",
            CrimeCategory::Theft => "Theft",
        }
    }

    /// Position in the master-table order.
    pub fn order(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(Self::ALL.len())
    }
}

impl FromStr for CrimeCategory {
    type Err = Error;

    /// Accepts the full name, the abbreviation, or the human-readable header.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| {
                c.name() == s || c.abbreviation() == s || c.human_name().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| Error::Validation(format!("unknown crime category '{s}'")))
    }
}

impl fmt::Display for CrimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the declarative category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Category this row configures.
    pub category: CrimeCategory,
    /// Count column: outcome of the estimator and target of negative correction.
    pub count_column: String,
    /// Rate column whose zero minimum flags a reporting discrepancy.
    pub rate_column: String,
    /// Whether the discrepancy filter runs for this category.
    pub filter_discrepancy: bool,
}

impl CategorySpec {
    /// Default row: count column `<name>`, rate column `<name>_rate`, filter on.
    pub fn default_for(category: CrimeCategory) -> Self {
        Self {
            category,
            count_column: category.name().to_string(),
            rate_column: format!("{}_rate", category.name()),
            filter_discrepancy: true,
        }
    }

    /// The full default table in master-table order.
    pub fn table() -> Vec<CategorySpec> {
        CrimeCategory::ALL.into_iter().map(Self::default_for).collect()
    }
}

/// Calendar-month key (`YYYY-MM`), the join key of the period index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1..=12.
    pub month: u32,
}

impl MonthKey {
    /// Build a key, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("month {month} out of range 1..=12")));
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || Error::Validation(format!("invalid month key '{s}' (expected YYYY-MM)"));
        let (y, m) = s.split_once('-').ok_or_else(bad)?;
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        MonthKey::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MonthKey> for String {
    fn from(k: MonthKey) -> Self {
        k.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_follow_frequency() {
        assert_eq!(Frequency::Monthly.discrepancy_threshold(), 500.0);
        assert_eq!(Frequency::Annual.discrepancy_threshold(), 5000.0);
        assert_eq!("yearly".parse::<Frequency>().unwrap(), Frequency::Annual);
    }

    #[test]
    fn category_table_is_closed_and_ordered() {
        let table = CategorySpec::table();
        assert_eq!(table.len(), 8);
        let abbrevs: Vec<&str> = table.iter().map(|s| s.category.abbreviation()).collect();
        assert_eq!(abbrevs, vec!["c", "m", "p", "r", "a", "aa", "b", "t"]);
        assert_eq!(table[5].count_column, "agg_assault");
        assert_eq!(table[5].rate_column, "agg_assault_rate");
        assert_eq!(CrimeCategory::Theft.order(), 7);
    }

    #[test]
    fn category_parses_any_spelling() {
        assert_eq!("aa".parse::<CrimeCategory>().unwrap(), CrimeCategory::AggAssault);
        assert_eq!("rape".parse::<CrimeCategory>().unwrap(), CrimeCategory::Rape);
        assert_eq!("Total Crime".parse::<CrimeCategory>().unwrap(), CrimeCategory::Crime);
        assert!("arson".parse::<CrimeCategory>().is_err());
    }

    #[test]
    fn month_key_round_trips_through_text() {
        let k: MonthKey = "2019-03".parse().unwrap();
        assert_eq!(k, MonthKey { year: 2019, month: 3 });
        assert_eq!(k.to_string(), "2019-03");
        assert!("2019-13".parse::<MonthKey>().is_err());
        assert!("201903".parse::<MonthKey>().is_err());
        assert!(MonthKey::new(2019, 1).unwrap() < MonthKey::new(2019, 2).unwrap());
    }

    #[test]
    fn data_source_tags() {
        assert_eq!(DataSource::Fbi.tag(), "fbi");
        assert_eq!(DataSource::Alternative.label(), "Alternative UCR");
        assert_eq!(DataSource::Fbi.other(), DataSource::Alternative);
        let s: DataSource = serde_json::from_str("\"alternative\"").unwrap();
        assert_eq!(s, DataSource::Alternative);
    }
}
