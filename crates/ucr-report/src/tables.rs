//! LaTeX tables and simple-ATT columns.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use ucr_core::{CrimeCategory, DataSource, Error, Result};
use ucr_inference::SimpleAtt;

use crate::effect_size::EffectSizeRow;

/// Years shown in the per-category effect-size table.
pub const TABLE_YEARS: std::ops::RangeInclusive<i64> = 1..=5;

/// Row labels of simple-ATT columns and the master table.
pub const SIMPLE_ROWS: [&str; 2] = ["Mean", "SE"];

/// A `table` environment around a `tabular`.
#[derive(Debug, Clone)]
pub struct LatexTable {
    pub caption: String,
    pub label: String,
    pub headers: Vec<String>,
    /// Column alignment spec, e.g. `lrr`.
    pub align: String,
    pub rows: Vec<Vec<String>>,
}

impl LatexTable {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("\\begin{table}[!htbp]\n\\centering\n");
        let _ = writeln!(out, "\\caption{{{}}}", escape(&self.caption));
        let _ = writeln!(out, "\\label{{{}}}", self.label);
        let _ = writeln!(out, "\\begin{{tabular}}{{{}}}", self.align);
        out.push_str("\\hline\n");
        let headers: Vec<String> = self.headers.iter().map(|h| escape(h)).collect();
        let _ = writeln!(out, "{} \\\\", headers.join(" & "));
        out.push_str("\\hline\n");
        for row in &self.rows {
            let _ = writeln!(out, "{} \\\\", row.join(" & "));
        }
        out.push_str("\\hline\n\\end{tabular}\n\\end{table}\n");
        out
    }
}

/// Escape LaTeX special characters in free text.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Effect-size table for years 1..=5.
///
/// With `comparison`, rows are inner-joined on year with the other source's
/// persisted table and both sources get their own effect/SE columns.
pub fn effect_size_table(
    category: CrimeCategory,
    source: DataSource,
    rows: &[EffectSizeRow],
    comparison: Option<(DataSource, &[EffectSizeRow])>,
) -> LatexTable {
    let in_window = |r: &&EffectSizeRow| TABLE_YEARS.contains(&r.year);
    let caption = format!(
        "Estimated effect of the NIBRS switch on {} by year since the switch",
        category.human_name()
    );
    let label = format!("tab:{}_{}", source.tag(), category.abbreviation());

    match comparison {
        None => LatexTable {
            caption,
            label,
            headers: vec!["Year".into(), "Effect Size".into(), "Standard Error".into()],
            align: "lrr".into(),
            rows: rows
                .iter()
                .filter(in_window)
                .map(|r| {
                    vec![format!("{:.0}", r.year), format!("{:.2}", r.mean), format!("{:.2}", r.se)]
                })
                .collect(),
        },
        Some((other, other_rows)) => {
            let by_year: BTreeMap<i64, &EffectSizeRow> =
                other_rows.iter().filter(in_window).map(|r| (r.year, r)).collect();
            LatexTable {
                caption,
                label,
                headers: vec![
                    "Year".into(),
                    format!("{} Effect Size", source.label()),
                    format!("{} SE", source.label()),
                    format!("{} Effect Size", other.label()),
                    format!("{} SE", other.label()),
                ],
                align: "lrrrr".into(),
                rows: rows
                    .iter()
                    .filter(in_window)
                    .filter_map(|r| {
                        let o = by_year.get(&r.year)?;
                        Some(vec![
                            format!("{:.0}", r.year),
                            format!("{:.2}", r.mean),
                            format!("{:.2}", r.se),
                            format!("{:.2}", o.mean),
                            format!("{:.2}", o.se),
                        ])
                    })
                    .collect(),
            }
        }
    }
}

/// One category's overall ATT: a single CSV column named after the category
/// with rows Mean and SE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleAttColumn {
    pub category: CrimeCategory,
    pub mean: f64,
    pub se: f64,
}

impl SimpleAttColumn {
    pub fn new(category: CrimeCategory, simple: &SimpleAtt) -> Self {
        Self { category, mean: simple.att, se: simple.se }
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record([self.category.human_name()])?;
        wtr.write_record([self.mean.to_string()])?;
        wtr.write_record([self.se.to_string()])?;
        wtr.into_inner().map_err(|e| Error::Io(e.into_error()))
    }

    /// Read a persisted column; the header names the category.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let context = path.display().to_string();
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let header = rdr.headers()?.get(0).unwrap_or("").to_string();
        let category: CrimeCategory = header.parse()?;
        let values = rdr
            .records()
            .map(|rec| {
                let rec = rec?;
                let cell = rec.get(0).unwrap_or("").trim();
                cell.parse::<f64>()
                    .map_err(|_| Error::Validation(format!("{context}: invalid value '{cell}'")))
            })
            .collect::<Result<Vec<f64>>>()?;
        match values.as_slice() {
            [mean, se] => Ok(Self { category, mean: *mean, se: *se }),
            _ => Err(Error::Validation(format!(
                "{context}: expected 2 rows (Mean, SE), found {}",
                values.len()
            ))),
        }
    }
}

/// Simple-ATT columns for every category of one source, in fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    pub source: DataSource,
    pub placebo: bool,
    columns: Vec<SimpleAttColumn>,
}

impl MasterTable {
    /// Combine columns in the fixed category order. Duplicates are an error.
    pub fn combine(
        source: DataSource,
        placebo: bool,
        columns: impl IntoIterator<Item = SimpleAttColumn>,
    ) -> Result<Self> {
        let mut by_cat: BTreeMap<usize, SimpleAttColumn> = BTreeMap::new();
        for c in columns {
            if by_cat.insert(c.category.order(), c).is_some() {
                return Err(Error::Validation(format!(
                    "category '{}' appears twice in the master table",
                    c.category.human_name()
                )));
            }
        }
        if by_cat.is_empty() {
            return Err(Error::Validation("master table has no columns".into()));
        }
        Ok(Self { source, placebo, columns: by_cat.into_values().collect() })
    }

    pub fn columns(&self) -> &[SimpleAttColumn] {
        &self.columns
    }

    /// Column headers, in order.
    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.category.human_name()).collect()
    }

    /// `(label, values)` rows: Mean then SE.
    pub fn rows(&self) -> Vec<(&'static str, Vec<f64>)> {
        vec![
            (SIMPLE_ROWS[0], self.columns.iter().map(|c| c.mean).collect()),
            (SIMPLE_ROWS[1], self.columns.iter().map(|c| c.se).collect()),
        ]
    }

    pub fn to_latex(&self) -> LatexTable {
        let placebo = if self.placebo { " (placebo)" } else { "" };
        let mut headers = vec![String::new()];
        headers.extend(self.headers().into_iter().map(String::from));
        LatexTable {
            caption: format!(
                "Overall effect of the NIBRS switch by offence, {}{}",
                self.source.label(),
                placebo
            ),
            label: format!(
                "tab:{}_did{}",
                self.source.tag(),
                if self.placebo { "_placebo" } else { "" }
            ),
            align: format!("l{}", "r".repeat(self.columns.len())),
            headers,
            rows: self
                .rows()
                .into_iter()
                .map(|(label, values)| {
                    std::iter::once(label.to_string())
                        .chain(values.iter().map(|v| format!("{v:.2}")))
                        .collect()
                })
                .collect(),
        }
    }
}
