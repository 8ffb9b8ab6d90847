//! Yearly effect sizes from the dynamic aggregation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use ucr_core::{Error, Frequency, Result};
use ucr_inference::{DynamicAtt, EventTimeAtt};

/// One (year, mean, se) row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSizeRow {
    /// Years relative to the switch.
    pub year: i64,
    /// Effect estimate.
    pub mean: f64,
    /// Standard error.
    pub se: f64,
}

/// How monthly standard errors combine into a yearly bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeBinning {
    /// Arithmetic mean of the monthly SEs, like the point estimates.
    #[default]
    Mean,
    /// SE of the bucket mean treating months as independent: `sqrt(Σ se²) / n`.
    Independent,
}

impl SeBinning {
    fn combine(self, ses: &[f64]) -> f64 {
        let n = ses.len() as f64;
        match self {
            SeBinning::Mean => ses.iter().sum::<f64>() / n,
            SeBinning::Independent => ses.iter().map(|s| s * s).sum::<f64>().sqrt() / n,
        }
    }
}

/// Year bucket of a monthly event time: `floor(e / 12) + 1`.
pub fn year_bucket(event_time: i64) -> i64 {
    event_time.div_euclid(12) + 1
}

/// The universal-base reference point, reported as a fixed (0, 0) at `e = -1`.
fn is_reference_point(p: &EventTimeAtt) -> bool {
    p.event_time == -1 && p.att == 0.0 && p.se == 0.0
}

/// Relabel (annual) or bucket (monthly) the dynamic aggregation into yearly rows.
///
/// Monthly bucketing leaves out the fixed reference point so it does not pull
/// the year-0 average toward zero.
pub fn extract_effect_sizes(
    dynamic: &DynamicAtt,
    frequency: Frequency,
    binning: SeBinning,
) -> Vec<EffectSizeRow> {
    match frequency {
        Frequency::Annual => {
            let mut rows: Vec<EffectSizeRow> = dynamic
                .points
                .iter()
                .map(|p| EffectSizeRow { year: p.event_time, mean: p.att, se: p.se })
                .collect();
            rows.sort_by_key(|r| r.year);
            rows
        }
        Frequency::Monthly => {
            let mut buckets: BTreeMap<i64, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
            for p in dynamic.points.iter().filter(|p| !is_reference_point(p)) {
                let (atts, ses) = buckets.entry(year_bucket(p.event_time)).or_default();
                atts.push(p.att);
                ses.push(p.se);
            }
            buckets
                .into_iter()
                .map(|(year, (atts, ses))| EffectSizeRow {
                    year,
                    mean: atts.iter().sum::<f64>() / atts.len() as f64,
                    se: binning.combine(&ses),
                })
                .collect()
        }
    }
}

/// Serialise rows as a `year,mean,se` CSV.
pub fn effect_sizes_to_csv(rows: &[EffectSizeRow]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Read a persisted effect-size table. The key column may be `year` or `name`.
pub fn read_effect_sizes(path: &Path) -> Result<Vec<EffectSizeRow>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let mut rdr = csv::Reader::from_path(path)?;
    let headers: Vec<String> =
        rdr.headers()?.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    let context = path.display().to_string();
    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let year_col = find(&["year", "name"]).ok_or_else(|| Error::schema("year", &context))?;
    let mean_col = find(&["mean"]).ok_or_else(|| Error::schema("mean", &context))?;
    let se_col = find(&["se"]).ok_or_else(|| Error::schema("se", &context))?;

    let mut rows = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let field = |col: usize| rec.get(col).unwrap_or("").trim();
        let bad =
            |what: &str| Error::Validation(format!("{context} row {}: invalid {what}", i + 1));
        // Year may have been written as a float by other tools.
        let year = field(year_col)
            .parse::<i64>()
            .or_else(|_| field(year_col).parse::<f64>().map(|y| y.round() as i64))
            .map_err(|_| bad("year"))?;
        let mean = field(mean_col).parse::<f64>().map_err(|_| bad("mean"))?;
        let se = field(se_col).parse::<f64>().map_err(|_| bad("se"))?;
        rows.push(EffectSizeRow { year, mean, se });
    }
    rows.sort_by_key(|r| r.year);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dynamic(points: &[(i64, f64, f64)]) -> DynamicAtt {
        DynamicAtt {
            points: points
                .iter()
                .map(|&(event_time, att, se)| EventTimeAtt {
                    event_time,
                    att,
                    se,
                    ci_lower: att - 2.0 * se,
                    ci_upper: att + 2.0 * se,
                })
                .collect(),
            alpha: 0.05,
        }
    }

    #[test]
    fn annual_is_a_relabel() {
        let d = dynamic(&[(1, 2.0, 0.5), (-1, 0.0, 0.0), (0, 1.0, 0.25)]);
        let rows = extract_effect_sizes(&d, Frequency::Annual, SeBinning::Mean);
        let years: Vec<i64> = rows.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![-1, 0, 1]);
        assert_eq!(rows[2], EffectSizeRow { year: 1, mean: 2.0, se: 0.5 });
    }

    #[test]
    fn monthly_buckets_by_year() {
        assert_eq!(year_bucket(0), 1);
        assert_eq!(year_bucket(11), 1);
        assert_eq!(year_bucket(12), 2);
        assert_eq!(year_bucket(-1), 0);
        assert_eq!(year_bucket(-12), 0);
        assert_eq!(year_bucket(-13), -1);

        let d = dynamic(&[
            (-2, 0.5, 0.2),
            (-1, 0.0, 0.0),
            (0, 1.0, 0.3),
            (11, 3.0, 0.4),
            (12, 5.0, 1.0),
        ]);
        let rows = extract_effect_sizes(&d, Frequency::Monthly, SeBinning::Mean);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].year, 1);
        assert_abs_diff_eq!(rows[1].mean, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].se, 0.35, epsilon = 1e-12);

        let rows = extract_effect_sizes(&d, Frequency::Monthly, SeBinning::Independent);
        assert_abs_diff_eq!(rows[1].se, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn monthly_reference_point_is_not_averaged_in() {
        let d = dynamic(&[(-3, 0.6, 0.3), (-2, 0.4, 0.1), (-1, 0.0, 0.0), (0, 2.0, 0.5)]);
        let rows = extract_effect_sizes(&d, Frequency::Monthly, SeBinning::Mean);
        assert_eq!(rows[0].year, 0);
        assert_abs_diff_eq!(rows[0].mean, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].se, 0.2, epsilon = 1e-12);

        // Only the reference point in year 0: no year-0 row.
        let d = dynamic(&[(-1, 0.0, 0.0), (0, 2.0, 0.5)]);
        let rows = extract_effect_sizes(&d, Frequency::Monthly, SeBinning::Mean);
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![1]);

        // Annual output still reports it.
        let rows = extract_effect_sizes(&d, Frequency::Annual, SeBinning::Mean);
        assert_eq!(rows[0], EffectSizeRow { year: -1, mean: 0.0, se: 0.0 });
    }

    #[test]
    fn persisted_rows_read_back() {
        let rows = vec![
            EffectSizeRow { year: 1, mean: 0.123456789, se: 0.0456 },
            EffectSizeRow { year: 2, mean: -3.5, se: 1.25e-3 },
        ];
        let dir = std::env::temp_dir().join(format!("ucr_es_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fbi_c_effect_size.csv");
        std::fs::write(&path, effect_sizes_to_csv(&rows).unwrap()).unwrap();
        let back = read_effect_sizes(&path).unwrap();
        assert_eq!(back.len(), rows.len());
        for (a, b) in rows.iter().zip(&back) {
            assert_eq!(a.year, b.year);
            assert_abs_diff_eq!(a.mean, b.mean, epsilon = 1e-12);
            assert_abs_diff_eq!(a.se, b.se, epsilon = 1e-12);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reader_accepts_name_header() {
        let dir = std::env::temp_dir().join(format!("ucr_es_name_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("alt.csv");
        std::fs::write(&path, "name,mean,se\n2,1.5,0.2\n1.0,0.5,0.1\n").unwrap();
        let rows = read_effect_sizes(&path).unwrap();
        assert_eq!(rows[0], EffectSizeRow { year: 1, mean: 0.5, se: 0.1 });
        assert_eq!(rows[1].year, 2);
        assert!(matches!(read_effect_sizes(&dir.join("nope.csv")), Err(Error::MissingFile(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
