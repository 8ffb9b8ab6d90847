//! Panel balancing: exclude jurisdictions, keep only complete units.

use std::collections::BTreeSet;

use serde::Serialize;
use ucr_core::{Error, Result};

use crate::frame::Panel;

/// States dropped before balancing: the national capital district and blank names.
pub const EXCLUDED_STATES: &[&str] = &["District of Columbia", ""];

/// What the balancer did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Rows removed because their state is excluded.
    pub rows_excluded: usize,
    /// Distinct observation periods `T` after exclusion.
    pub n_periods: usize,
    /// Units with exactly one record per period.
    pub units_kept: usize,
    /// Units dropped as incomplete.
    pub units_dropped: usize,
}

/// Drop excluded states, then every unit without exactly one record per period.
///
/// `T` is the number of distinct observation-period keys remaining after the
/// state exclusion. Every surviving unit has exactly `T` rows covering all `T`
/// periods.
pub fn balance_panel(panel: &Panel, excluded_states: &[&str]) -> Result<(Panel, BalanceSummary)> {
    let rows: Vec<usize> = (0..panel.len())
        .filter(|&i| !excluded_states.iter().any(|s| panel.state()[i].trim() == *s))
        .collect();
    let rows_excluded = panel.len() - rows.len();
    let included = panel.select_rows(&rows);

    let n_periods = included.distinct_periods().len();
    let mut units_kept = 0usize;
    let mut units_dropped = 0usize;
    let balanced = included.retain_units(|ori, unit_rows| {
        let periods: BTreeSet<_> = unit_rows.iter().map(|&i| included.date_key()[i]).collect();
        let complete = unit_rows.len() == n_periods && periods.len() == n_periods;
        if complete {
            units_kept += 1;
        } else {
            units_dropped += 1;
            tracing::debug!(ori, records = unit_rows.len(), n_periods, "dropping incomplete unit");
        }
        complete
    });

    let summary = BalanceSummary { rows_excluded, n_periods, units_kept, units_dropped };
    tracing::info!(
        rows_excluded,
        n_periods,
        units_kept,
        units_dropped,
        "panel balanced"
    );

    if balanced.is_empty() {
        return Err(Error::empty_after("panel balancing"));
    }
    Ok((balanced, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PanelRecord;
    use chrono::NaiveDate;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, 1).unwrap()
    }

    fn unit(ori: &str, state: &str, months: &[u32]) -> Vec<PanelRecord> {
        months
            .iter()
            .map(|&m| PanelRecord::new(ori, state, d(m), None).with("crime", 1.0))
            .collect()
    }

    #[test]
    fn keeps_only_complete_units() {
        let mut recs = unit("A", "Iowa", &[1, 2, 3]);
        recs.extend(unit("B", "Iowa", &[1, 2]));
        recs.extend(unit("C", "Ohio", &[1, 2, 3]));
        let (p, s) = balance_panel(&Panel::from_records(recs), EXCLUDED_STATES).unwrap();

        assert_eq!(s.n_periods, 3);
        assert_eq!(s.units_kept, 2);
        assert_eq!(s.units_dropped, 1);
        assert_eq!(p.len(), 6);
        for rows in p.unit_rows().values() {
            assert_eq!(rows.len(), p.distinct_periods().len());
        }
    }

    #[test]
    fn excluded_states_do_not_count_towards_periods() {
        let mut recs = unit("A", "Iowa", &[1, 2]);
        recs.extend(unit("DC1", "District of Columbia", &[1, 2, 3]));
        recs.extend(unit("X", "", &[4]));
        let (p, s) = balance_panel(&Panel::from_records(recs), EXCLUDED_STATES).unwrap();
        assert_eq!(s.rows_excluded, 4);
        assert_eq!(s.n_periods, 2);
        assert_eq!(p.n_units(), 1);
    }

    #[test]
    fn duplicated_period_is_not_complete() {
        let mut recs = unit("A", "Iowa", &[1, 2, 3]);
        recs.extend(unit("B", "Iowa", &[1, 1, 3]));
        let (p, _) = balance_panel(&Panel::from_records(recs), EXCLUDED_STATES).unwrap();
        assert_eq!(p.n_units(), 1);
        assert_eq!(p.ori()[0], "A");
    }

    #[test]
    fn empty_result_is_an_error() {
        let recs = unit("DC1", "District of Columbia", &[1, 2]);
        let err = balance_panel(&Panel::from_records(recs), EXCLUDED_STATES);
        assert!(matches!(err, Err(Error::EmptyPanelAfterFilter { .. })));
    }
}
