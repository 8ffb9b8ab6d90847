//! Discrepancy filter: drop units whose series swings from zero to an
//! implausibly large count.

use ucr_core::{Error, Frequency, Result};

use crate::frame::Panel;

/// Drop every unit with `min(rate) == 0` and `max(count) > threshold`.
///
/// The threshold comes from `frequency` (500 monthly, 5000 annual). Missing
/// cells are ignored; a unit whose rate series is entirely missing is kept.
/// Returns the filtered panel and the number of units dropped.
pub fn filter_discrepancies(
    panel: &Panel,
    rate_column: &str,
    count_column: &str,
    frequency: Frequency,
) -> Result<(Panel, usize)> {
    let rate = panel.column(rate_column)?;
    let count = panel.column(count_column)?;
    let threshold = frequency.discrepancy_threshold();

    let mut dropped = 0usize;
    let filtered = panel.retain_units(|ori, rows| {
        let min_rate = rows.iter().filter_map(|&i| rate[i]).fold(f64::INFINITY, f64::min);
        let max_count = rows.iter().filter_map(|&i| count[i]).fold(f64::NEG_INFINITY, f64::max);
        let suspicious = min_rate == 0.0 && max_count > threshold;
        if suspicious {
            dropped += 1;
            tracing::debug!(ori, max_count, threshold, "dropping unit with zero-to-high swing");
        }
        !suspicious
    });

    tracing::info!(
        rate_column,
        count_column,
        threshold,
        units_dropped = dropped,
        units_kept = filtered.n_units(),
        "discrepancy filter applied"
    );

    if filtered.is_empty() {
        return Err(Error::empty_after(format!("discrepancy filter on '{rate_column}'")));
    }
    Ok((filtered, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PanelRecord;
    use chrono::NaiveDate;

    fn unit(ori: &str, rates: &[f64]) -> Vec<PanelRecord> {
        rates
            .iter()
            .enumerate()
            .map(|(k, &v)| {
                let date = NaiveDate::from_ymd_opt(2020, k as u32 + 1, 1).unwrap();
                PanelRecord::new(ori, "Iowa", date, None).with("crime_rate", v).with("crime", v)
            })
            .collect()
    }

    fn panel() -> Panel {
        let mut recs = unit("SWING", &[0.0, 0.0, 600.0]);
        recs.extend(unit("STEADY", &[10.0, 12.0, 11.0]));
        Panel::from_records(recs)
    }

    #[test]
    fn monthly_threshold_drops_swing() {
        let (p, dropped) =
            filter_discrepancies(&panel(), "crime_rate", "crime", Frequency::Monthly).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(p.n_units(), 1);
        assert!(p.ori().iter().all(|o| o == "STEADY"));
    }

    #[test]
    fn annual_threshold_keeps_swing() {
        let (p, dropped) =
            filter_discrepancies(&panel(), "crime_rate", "crime", Frequency::Annual).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(p.n_units(), 2);
    }

    #[test]
    fn rate_and_count_checks_are_decoupled() {
        // Rate never hits zero, so a large count alone does not drop the unit.
        let recs: Vec<PanelRecord> = (1..=3)
            .map(|m| {
                let date = NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
                PanelRecord::new("BIG", "Iowa", date, None)
                    .with("crime_rate", 1.0)
                    .with("crime", 10_000.0)
            })
            .collect();
        let (p, _) = filter_discrepancies(
            &Panel::from_records(recs),
            "crime_rate",
            "crime",
            Frequency::Monthly,
        )
        .unwrap();
        assert_eq!(p.n_units(), 1);
    }

    #[test]
    fn missing_column_and_empty_result_are_errors() {
        assert!(matches!(
            filter_discrepancies(&panel(), "theft_rate", "theft", Frequency::Monthly),
            Err(Error::SchemaMismatch { .. })
        ));
        let only_swing = Panel::from_records(unit("SWING", &[0.0, 0.0, 600.0]));
        assert!(matches!(
            filter_discrepancies(&only_swing, "crime_rate", "crime", Frequency::Monthly),
            Err(Error::EmptyPanelAfterFilter { .. })
        ));
    }
}
