use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ucr_core::Frequency;
use ucr_panel::{
    EXCLUDED_STATES, Panel, PanelRecord, PeriodIndex, balance_panel, encode_time,
    filter_discrepancies,
};

/// 12 units over 6 months with deliberate defects: gaps, DC rows, a swing
/// unit and scattered negative counts.
fn messy_panel() -> Panel {
    let mut recs = Vec::new();
    let states = ["Iowa", "Ohio", "Texas", "District of Columbia"];
    for u in 0..12u32 {
        let ori = format!("XX{u:07}");
        let state = states[(u % 4) as usize];
        let onset = match u % 3 {
            0 => None,
            1 => NaiveDate::from_ymd_opt(2020, 3, 1),
            _ => NaiveDate::from_ymd_opt(2020, 5, 1),
        };
        for m in 1..=6u32 {
            if u == 5 && m == 4 {
                continue; // gap
            }
            let base = 20.0 + u as f64 + m as f64;
            let count = if (u + m) % 7 == 0 { -3.0 } else { base };
            // Unit 9 reports zero early on and then an implausible count.
            let (rate, count) =
                if u == 9 { (if m < 3 { 0.0 } else { 1.0 }, 900.0) } else { (1.0, count) };
            recs.push(
                PanelRecord::new(&ori, state, NaiveDate::from_ymd_opt(2020, m, 1).unwrap(), onset)
                    .with("crime", count)
                    .with("crime_rate", rate),
            );
        }
    }
    Panel::from_records(recs)
}

#[test]
fn balanced_panel_is_rectangular() {
    let (p, summary) = balance_panel(&messy_panel(), EXCLUDED_STATES).unwrap();
    assert_eq!(summary.n_periods, 6);
    // 3 DC units excluded, unit 5 has a gap.
    assert_eq!(summary.units_kept, 8);
    let t = p.distinct_periods().len();
    for rows in p.unit_rows().values() {
        assert_eq!(rows.len(), t);
    }
    assert!(p.state().iter().all(|s| s != "District of Columbia"));
}

#[test]
fn cleaning_chain_upholds_encoding_and_correction_invariants() {
    let raw = messy_panel();
    let (balanced, _) = balance_panel(&raw, EXCLUDED_STATES).unwrap();
    let (filtered, dropped) =
        filter_discrepancies(&balanced, "crime_rate", "crime", Frequency::Monthly).unwrap();
    assert_eq!(dropped, 1);
    assert!(filtered.ori().iter().all(|o| o != "XX0000009"));

    let index = PeriodIndex::dense_from_panel(&filtered);
    let encoded = encode_time(&filtered, &index, Frequency::Monthly, false).unwrap();
    for i in 0..encoded.panel.len() {
        assert!((1..=6).contains(&encoded.period[i]));
        assert_eq!(encoded.onset_period[i] == 0, encoded.panel.onset()[i].is_none());
    }

    let before = encoded.panel.column("crime").unwrap().to_vec();
    let (corrected, n) = encoded.correct_negatives("crime").unwrap();
    assert!(n > 0);
    let after = corrected.panel.column("crime").unwrap();
    assert!(after.iter().flatten().all(|v| *v >= 0.0));

    for rows in corrected.panel.unit_rows().values() {
        let valid: Vec<f64> =
            rows.iter().filter_map(|&i| before[i]).filter(|v| *v >= 0.0).collect();
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        for &i in rows {
            if before[i].is_some_and(|v| v < 0.0) {
                assert_abs_diff_eq!(after[i].unwrap(), mean, epsilon = 1e-12);
            } else {
                assert_eq!(after[i], before[i]);
            }
        }
    }
    // Encoding columns survive correction unchanged.
    assert_eq!(corrected.onset_period, encoded.onset_period);
    assert_eq!(corrected.unit_id, encoded.unit_id);
}
