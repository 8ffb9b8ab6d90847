//! Negative-value correction.

use ucr_core::Result;

use crate::encode::EncodedPanel;
use crate::frame::Panel;

/// Replace negative values of `column` by the unit's own mean.
///
/// The mean is taken once per unit over the pre-correction non-negative,
/// non-missing values, so a replaced cell never feeds into another
/// replacement. Units with no such values get `0.0`. Missing cells stay
/// missing. Returns the corrected panel and the number of cells replaced.
pub fn correct_negatives(panel: &Panel, column: &str) -> Result<(Panel, usize)> {
    let values = panel.column(column)?;
    let mut corrected = values.to_vec();
    let mut n_corrected = 0usize;

    for (ori, rows) in panel.unit_rows() {
        if !rows.iter().any(|&i| values[i].is_some_and(|v| v < 0.0)) {
            continue;
        }
        let valid: Vec<f64> =
            rows.iter().filter_map(|&i| values[i]).filter(|v| *v >= 0.0).collect();
        let mean = if valid.is_empty() {
            tracing::warn!(ori, column, "unit has no non-negative values; using 0");
            0.0
        } else {
            valid.iter().sum::<f64>() / valid.len() as f64
        };
        for &i in &rows {
            if values[i].is_some_and(|v| v < 0.0) {
                corrected[i] = Some(mean);
                n_corrected += 1;
            }
        }
    }

    if n_corrected > 0 {
        tracing::info!(column, cells = n_corrected, "negative values replaced by unit means");
    }
    Ok((panel.with_column(column, corrected)?, n_corrected))
}

impl EncodedPanel {
    /// [`correct_negatives`] over the underlying panel, keeping the encoding.
    pub fn correct_negatives(&self, column: &str) -> Result<(EncodedPanel, usize)> {
        let (panel, n) = correct_negatives(&self.panel, column)?;
        Ok((self.with_panel(panel)?, n))
    }
}
