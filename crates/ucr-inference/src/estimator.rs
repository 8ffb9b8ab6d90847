//! Estimator interface.
//!
//! Estimators see plain integer-labelled columns; they know nothing about
//! panels, categories or output files. Aggregation happens on the returned
//! [`AttAggregate`], so a mock can hand back fixed dynamic/simple results.

use serde::{Deserialize, Serialize};
use ucr_core::{Error, Result};

/// Estimation method tag.
///
/// Without covariates the three methods coincide with the unconditional
/// difference in mean changes; the tag is kept for provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstMethod {
    /// Doubly robust.
    #[default]
    Dr,
    /// Inverse probability weighting.
    Ipw,
    /// Outcome regression.
    Reg,
}

/// Which units serve as the comparison group for a group-time cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlGroup {
    /// Never-treated units plus units not yet treated by the later of `t` and the base period.
    #[default]
    NotYetTreated,
    /// Never-treated units only.
    NeverTreated,
}

/// Base-period policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasePeriod {
    /// Every cell of cohort `g` compares against `g - 1`.
    #[default]
    Universal,
    /// Pre-periods compare against `t - 1`; post-periods against `g - 1`.
    Varying,
}

/// Estimation settings carried in the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Method tag.
    pub method: EstMethod,
    /// Comparison-group policy.
    pub control_group: ControlGroup,
    /// Base-period policy.
    pub base_period: BasePeriod,
    /// Significance level for confidence intervals.
    pub alpha: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            method: EstMethod::Dr,
            control_group: ControlGroup::NotYetTreated,
            base_period: BasePeriod::Universal,
            alpha: 0.05,
        }
    }
}

/// Columns handed to an estimator. All slices have one entry per row.
#[derive(Debug, Clone, Copy)]
pub struct DidRequest<'a> {
    /// Outcome name (for logs and error messages).
    pub outcome_name: &'a str,
    /// Outcome values.
    pub outcome: &'a [f64],
    /// Integer period.
    pub time: &'a [u32],
    /// Integer unit id (inner cluster).
    pub unit: &'a [u32],
    /// Integer onset period, `0` for never-treated.
    pub onset: &'a [u32],
    /// Outer cluster (state group). Units must nest within it.
    pub cluster: &'a [u32],
    /// Estimation settings.
    pub settings: EstimatorSettings,
}

impl DidRequest<'_> {
    /// Check lengths, finiteness and `alpha`.
    pub fn validate(&self) -> Result<()> {
        let n = self.outcome.len();
        if n == 0 {
            return Err(Error::EstimatorFailure(format!("{}: no observations", self.outcome_name)));
        }
        if self.time.len() != n
            || self.unit.len() != n
            || self.onset.len() != n
            || self.cluster.len() != n
        {
            return Err(Error::EstimatorFailure(format!(
                "{}: time, unit, onset and cluster must have the same length as the outcome",
                self.outcome_name
            )));
        }
        if let Some(i) = self.outcome.iter().position(|y| !y.is_finite()) {
            return Err(Error::EstimatorFailure(format!(
                "{}: non-finite outcome at row {}",
                self.outcome_name, i
            )));
        }
        if !(self.settings.alpha > 0.0 && self.settings.alpha < 1.0) {
            return Err(Error::Validation(format!(
                "alpha must be in (0, 1), got {}",
                self.settings.alpha
            )));
        }
        Ok(())
    }
}

/// One event-time point of the dynamic aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventTimeAtt {
    /// Periods relative to treatment onset (`t - g`).
    pub event_time: i64,
    /// Point estimate.
    pub att: f64,
    /// Standard error.
    pub se: f64,
    /// Lower confidence bound.
    pub ci_lower: f64,
    /// Upper confidence bound.
    pub ci_upper: f64,
}

/// Dynamic (event-study) aggregation, ordered by event time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAtt {
    /// Points ordered by event time.
    pub points: Vec<EventTimeAtt>,
    /// Significance level of the bounds.
    pub alpha: f64,
}

/// Simple (overall) aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpleAtt {
    /// Overall ATT.
    pub att: f64,
    /// Standard error.
    pub se: f64,
    /// Lower confidence bound.
    pub ci_lower: f64,
    /// Upper confidence bound.
    pub ci_upper: f64,
}

/// Aggregations an estimator result supports.
pub trait AttAggregate {
    /// Event-time ATT triples.
    fn dynamic(&self) -> Result<DynamicAtt>;

    /// Overall ATT and standard error.
    fn simple(&self) -> Result<SimpleAtt>;
}

/// Group-time ATT estimator.
pub trait GroupTimeEstimator {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Estimate group-time effects for `request`.
    fn estimate(&self, request: &DidRequest<'_>) -> Result<Box<dyn AttAggregate>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_catches_bad_requests() {
        let y = [1.0, 2.0];
        let ids = [1u32, 1];
        let ok = DidRequest {
            outcome_name: "crime",
            outcome: &y,
            time: &[1, 2],
            unit: &ids,
            onset: &[0, 0],
            cluster: &ids,
            settings: EstimatorSettings::default(),
        };
        assert!(ok.validate().is_ok());

        let short = DidRequest { time: &[1], ..ok };
        assert!(matches!(short.validate(), Err(Error::EstimatorFailure(_))));

        let nan = [1.0, f64::NAN];
        let bad_y = DidRequest { outcome: &nan, ..ok };
        assert!(bad_y.validate().is_err());

        let bad_alpha =
            DidRequest { settings: EstimatorSettings { alpha: 1.5, ..Default::default() }, ..ok };
        assert!(bad_alpha.validate().is_err());
    }
}
