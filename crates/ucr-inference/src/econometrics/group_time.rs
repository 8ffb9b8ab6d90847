//! Group-time average treatment effects for staggered adoption.
//!
//! For each treatment cohort `g` (units first treated in period `g`) and
//! period `t`, the unconditional group-time effect is
//!
//! `ATT(g,t) = E[Y_t − Y_b | G = g] − E[Y_t − Y_b | C]`
//!
//! where `b` is the base period and `C` the comparison group. Effects are
//! aggregated to event time `e = t − g` (dynamic) or over all post-treatment
//! cells (simple) with cohort-size weights.
//!
//! # References
//!
//! - Callaway & Sant'Anna (2021), "Difference-in-Differences with multiple
//!   time periods." *Journal of Econometrics*.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra::{DMatrix, DVector};
use ucr_core::{Error, Result};

use super::cluster::{cluster_robust_cov, combination_se, z_critical};
use crate::estimator::{
    AttAggregate, BasePeriod, ControlGroup, DidRequest, DynamicAtt, EventTimeAtt,
    GroupTimeEstimator, SimpleAtt,
};

/// One estimated (cohort, period) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTimeCell {
    /// Treatment cohort (onset period).
    pub group: u32,
    /// Calendar period.
    pub time: u32,
    /// Base period the change is measured from.
    pub base: u32,
    /// Point estimate.
    pub att: f64,
    /// Cohort size.
    pub n_treated: usize,
    /// Comparison-group size.
    pub n_control: usize,
}

impl GroupTimeCell {
    /// Periods relative to onset.
    pub fn event_time(&self) -> i64 {
        self.time as i64 - self.group as i64
    }

    /// True for cells at or after onset.
    pub fn is_post(&self) -> bool {
        self.time >= self.group
    }
}

/// Group-time ATT results with their joint cluster-robust covariance.
#[derive(Debug, Clone)]
pub struct GroupTimeAtt {
    /// Estimated cells, ordered by (group, time).
    pub cells: Vec<GroupTimeCell>,
    /// Covariance of the cell estimates (K × K).
    pub covariance: DMatrix<f64>,
    /// Significance level for confidence bounds.
    pub alpha: f64,
    /// Base-period policy the cells were estimated under.
    pub base_period: BasePeriod,
    /// Number of units entering the influence functions.
    pub n_units: usize,
}

impl GroupTimeAtt {
    /// Standard error of a single cell.
    pub fn cell_se(&self, k: usize) -> f64 {
        self.covariance[(k, k)].max(0.0).sqrt()
    }

    /// Cohort-size weights over the selected cells (zero elsewhere).
    fn weights<F: Fn(&GroupTimeCell) -> bool>(&self, select: F) -> Option<DVector<f64>> {
        let total: usize = self.cells.iter().filter(|c| select(c)).map(|c| c.n_treated).sum();
        if total == 0 {
            return None;
        }
        Some(DVector::from_iterator(
            self.cells.len(),
            self.cells
                .iter()
                .map(|c| if select(c) { c.n_treated as f64 / total as f64 } else { 0.0 }),
        ))
    }

    fn point(&self, w: &DVector<f64>) -> (f64, f64) {
        let att: f64 = self.cells.iter().zip(w.iter()).map(|(c, wk)| c.att * wk).sum();
        (att, combination_se(&self.covariance, w))
    }
}

impl AttAggregate for GroupTimeAtt {
    fn dynamic(&self) -> Result<DynamicAtt> {
        let z = z_critical(self.alpha)?;
        let event_times: BTreeSet<i64> = self.cells.iter().map(GroupTimeCell::event_time).collect();

        let mut points = Vec::with_capacity(event_times.len() + 1);
        for e in event_times {
            let Some(w) = self.weights(|c| c.event_time() == e) else { continue };
            let (att, se) = self.point(&w);
            points.push(EventTimeAtt {
                event_time: e,
                att,
                se,
                ci_lower: att - z * se,
                ci_upper: att + z * se,
            });
        }

        // Universal base: e = -1 is the normalisation, identically zero.
        if self.base_period == BasePeriod::Universal && !points.iter().any(|p| p.event_time == -1)
        {
            points.push(EventTimeAtt {
                event_time: -1,
                att: 0.0,
                se: 0.0,
                ci_lower: 0.0,
                ci_upper: 0.0,
            });
            points.sort_by_key(|p| p.event_time);
        }

        Ok(DynamicAtt { points, alpha: self.alpha })
    }

    fn simple(&self) -> Result<SimpleAtt> {
        let w = self.weights(GroupTimeCell::is_post).ok_or_else(|| {
            Error::EstimatorFailure("no post-treatment cells to aggregate".into())
        })?;
        let z = z_critical(self.alpha)?;
        let (att, se) = self.point(&w);
        Ok(SimpleAtt { att, se, ci_lower: att - z * se, ci_upper: att + z * se })
    }
}

/// Default group-time estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallawaySantAnna;

impl GroupTimeEstimator for CallawaySantAnna {
    fn name(&self) -> &str {
        "callaway_santanna"
    }

    fn estimate(&self, request: &DidRequest<'_>) -> Result<Box<dyn AttAggregate>> {
        Ok(Box::new(self.fit(request)?))
    }
}

impl CallawaySantAnna {
    /// Estimate every identifiable group-time cell.
    pub fn fit(&self, req: &DidRequest<'_>) -> Result<GroupTimeAtt> {
        req.validate()?;
        let name = req.outcome_name;
        let settings = req.settings;

        // Dense unit and period indices.
        let unit_ids: Vec<u32> =
            req.unit.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let unit_pos: HashMap<u32, usize> =
            unit_ids.iter().enumerate().map(|(i, &u)| (u, i)).collect();
        let periods: Vec<u32> =
            req.time.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let period_pos: HashMap<u32, usize> =
            periods.iter().enumerate().map(|(j, &t)| (t, j)).collect();
        let n_units = unit_ids.len();
        let n_periods = periods.len();
        if n_periods < 2 {
            return Err(Error::EstimatorFailure(format!("{name}: need at least two periods")));
        }

        // Outcome matrix (units × periods) plus per-unit onset and cluster.
        let mut y = DMatrix::from_element(n_units, n_periods, f64::NAN);
        let mut onset: Vec<Option<u32>> = vec![None; n_units];
        let mut cluster: Vec<Option<u32>> = vec![None; n_units];
        for r in 0..req.outcome.len() {
            let i = unit_pos[&req.unit[r]];
            let j = period_pos[&req.time[r]];
            if !y[(i, j)].is_nan() {
                return Err(Error::EstimatorFailure(format!(
                    "{name}: unit {} observed twice in period {}",
                    req.unit[r], req.time[r]
                )));
            }
            y[(i, j)] = req.outcome[r];
            if *onset[i].get_or_insert(req.onset[r]) != req.onset[r] {
                return Err(Error::EstimatorFailure(format!(
                    "{name}: onset varies within unit {}",
                    req.unit[r]
                )));
            }
            if *cluster[i].get_or_insert(req.cluster[r]) != req.cluster[r] {
                return Err(Error::EstimatorFailure(format!(
                    "{name}: unit {} is not nested in a single cluster",
                    req.unit[r]
                )));
            }
        }
        if y.iter().any(|v| v.is_nan()) {
            return Err(Error::EstimatorFailure(format!("{name}: panel is not balanced")));
        }
        let cluster: Vec<u32> = cluster.into_iter().map(|c| c.unwrap_or(0)).collect();

        // Cohorts. Onsets after the window behave as never treated; cohorts
        // without a pre-period are dropped along with their units.
        let first = periods[0];
        let last = periods[n_periods - 1];
        let cohort: Vec<Option<u32>> = onset
            .iter()
            .map(|g| match g.unwrap_or(0) {
                0 => Some(0),
                g if g > last => Some(0),
                g if g <= first => None,
                g => Some(g),
            })
            .collect();
        let dropped = cohort.iter().filter(|c| c.is_none()).count();
        if dropped > 0 {
            tracing::warn!(
                outcome = name,
                units = dropped,
                "dropping units treated in the first period"
            );
        }
        let groups: BTreeSet<u32> = cohort.iter().flatten().copied().filter(|&g| g > 0).collect();
        if groups.is_empty() {
            return Err(Error::EstimatorFailure(format!("{name}: no treated cohort in the window")));
        }

        let mut cells = Vec::new();
        let mut psi_cols: Vec<Vec<f64>> = Vec::new();
        let n_f = n_units as f64;

        for &g in &groups {
            for &t in &periods {
                let base = match settings.base_period {
                    BasePeriod::Universal => g - 1,
                    BasePeriod::Varying if t < g => {
                        if t == first {
                            continue;
                        }
                        t - 1
                    }
                    BasePeriod::Varying => g - 1,
                };
                if t == base {
                    continue;
                }
                let (Some(&jt), Some(&jb)) = (period_pos.get(&t), period_pos.get(&base)) else {
                    continue;
                };

                let horizon = t.max(base);
                let is_control = |c: u32| match settings.control_group {
                    ControlGroup::NeverTreated => c == 0,
                    ControlGroup::NotYetTreated => c == 0 || (c > horizon && c != g),
                };

                let mut sum_t = 0.0;
                let mut n_t = 0usize;
                let mut sum_c = 0.0;
                let mut n_c = 0usize;
                for i in 0..n_units {
                    let Some(c) = cohort[i] else { continue };
                    let delta = y[(i, jt)] - y[(i, jb)];
                    if c == g {
                        sum_t += delta;
                        n_t += 1;
                    } else if is_control(c) {
                        sum_c += delta;
                        n_c += 1;
                    }
                }
                if n_t == 0 || n_c == 0 {
                    tracing::debug!(
                        outcome = name,
                        g,
                        t,
                        n_t,
                        n_c,
                        "skipping cell without comparison group"
                    );
                    continue;
                }
                let mu_t = sum_t / n_t as f64;
                let mu_c = sum_c / n_c as f64;

                let mut psi = vec![0.0; n_units];
                for i in 0..n_units {
                    let Some(c) = cohort[i] else { continue };
                    let delta = y[(i, jt)] - y[(i, jb)];
                    if c == g {
                        psi[i] = n_f / n_t as f64 * (delta - mu_t);
                    } else if is_control(c) {
                        psi[i] = -n_f / n_c as f64 * (delta - mu_c);
                    }
                }

                cells.push(GroupTimeCell {
                    group: g,
                    time: t,
                    base,
                    att: mu_t - mu_c,
                    n_treated: n_t,
                    n_control: n_c,
                });
                psi_cols.push(psi);
            }
        }

        if cells.is_empty() {
            return Err(Error::EstimatorFailure(format!(
                "{name}: no group-time cell has a comparison group"
            )));
        }

        let k = cells.len();
        let influence = DMatrix::from_fn(n_units, k, |i, j| psi_cols[j][i]);
        let covariance = cluster_robust_cov(&influence, &cluster)?;

        let by_group: BTreeMap<u32, usize> = cells.iter().fold(BTreeMap::new(), |mut m, c| {
            *m.entry(c.group).or_insert(0) += 1;
            m
        });
        tracing::info!(
            outcome = name,
            method = ?settings.method,
            control_group = ?settings.control_group,
            base_period = ?settings.base_period,
            cohorts = by_group.len(),
            cells = k,
            units = n_units,
            "group-time ATTs estimated"
        );

        Ok(GroupTimeAtt {
            cells,
            covariance,
            alpha: settings.alpha,
            base_period: settings.base_period,
            n_units,
        })
    }
}
