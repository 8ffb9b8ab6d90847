//! # ucr-inference
//!
//! Staggered difference-in-differences for the reporting-switch analysis.
//!
//! The pipeline only talks to the [`GroupTimeEstimator`] / [`AttAggregate`]
//! interface. [`CallawaySantAnna`] is the default implementation: group-time
//! ATTs with not-yet-treated (or never-treated) comparison groups,
//! cluster-robust influence-function standard errors, and dynamic / simple
//! aggregation.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Group-time ATT estimation and cluster-robust inference.
pub mod econometrics;
/// Estimator interface and result types.
pub mod estimator;

pub use econometrics::{CallawaySantAnna, GroupTimeAtt, GroupTimeCell};
pub use estimator::{
    AttAggregate, BasePeriod, ControlGroup, DidRequest, DynamicAtt, EstMethod, EstimatorSettings,
    EventTimeAtt, GroupTimeEstimator, SimpleAtt,
};
