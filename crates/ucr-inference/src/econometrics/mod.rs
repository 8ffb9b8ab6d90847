//! Staggered DiD econometrics.
//!
//! - **Group-time ATT** (Callaway & Sant'Anna style) for staggered adoption,
//!   unconditional parallel trends, universal or varying base period.
//! - **Cluster-robust inference** on per-unit influence functions, with units
//!   nested in outer clusters.

pub mod cluster;
pub mod group_time;

pub use cluster::{cluster_robust_cov, z_critical};
pub use group_time::{CallawaySantAnna, GroupTimeAtt, GroupTimeCell};
