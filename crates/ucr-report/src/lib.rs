//! # ucr-report
//!
//! Turns estimator output into the analysis artifacts and drives the
//! per-source pipeline:
//! - [`effect_size`]: yearly effect sizes, CSV persistence
//! - [`tables`]: LaTeX effect-size tables, simple-ATT columns, master table
//! - [`naming`]: output file names
//! - [`pipeline`]: `run_category`, `run_source`, `combine_source`

#![warn(clippy::all)]

pub mod effect_size;
pub mod naming;
pub mod pipeline;
pub mod tables;

pub use effect_size::{EffectSizeRow, SeBinning, extract_effect_sizes, read_effect_sizes};
pub use naming::{ArtifactKind, OutputNames};
pub use pipeline::{
    CategoryArtifacts, CategorySummary, PreparedSource, RunPlan, SourceReport, combine_source,
    compute_category, prepare_source, run_category, run_source,
};
pub use tables::{LatexTable, MasterTable, SimpleAttColumn};
