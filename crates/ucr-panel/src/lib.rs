//! # ucr-panel
//!
//! Panel construction and cleaning for the reporting-switch analysis.
//!
//! Stages, in pipeline order:
//! - [`loader`]: raw file → [`Panel`] with calendar-month keys
//! - [`balance`]: excluded jurisdictions out, incomplete units out
//! - [`discrepancy`]: zero-to-high swing units out
//! - [`encode`]: integer periods, onsets, unit ids and state groups
//! - [`correct`]: negative counts replaced by unit means
//!
//! Each stage takes a panel by reference and returns a new one.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Panel balancing.
pub mod balance;
/// Negative-value correction.
pub mod correct;
/// Discrepancy filter.
pub mod discrepancy;
/// Integer-time encoding.
pub mod encode;
/// Column-wise panel storage.
pub mod frame;
/// Raw file ingest.
pub mod loader;

pub use balance::{BalanceSummary, EXCLUDED_STATES, balance_panel};
pub use correct::correct_negatives;
pub use discrepancy::filter_discrepancies;
pub use encode::{EncodedPanel, PeriodIndex, encode_time};
pub use frame::{Panel, PanelRecord, month_key};
pub use loader::{LoaderConfig, load_panel, parse_date};
