//! # ucr-core
//!
//! Shared building blocks for the UCR reporting-switch analysis:
//! the error taxonomy every stage reports through, and the small closed sets
//! (frequency, data source, crime category, month key) threaded through the
//! pipeline as configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error taxonomy.
pub mod error;
/// Closed-set pipeline types.
pub mod types;

pub use error::{Error, Result};
pub use types::{CategorySpec, CrimeCategory, DataSource, Frequency, MonthKey};

/// Crate version, stamped into generated artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
