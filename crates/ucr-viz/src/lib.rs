//! # ucr-viz
//!
//! Event-study figures for the reporting-switch analysis. A plot is built
//! from a serialisable [`EventStudyArtifact`], drawn onto a small SVG
//! [`canvas::Canvas`], and optionally rasterised to PNG (`png` feature).

pub mod canvas;
pub mod color;
pub mod config;
pub mod event_study;
pub mod layout;
pub mod output;
pub mod primitives;

use thiserror::Error;

pub use config::PlotConfig;
pub use event_study::{EventStudyArtifact, EventStudyPoint};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "png")]
    #[error("PNG encoding error: {0}")]
    Png(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for ucr_core::Error {
    fn from(e: RenderError) -> Self {
        ucr_core::Error::Computation(format!("plot rendering: {e}"))
    }
}

/// Output formats this build can produce.
pub fn formats() -> &'static [&'static str] {
    if cfg!(feature = "png") { &["svg", "png", "json"] } else { &["svg", "json"] }
}

/// Render an event-study artifact to bytes in `format`.
///
/// `json` is the artifact itself, which [`render_json`] turns back into a
/// figure.
pub fn render_to_bytes(
    artifact: &EventStudyArtifact,
    format: &str,
    config: &PlotConfig,
) -> Result<Vec<u8>> {
    match format {
        "json" => Ok(serde_json::to_vec_pretty(artifact)?),
        "svg" => Ok(event_study::render(artifact, config)?.into_bytes()),
        #[cfg(feature = "png")]
        "png" => output::png::svg_to_png(&event_study::render(artifact, config)?, config.dpi),
        other => Err(RenderError::UnknownFormat(other.to_string())),
    }
}

/// Render an artifact given as JSON (as written next to the figures).
pub fn render_json(artifact_json: &str, format: &str, config: &PlotConfig) -> Result<Vec<u8>> {
    let artifact: EventStudyArtifact = serde_json::from_str(artifact_json)?;
    render_to_bytes(&artifact, format, config)
}
