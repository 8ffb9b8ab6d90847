use serde::Deserialize;

use crate::color::{self, Color};

/// Event-study figure configuration (the `plot` section of a run config).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Figure width in inches.
    pub width_in: f64,
    /// Figure height in inches.
    pub height_in: f64,
    /// Raster resolution for PNG output.
    pub dpi: u32,
    /// Override for the x-axis limits (event time).
    pub x_limits: Option<[f64; 2]>,
    /// Override for the x-axis break spacing.
    pub x_break: Option<f64>,
    /// Override for the y-axis limits.
    pub y_limits: Option<[f64; 2]>,
    /// Replaces the generated caption.
    pub caption: Option<String>,
    pub tick_size: f64,
    pub label_size: f64,
    pub caption_size: f64,
    pub estimate_color: Color,
    pub interval_color: Color,
    pub pre_period_color: Color,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width_in: 8.75,
            height_in: 5.40,
            dpi: 100,
            x_limits: None,
            x_break: None,
            y_limits: None,
            caption: None,
            tick_size: 9.0,
            label_size: 11.0,
            caption_size: 9.0,
            estimate_color: color::ESTIMATE,
            interval_color: color::INTERVAL,
            pre_period_color: color::PRE_PERIOD,
        }
    }
}

impl PlotConfig {
    /// Canvas width in points.
    pub fn width_pt(&self) -> f64 {
        self.width_in * 72.0
    }

    /// Canvas height in points.
    pub fn height_pt(&self) -> f64 {
        self.height_in * 72.0
    }
}
