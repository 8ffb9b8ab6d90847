//! Event-study plot: artifact and renderer.

use serde::{Deserialize, Serialize};
use ucr_core::{CrimeCategory, DataSource, Frequency};
use ucr_inference::DynamicAtt;

use crate::canvas::Canvas;
use crate::color::{BLACK, GREY};
use crate::config::PlotConfig;
use crate::layout::{Axis, PlotArea};
use crate::primitives::*;
use crate::{RenderError, Result};

/// One event-time estimate with its confidence bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventStudyPoint {
    /// Periods relative to the switch.
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

/// Plot-friendly artifact for one category's dynamic aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStudyArtifact {
    /// Category display name (e.g. "Aggravated Assault").
    pub outcome: String,
    /// Data source label (e.g. "FBI UCR").
    pub source: String,
    /// Panel frequency; sets the x-axis unit and break spacing.
    pub frequency: Frequency,
    /// Placebo run (onset shifted one year later).
    pub placebo: bool,
    /// Significance level of the bounds.
    pub alpha: f64,
    /// Points ordered by event time.
    pub points: Vec<EventStudyPoint>,
}

impl EventStudyArtifact {
    pub fn new(
        dynamic: &DynamicAtt,
        category: CrimeCategory,
        source: DataSource,
        frequency: Frequency,
        placebo: bool,
    ) -> Self {
        let points = dynamic
            .points
            .iter()
            .map(|p| EventStudyPoint {
                event_time: p.event_time,
                att: p.att,
                se: p.se,
                ci_lower: p.ci_lower,
                ci_upper: p.ci_upper,
            })
            .collect();
        Self {
            outcome: category.human_name().to_string(),
            source: source.label().to_string(),
            frequency,
            placebo,
            alpha: dynamic.alpha,
            points,
        }
    }

    fn unit(&self) -> &'static str {
        match self.frequency {
            Frequency::Monthly => "months",
            Frequency::Annual => "years",
        }
    }

    /// Two-sentence figure caption.
    pub fn caption(&self) -> String {
        let placebo =
            if self.placebo { " (placebo: switch date shifted one year later)" } else { "" };
        let level = ((1.0 - self.alpha) * 100.0).round();
        format!(
            "Event-study estimates of the effect of the NIBRS switch on {} reported to the {}{}. \
             Points are group-time ATTs aggregated by {} relative to the switch; \
             bars show {}% confidence intervals.",
            self.outcome.to_lowercase(),
            self.source,
            placebo,
            self.unit(),
            level
        )
    }
}

/// Default break spacing on the event-time axis.
pub fn default_break(frequency: Frequency) -> f64 {
    frequency.periods_per_year() as f64
}

/// Render an event-study artifact to an SVG string.
pub fn render(artifact: &EventStudyArtifact, config: &PlotConfig) -> Result<String> {
    if artifact.points.is_empty() {
        return Err(RenderError::Layout(format!("{}: no event-time points", artifact.outcome)));
    }

    let mut canvas = Canvas::new(config.width_pt(), config.height_pt());

    let step = config.x_break.unwrap_or_else(|| default_break(artifact.frequency));
    let (x_min, x_max) = match config.x_limits {
        Some([lo, hi]) => (lo, hi),
        None => {
            let lo = artifact.points.iter().map(|p| p.event_time).min().unwrap_or(0) as f64;
            let hi = artifact.points.iter().map(|p| p.event_time).max().unwrap_or(0) as f64;
            // Half a period of padding so end markers are not cut.
            ((lo / step).floor() * step - 0.5, (hi / step).ceil() * step + 0.5)
        }
    };
    if !(x_max > x_min) {
        return Err(RenderError::Config(format!("invalid x limits [{x_min}, {x_max}]")));
    }
    let x_label = match artifact.frequency {
        Frequency::Monthly => "Months relative to NIBRS switch",
        Frequency::Annual => "Years relative to NIBRS switch",
    };
    let x_axis = Axis::with_breaks(x_min, x_max, step).with_label(x_label);

    let y_axis = match config.y_limits {
        Some([lo, hi]) => Axis::auto_linear(lo, hi, 6),
        None => {
            let lo = artifact.points.iter().map(|p| p.ci_lower).fold(0.0_f64, f64::min);
            let hi = artifact.points.iter().map(|p| p.ci_upper).fold(0.0_f64, f64::max);
            Axis::auto_linear(lo, hi, 6)
        }
    }
    .with_label("ATT");

    let tick = TextStyle { size: config.tick_size, ..Default::default() };
    let label =
        TextStyle { size: config.label_size, anchor: TextAnchor::Middle, ..Default::default() };
    let caption_text = config.caption.clone().unwrap_or_else(|| artifact.caption());
    let caption_lines = wrap(&canvas, &caption_text, config, canvas.width - 30.0);
    let caption_height = caption_lines.len() as f64 * config.caption_size * 1.3 + 6.0;

    let area = PlotArea::auto(&canvas, &y_axis, &x_axis, &tick, &label, caption_height);
    draw_axes(&mut canvas, &area, &x_axis, &y_axis, config);

    canvas.push_clip(area.left, area.top, area.width, area.height);

    // Zero effect and switch reference lines.
    let y0 = y_axis.data_to_pixel(0.0, area.bottom(), area.top);
    canvas.line(area.left, y0, area.right(), y0, &LineStyle::solid(GREY, 0.8));
    let x_switch = x_axis.data_to_pixel(-0.5, area.left, area.right());
    canvas.line(x_switch, area.top, x_switch, area.bottom(), &LineStyle::dashed(GREY, 0.8));

    let cap = (area.width / (x_max - x_min) * 0.4).clamp(0.0, 6.0);
    for p in &artifact.points {
        let px = x_axis.data_to_pixel(p.event_time as f64, area.left, area.right());
        let lo = y_axis.data_to_pixel(p.ci_lower, area.bottom(), area.top);
        let hi = y_axis.data_to_pixel(p.ci_upper, area.bottom(), area.top);
        let py = y_axis.data_to_pixel(p.att, area.bottom(), area.top);
        let color = if p.event_time < 0 { config.pre_period_color } else { config.estimate_color };
        canvas.error_bar(px, lo, hi, cap, &LineStyle::solid(config.interval_color, 0.9));
        canvas.marker(px, py, &MarkerStyle { size: 2.2, color, fill: true });
    }

    canvas.pop_clip();

    // Caption below the x-axis label.
    let caption_style = TextStyle {
        size: config.caption_size,
        italic: true,
        baseline: TextBaseline::Hanging,
        ..Default::default()
    };
    let mut y = canvas.height - caption_height + 2.0;
    for line in &caption_lines {
        canvas.text(15.0, y, line, &caption_style);
        y += config.caption_size * 1.3;
    }

    canvas.finish_svg().map_err(|e| RenderError::Layout(e.to_string()))
}

fn draw_axes(
    canvas: &mut Canvas,
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    config: &PlotConfig,
) {
    let frame = LineStyle::solid(BLACK, 0.8);
    let tick_line = LineStyle::solid(BLACK, 0.6);
    let tl = 4.0;

    canvas.line(area.left, area.top, area.right(), area.top, &frame);
    canvas.line(area.left, area.bottom(), area.right(), area.bottom(), &frame);
    canvas.line(area.left, area.top, area.left, area.bottom(), &frame);
    canvas.line(area.right(), area.top, area.right(), area.bottom(), &frame);

    let x_tick_label = TextStyle {
        size: config.tick_size,
        anchor: TextAnchor::Middle,
        baseline: TextBaseline::Hanging,
        ..Default::default()
    };
    for (val, text) in x_axis.tick_positions.iter().zip(&x_axis.tick_labels) {
        let px = x_axis.data_to_pixel(*val, area.left, area.right());
        canvas.line(px, area.bottom(), px, area.bottom() + tl, &tick_line);
        canvas.text(px, area.bottom() + tl + 3.0, text, &x_tick_label);
    }

    let y_tick_label = TextStyle {
        size: config.tick_size,
        anchor: TextAnchor::End,
        baseline: TextBaseline::Central,
        ..Default::default()
    };
    let grid = LineStyle::dotted(GREY.with_alpha(0.4), 0.5);
    for (val, text) in y_axis.tick_positions.iter().zip(&y_axis.tick_labels) {
        let py = y_axis.data_to_pixel(*val, area.bottom(), area.top);
        if py < area.top - 0.5 || py > area.bottom() + 0.5 {
            continue;
        }
        canvas.line(area.left, py, area.right(), py, &grid);
        canvas.line(area.left, py, area.left - tl, py, &tick_line);
        canvas.text(area.left - tl - 3.0, py, text, &y_tick_label);
    }

    let label =
        TextStyle { size: config.label_size, anchor: TextAnchor::Middle, ..Default::default() };
    let x_label_y = area.bottom() + tl + config.tick_size + 16.0;
    canvas.text(area.left + area.width / 2.0, x_label_y, &x_axis.label, &label);
    canvas.text_rotated(
        area.left - 34.0,
        area.top + area.height / 2.0,
        &y_axis.label,
        &label,
        -90.0,
    );
}

/// Greedy word wrap to `max_width` points.
fn wrap(canvas: &Canvas, text: &str, config: &PlotConfig, max_width: f64) -> Vec<String> {
    let style = TextStyle { size: config.caption_size, ..Default::default() };
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate =
            if current.is_empty() { word.to_string() } else { format!("{current} {word}") };
        if canvas.text_width(&candidate, &style) > max_width && !current.is_empty() {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucr_inference::EventTimeAtt;

    fn dynamic(event_times: std::ops::RangeInclusive<i64>) -> DynamicAtt {
        let points = event_times
            .map(|e| {
                let att = if e >= 0 { 2.0 } else { 0.1 };
                EventTimeAtt {
                    event_time: e,
                    att,
                    se: 0.5,
                    ci_lower: att - 1.0,
                    ci_upper: att + 1.0,
                }
            })
            .collect();
        DynamicAtt { points, alpha: 0.05 }
    }

    #[test]
    fn caption_has_two_sentences() {
        let art = EventStudyArtifact::new(
            &dynamic(-2..=2),
            CrimeCategory::AggAssault,
            DataSource::Fbi,
            Frequency::Annual,
            false,
        );
        let caption = art.caption();
        assert_eq!(caption.matches(". ").count() + 1, 2);
        assert!(caption.contains("aggravated assault"));
        assert!(caption.contains("FBI UCR"));
        assert!(caption.contains("95% confidence"));
    }

    #[test]
    fn figure_has_fixed_size_and_monthly_breaks() {
        let art = EventStudyArtifact::new(
            &dynamic(-24..=36),
            CrimeCategory::Crime,
            DataSource::Alternative,
            Frequency::Monthly,
            true,
        );
        let svg = render(&art, &PlotConfig::default()).unwrap();
        assert!(svg.contains(r#"width="630""#));
        assert!(svg.contains(r#"height="388.8""#));
        for tick in [">-24<", ">-12<", ">0<", ">12<", ">24<", ">36<"] {
            assert!(svg.contains(tick), "missing tick {tick}");
        }
        assert!(!svg.contains(">6<"));
        assert!(svg.contains("Months relative to NIBRS switch"));
        assert!(svg.contains("placebo"));
        // 61 points → 61 markers.
        assert_eq!(svg.matches("<circle").count(), 61);
    }

    #[test]
    fn annual_axis_breaks_every_year_and_limits_override() {
        let art = EventStudyArtifact::new(
            &dynamic(-3..=5),
            CrimeCategory::Theft,
            DataSource::Fbi,
            Frequency::Annual,
            false,
        );
        let config = PlotConfig { x_limits: Some([-2.0, 3.0]), ..Default::default() };
        let svg = render(&art, &config).unwrap();
        for tick in [">-2<", ">-1<", ">0<", ">1<", ">2<", ">3<"] {
            assert!(svg.contains(tick), "missing tick {tick}");
        }
        assert!(svg.contains("Years relative to NIBRS switch"));
    }

    #[test]
    fn empty_dynamic_is_an_error() {
        let art = EventStudyArtifact::new(
            &DynamicAtt { points: vec![], alpha: 0.05 },
            CrimeCategory::Murder,
            DataSource::Fbi,
            Frequency::Annual,
            false,
        );
        assert!(matches!(render(&art, &PlotConfig::default()), Err(RenderError::Layout(_))));
    }
}
