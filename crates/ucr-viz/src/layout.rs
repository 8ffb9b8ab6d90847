use crate::canvas::Canvas;
use crate::primitives::TextStyle;

/// Axis limits, ticks and data→pixel mapping.
#[derive(Debug, Clone)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub label: String,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
}

impl Axis {
    /// Auto-scale linear axis with "nice number" ticks.
    pub fn auto_linear(data_min: f64, data_max: f64, target_ticks: usize) -> Self {
        let (nice_min, nice_max, step) = nice_range(data_min, data_max, target_ticks);
        let mut ticks = Vec::new();
        let mut labels = Vec::new();
        let mut v = nice_min;
        while v <= nice_max + step * 0.01 {
            ticks.push(v);
            labels.push(format_tick(v, step));
            v += step;
        }
        Self {
            min: nice_min,
            max: nice_max,
            label: String::new(),
            tick_positions: ticks,
            tick_labels: labels,
        }
    }

    /// Fixed limits with ticks every `step`, anchored at zero.
    pub fn with_breaks(min: f64, max: f64, step: f64) -> Self {
        let mut ticks = Vec::new();
        let mut labels = Vec::new();
        if step > 0.0 {
            let mut k = (min / step).ceil() as i64;
            while (k as f64) * step <= max + step * 1e-9 {
                let v = k as f64 * step;
                ticks.push(v);
                labels.push(format_tick(v, step));
                k += 1;
            }
        }
        Self { min, max, label: String::new(), tick_positions: ticks, tick_labels: labels }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Map a data value to pixel coordinate.
    pub fn data_to_pixel(&self, value: f64, px_min: f64, px_max: f64) -> f64 {
        let frac = (value - self.min) / (self.max - self.min);
        px_min + frac * (px_max - px_min)
    }
}

/// Rectangular plot area within the canvas.
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Margins from tick labels, axis labels and the caption block height.
    pub fn auto(
        canvas: &Canvas,
        y_axis: &Axis,
        x_axis: &Axis,
        tick: &TextStyle,
        label: &TextStyle,
        caption_height: f64,
    ) -> Self {
        let mut left = 15.0;
        let max_tick_w = y_axis
            .tick_labels
            .iter()
            .map(|l| canvas.text_width(l, tick))
            .fold(0.0_f64, f64::max);
        left += max_tick_w + 8.0;
        if !y_axis.label.is_empty() {
            left += label.size + 6.0;
        }

        let mut bottom = 15.0 + tick.size + 6.0 + caption_height;
        if !x_axis.label.is_empty() {
            bottom += label.size + 6.0;
        }

        let top = 15.0;
        let right = 15.0;
        let width = canvas.width - left - right;
        let height = canvas.height - top - bottom;
        Self { left, top, width: width.max(50.0), height: height.max(50.0) }
    }
}

/// "Nice numbers" algorithm for pleasant tick spacing.
fn nice_range(data_min: f64, data_max: f64, target_ticks: usize) -> (f64, f64, f64) {
    if (data_max - data_min).abs() < 1e-15 {
        return (data_min - 1.0, data_max + 1.0, 1.0);
    }
    let range = data_max - data_min;
    let rough_step = range / (target_ticks.max(2) - 1) as f64;
    let step = nice_step(rough_step);
    let nice_min = (data_min / step).floor() * step;
    let nice_max = (data_max / step).ceil() * step;
    (nice_min, nice_max, step)
}

fn nice_step(rough: f64) -> f64 {
    let exp = rough.abs().log10().floor();
    let frac = rough / 10.0_f64.powf(exp);
    let nice_frac = if frac <= 1.5 {
        1.0
    } else if frac <= 3.5 {
        2.0
    } else if frac <= 7.5 {
        5.0
    } else {
        10.0
    };
    nice_frac * 10.0_f64.powf(exp)
}

fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 { 0 } else { (-step.log10().floor()) as usize };
    if decimals == 0 {
        // Avoid "-0"
        let v = if value.abs() < step * 0.01 { 0.0 } else { value };
        format!("{}", v.round() as i64)
    } else {
        format!("{:.prec$}", value, prec = decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_linear_covers_data() {
        let ax = Axis::auto_linear(-3.2, 10.0, 6);
        assert!(ax.min <= -3.2);
        assert!(ax.max >= 10.0);
        assert_eq!(ax.tick_positions.len(), ax.tick_labels.len());
    }

    #[test]
    fn monthly_breaks_every_twelve() {
        let ax = Axis::with_breaks(-30.0, 40.0, 12.0);
        assert_eq!(ax.tick_positions, vec![-24.0, -12.0, 0.0, 12.0, 24.0, 36.0]);
        assert_eq!(ax.tick_labels[2], "0");
    }

    #[test]
    fn data_to_pixel_linear() {
        let ax = Axis::with_breaks(0.0, 100.0, 10.0);
        assert!((ax.data_to_pixel(50.0, 0.0, 500.0) - 250.0).abs() < 1e-9);
        // Inverted pixel range (y axes).
        assert!((ax.data_to_pixel(100.0, 400.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn nice_step_values() {
        assert!((nice_step(3.2) - 2.0).abs() < 1e-9);
        assert!((nice_step(0.7) - 0.5).abs() < 1e-9);
        assert!((nice_step(15.0) - 10.0).abs() < 1e-9);
    }
}
