use std::fmt::{self, Write as FmtWrite};

use crate::color::Color;
use crate::primitives::*;

/// An SVG element stored for deferred rendering.
#[derive(Debug, Clone)]
enum SvgElement {
    Line { x1: f64, y1: f64, x2: f64, y2: f64, style: LineStyle },
    Text { x: f64, y: f64, content: String, style: TextStyle, rotate: Option<f64> },
    Circle { cx: f64, cy: f64, r: f64, style: Style },
}

/// Immediate-mode SVG canvas. Coordinates in points (1pt = 1/72").
///
/// Text is emitted with a generic `sans-serif` family and measured with a
/// fixed average advance, so layout does not depend on installed fonts.
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    elements: Vec<(Option<usize>, SvgElement)>,
    clips: Vec<(f64, f64, f64, f64)>,
    active_clip: Option<usize>,
}

/// Average glyph advance as a fraction of the font size.
const AVG_ADVANCE: f64 = 0.55;

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, elements: Vec::new(), clips: Vec::new(), active_clip: None }
    }

    // --- Drawing primitives ---

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, style: &LineStyle) {
        self.push(SvgElement::Line { x1, y1, x2, y2, style: style.clone() });
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, style: &TextStyle) {
        self.push(SvgElement::Text {
            x,
            y,
            content: content.to_string(),
            style: style.clone(),
            rotate: None,
        });
    }

    pub fn text_rotated(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, angle: f64) {
        self.push(SvgElement::Text {
            x,
            y,
            content: content.to_string(),
            style: style.clone(),
            rotate: Some(angle),
        });
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, style: &Style) {
        self.push(SvgElement::Circle { cx, cy, r, style: style.clone() });
    }

    /// Error bar: vertical line + optional horizontal caps.
    pub fn error_bar(&mut self, x: f64, y_lo: f64, y_hi: f64, cap_width: f64, style: &LineStyle) {
        self.line(x, y_lo, x, y_hi, style);
        if cap_width > 0.0 {
            let half = cap_width / 2.0;
            self.line(x - half, y_lo, x + half, y_lo, style);
            self.line(x - half, y_hi, x + half, y_hi, style);
        }
    }

    /// Data marker.
    pub fn marker(&mut self, x: f64, y: f64, marker: &MarkerStyle) {
        let style = if marker.fill {
            Style {
                fill: Some(marker.color),
                stroke: Some(marker.color),
                stroke_width: 0.5,
                opacity: 1.0,
            }
        } else {
            Style {
                fill: Some(Color::rgb(255, 255, 255)),
                stroke: Some(marker.color),
                stroke_width: 1.0,
                opacity: 1.0,
            }
        };
        self.circle(x, y, marker.size, &style);
    }

    // --- Clip paths ---

    /// Clip subsequent elements to the rectangle until [`Canvas::pop_clip`].
    pub fn push_clip(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.clips.push((x, y, w, h));
        self.active_clip = Some(self.clips.len() - 1);
    }

    pub fn pop_clip(&mut self) {
        self.active_clip = None;
    }

    // --- Text measurement ---

    /// Approximate rendered width of `content` in points.
    pub fn text_width(&self, content: &str, style: &TextStyle) -> f64 {
        content.chars().count() as f64 * style.size * AVG_ADVANCE
    }

    // --- SVG output ---

    fn push(&mut self, elem: SvgElement) {
        self.elements.push((self.active_clip, elem));
    }

    pub fn finish_svg(&self) -> Result<String, fmt::Error> {
        let mut out = String::with_capacity(32 * 1024);
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        )?;

        if !self.clips.is_empty() {
            out.push_str("<defs>\n");
            for (id, (x, y, w, h)) in self.clips.iter().enumerate() {
                writeln!(
                    out,
                    r#"<clipPath id="clip{id}"><rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" /></clipPath>"#
                )?;
            }
            out.push_str("</defs>\n");
        }

        writeln!(out, r#"<rect width="{}" height="{}" fill="white" />"#, self.width, self.height)?;

        // Consecutive elements under the same clip share one group.
        let mut open: Option<usize> = None;
        for (clip, elem) in &self.elements {
            if *clip != open {
                if open.is_some() {
                    out.push_str("</g>\n");
                }
                if let Some(id) = clip {
                    writeln!(out, r#"<g clip-path="url(#clip{id})">"#)?;
                }
                open = *clip;
            }
            render_element(&mut out, elem)?;
        }
        if open.is_some() {
            out.push_str("</g>\n");
        }

        out.push_str("</svg>\n");
        Ok(out)
    }
}

fn render_element(out: &mut String, elem: &SvgElement) -> fmt::Result {
    match elem {
        SvgElement::Line { x1, y1, x2, y2, style } => {
            write!(out, r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}""#)?;
            write_line_attrs(out, style)?;
            out.push_str(" />\n");
        }
        SvgElement::Text { x, y, content, style, rotate } => {
            write!(out, r#"<text x="{x:.2}" y="{y:.2}""#)?;
            write!(out, r#" font-family="sans-serif" font-size="{:.1}""#, style.size)?;
            write!(out, r#" fill="{}""#, style.color.to_svg_fill())?;
            write!(out, r#" text-anchor="{}""#, style.anchor.as_str())?;
            write!(out, r#" dominant-baseline="{}""#, style.baseline.as_str())?;
            if style.bold {
                out.push_str(r#" font-weight="bold""#);
            }
            if style.italic {
                out.push_str(r#" font-style="italic""#);
            }
            if let Some(angle) = rotate {
                write!(out, r#" transform="rotate({angle:.1},{x:.2},{y:.2})""#)?;
            }
            out.push('>');
            for ch in content.chars() {
                match ch {
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '&' => out.push_str("&amp;"),
                    '"' => out.push_str("&quot;"),
                    _ => out.push(ch),
                }
            }
            out.push_str("</text>\n");
        }
        SvgElement::Circle { cx, cy, r, style } => {
            write!(out, r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}""#)?;
            write_style_attrs(out, style)?;
            out.push_str(" />\n");
        }
    }
    Ok(())
}

fn write_style_attrs(out: &mut String, style: &Style) -> fmt::Result {
    match &style.fill {
        Some(fill) => write!(out, r#" fill="{}""#, fill.to_svg_fill())?,
        None => out.push_str(r#" fill="none""#),
    }
    if let Some(stroke) = &style.stroke {
        write!(out, r#" stroke="{}""#, stroke.to_svg_fill())?;
        write!(out, r#" stroke-width="{:.2}""#, style.stroke_width)?;
    }
    if (style.opacity - 1.0).abs() > 1e-4 {
        write!(out, r#" opacity="{:.3}""#, style.opacity)?;
    }
    Ok(())
}

fn write_line_attrs(out: &mut String, style: &LineStyle) -> fmt::Result {
    write!(out, r#" stroke="{}""#, style.color.to_svg_fill())?;
    write!(out, r#" stroke-width="{:.2}""#, style.width)?;
    if let Some(dash) = &style.dash {
        write!(out, r#" stroke-dasharray="{dash}""#)?;
    }
    Ok(())
}
