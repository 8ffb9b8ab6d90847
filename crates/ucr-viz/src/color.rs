use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rrggbb` (leading `#` optional). Malformed channels read as 0.
    pub fn hex(s: &str) -> Self {
        let s = s.strip_prefix('#').unwrap_or(s);
        let channel = |range: std::ops::Range<usize>| {
            s.get(range).and_then(|c| u8::from_str_radix(c, 16).ok()).unwrap_or(0)
        };
        Self { r: channel(0..2), g: channel(2..4), b: channel(4..6), a: 1.0 }
    }

    pub const fn with_alpha(mut self, a: f64) -> Self {
        self.a = a;
        self
    }

    pub fn to_svg_fill(&self) -> String {
        if (self.a - 1.0).abs() < 1e-6 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_svg_fill())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Color::hex(&s))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0, 0, 0)
    }
}

pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const GREY: Color = Color::rgb(120, 120, 120);
/// Point estimates.
pub const ESTIMATE: Color = Color::rgb(0x1f, 0x4e, 0x79);
/// Confidence-interval bars.
pub const INTERVAL: Color = Color::rgb(0x4c, 0x78, 0xa8);
/// Pre-treatment points.
pub const PRE_PERIOD: Color = Color::rgb(0xe4, 0x57, 0x56);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        let c = Color::hex("#1D4ED8");
        assert_eq!((c.r, c.g, c.b), (0x1D, 0x4E, 0xD8));
        assert!((c.a - 1.0).abs() < 1e-9);
        assert_eq!(Color::hex("#12"), Color::rgb(0x12, 0, 0));
    }

    #[test]
    fn svg_fill() {
        assert_eq!(Color::rgb(29, 78, 216).to_svg_fill(), "#1d4ed8");
        assert_eq!(Color::rgb(29, 78, 216).with_alpha(0.5).to_svg_fill(), "rgba(29,78,216,0.500)");
    }
}
