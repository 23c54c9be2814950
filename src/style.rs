use crate::error::{ComposeError, Result};

pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 72;
pub const MAX_MARGIN: u32 = 200;
pub const DEFAULT_MARGIN: u32 = 50;

/// An opaque sRGB text colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RGB` or `#RRGGBB` (the leading `#` is optional).
    pub fn parse_hex(value: &str) -> Result<Self> {
        let hex = value.trim().trim_start_matches('#');
        let invalid = || ComposeError::Validation(format!("invalid colour '{}'", value));
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        match hex.len() {
            3 => {
                let mut parts = [0u8; 3];
                for (slot, ch) in parts.iter_mut().zip(hex.chars()) {
                    let digit = ch.to_digit(16).ok_or_else(invalid)? as u8;
                    *slot = digit * 17;
                }
                Ok(Self::new(parts[0], parts[1], parts[2]))
            }
            6 => {
                let channel = |range: std::ops::Range<usize>| {
                    u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
                };
                Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Immutable style snapshot consumed by every layout and composite call.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub font_family: String,
    pub font_size: u32,
    pub text_color: Rgb,
    pub line_spacing: f32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub center_horizontally: bool,
    pub center_vertically: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 24,
            text_color: Rgb::BLACK,
            line_spacing: 1.5,
            margin_top: DEFAULT_MARGIN,
            margin_bottom: DEFAULT_MARGIN,
            margin_left: DEFAULT_MARGIN,
            margin_right: DEFAULT_MARGIN,
            center_horizontally: true,
            center_vertically: true,
        }
    }
}

impl StyleConfig {
    /// The one-click "center" action: both axes centred, margins reset.
    pub fn centered(&self) -> Self {
        Self {
            center_horizontally: true,
            center_vertically: true,
            margin_top: DEFAULT_MARGIN,
            margin_bottom: DEFAULT_MARGIN,
            margin_left: DEFAULT_MARGIN,
            margin_right: DEFAULT_MARGIN,
            ..self.clone()
        }
    }

    pub fn with_margins(&self, margin: u32) -> Self {
        Self {
            margin_top: margin,
            margin_bottom: margin,
            margin_left: margin,
            margin_right: margin,
            ..self.clone()
        }
    }

    /// Checks the bounds the settings surface guarantees. The layout engine
    /// does not rely on them.
    pub fn validate(&self) -> Result<()> {
        if self.font_family.trim().is_empty() {
            return Err(ComposeError::Validation("font family is empty".into()));
        }
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(ComposeError::Validation(format!(
                "font size {} outside {}..={}",
                self.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE
            )));
        }
        if !self.line_spacing.is_finite() || self.line_spacing < 1.0 {
            return Err(ComposeError::Validation(format!(
                "line spacing {} must be >= 1.0",
                self.line_spacing
            )));
        }
        let margins = [
            ("top", self.margin_top),
            ("bottom", self.margin_bottom),
            ("left", self.margin_left),
            ("right", self.margin_right),
        ];
        for (name, value) in margins {
            if value > MAX_MARGIN {
                return Err(ComposeError::Validation(format!(
                    "{} margin {} exceeds {}",
                    name, value, MAX_MARGIN
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(Rgb::parse_hex("#fff").unwrap(), Rgb::WHITE);
        assert_eq!(Rgb::parse_hex("c40000").unwrap(), Rgb::new(0xc4, 0, 0));
        assert_eq!(Rgb::parse_hex(" #1E88E5 ").unwrap().to_hex(), "#1e88e5");
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(Rgb::parse_hex("#12345").is_err());
        assert!(Rgb::parse_hex("#gggggg").is_err());
        assert!(Rgb::parse_hex("").is_err());
    }

    #[test]
    fn defaults_are_valid_and_centered() {
        let style = StyleConfig::default();
        style.validate().unwrap();
        assert!(style.center_horizontally && style.center_vertically);
        assert_eq!(style.font_size, 24);
    }

    #[test]
    fn validate_bounds() {
        let mut style = StyleConfig::default();
        style.font_size = 7;
        assert!(style.validate().is_err());
        style.font_size = 72;
        style.line_spacing = 0.9;
        assert!(style.validate().is_err());
        style.line_spacing = 1.0;
        style.margin_right = 201;
        assert!(style.validate().is_err());
    }

    #[test]
    fn centered_resets_margins() {
        let mut style = StyleConfig::default().with_margins(120);
        style.center_horizontally = false;
        let centered = style.centered();
        assert_eq!(centered.margin_left, DEFAULT_MARGIN);
        assert_eq!(centered.margin_bottom, DEFAULT_MARGIN);
        assert!(centered.center_horizontally);
        assert_eq!(centered.font_family, style.font_family);
    }
}
