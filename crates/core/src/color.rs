//! Annotation colors
//!
//! Colors are carried as CSS-style `rgba(r, g, b, a)` strings in saved
//! containers. The alpha channel is the overlay opacity of a live highlight;
//! exporters read it through [`Color::opacity`] and draw with [`Color::base`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overlay alpha applied to every palette swatch.
pub const HIGHLIGHT_ALPHA: f32 = 0.548;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("unrecognized color syntax: {0:?}")]
    Syntax(String),
    #[error("color channel out of range in {0:?}")]
    ChannelRange(String),
}

/// RGBA color with 8-bit channels and a floating alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 1.0 };

    pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a: a.clamp(0.0, 1.0) }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// The same color without translucency.
    pub fn base(&self) -> Color {
        Color { a: 1.0, ..*self }
    }

    /// Overlay opacity used when drawing the color as a highlight fill.
    pub fn opacity(&self) -> f32 {
        self.a
    }
}

impl Default for Color {
    fn default() -> Self {
        Palette::Yellow.color()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        let syntax = || ColorParseError::Syntax(input.to_owned());
        let range = || ColorParseError::ChannelRange(input.to_owned());

        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(syntax);
        }

        let (name, body) = text.split_once('(').ok_or_else(syntax)?;
        let body = body.strip_suffix(')').ok_or_else(syntax)?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();

        let expected = match name.trim().to_ascii_lowercase().as_str() {
            "rgb" => 3,
            "rgba" => 4,
            _ => return Err(syntax()),
        };
        if parts.len() != expected {
            return Err(syntax());
        }

        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: f32 = part.parse().map_err(|_| syntax())?;
            if !(0.0..=255.0).contains(&value) {
                return Err(range());
            }
            *slot = value.round() as u8;
        }

        let alpha = match parts.get(3) {
            Some(part) => {
                let value: f32 = part.parse().map_err(|_| syntax())?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(range());
                }
                value
            }
            None => 1.0,
        };

        Ok(Color { r: channels[0], g: channels[1], b: channels[2], a: alpha })
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |index: usize| u8::from_str_radix(hex.get(index..index + 2)?, 16).ok();
    match hex.len() {
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)? as f32 / 255.0)),
        _ => None,
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// The fixed set of swatches offered by the annotation toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Yellow,
    Purple,
    Green,
    Red,
    Blue,
}

impl Palette {
    pub const ALL: [Palette; 5] =
        [Palette::Yellow, Palette::Purple, Palette::Green, Palette::Red, Palette::Blue];

    /// Highlight color for this swatch, at the standard overlay alpha.
    pub fn color(self) -> Color {
        let (r, g, b) = match self {
            Palette::Yellow => (215, 255, 39),
            Palette::Purple => (107, 28, 255),
            Palette::Green => (168, 255, 28),
            Palette::Red => (255, 15, 75),
            Palette::Blue => (15, 127, 255),
        };
        Color::rgba(r, g, b, HIGHLIGHT_ALPHA)
    }

    /// Swatch whose RGB matches `color`, ignoring alpha.
    pub fn matching(color: &Color) -> Option<Palette> {
        match (color.r, color.g, color.b) {
            (215, 255, 39) => Some(Palette::Yellow),
            (107, 28, 255) => Some(Palette::Purple),
            (168, 255, 28) => Some(Palette::Green),
            (255, 15, 75) => Some(Palette::Red),
            (15, 127, 255) => Some(Palette::Blue),
            _ => None,
        }
    }
}
