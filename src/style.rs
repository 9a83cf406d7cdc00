//! Signature text and visual styling.
//!
//! [`SignatureStyle`] is plain data with self-validating setters. It has no
//! notion of placement: the session wraps every setter and invalidates the
//! committed placement after each call, so a style edit can never leave a
//! stale placement behind.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted font size in points.
pub const MIN_FONT_SIZE: u32 = 10;
/// Largest accepted font size in points.
pub const MAX_FONT_SIZE: u32 = 100;
/// Font size used by a fresh session.
pub const DEFAULT_FONT_SIZE: u32 = 24;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("static regex"));

/// The three standard PDF fonts the export service can embed without
/// shipping font files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    Courier,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
}

impl FontFamily {
    pub const ALL: [FontFamily; 3] = [
        FontFamily::Helvetica,
        FontFamily::Courier,
        FontFamily::TimesRoman,
    ];

    /// Name sent in the `fontStyle` form field.
    pub fn wire_name(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::Courier => "Courier",
            FontFamily::TimesRoman => "Times-Roman",
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for FontFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace(['-', ' ', '_'], "");
        match normalised.as_str() {
            "helvetica" => Ok(FontFamily::Helvetica),
            "courier" => Ok(FontFamily::Courier),
            "timesroman" => Ok(FontFamily::TimesRoman),
            _ => Err(ValidationError::UnknownFont { name: s.to_string() }),
        }
    }
}

/// A validated `#rgb` or `#rrggbb` color, stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if HEX_COLOR.is_match(trimmed) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(ValidationError::InvalidColor {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self("#000".to_string())
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

/// Text and look of the signature overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStyle {
    pub text: String,
    pub font_family: FontFamily,
    pub font_size_pt: u32,
    pub color: HexColor,
}

impl Default for SignatureStyle {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: FontFamily::default(),
            font_size_pt: DEFAULT_FONT_SIZE,
            color: HexColor::default(),
        }
    }
}

impl SignatureStyle {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_font(&mut self, family: FontFamily) {
        self.font_family = family;
    }

    /// Parse and set the font family from its display or wire name.
    pub fn set_font_name(&mut self, name: &str) -> Result<(), ValidationError> {
        self.font_family = name.parse()?;
        Ok(())
    }

    /// Set the font size, clamped to `[MIN_FONT_SIZE, MAX_FONT_SIZE]`.
    /// Returns the stored value.
    pub fn set_size(&mut self, size: u32) -> u32 {
        self.font_size_pt = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.font_size_pt
    }

    /// Set the color; invalid input leaves the current color in place.
    pub fn set_color(&mut self, hex: &str) -> Result<(), ValidationError> {
        self.color = HexColor::parse(hex)?;
        Ok(())
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}
