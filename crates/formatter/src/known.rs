//! Known value types and the fixed known-type table.
//!
//! The table is part of the wire format: an index here costs one digit on
//! the wire instead of a type name. Changing it breaks every previously
//! issued payload, so it is fixed per format version.

use crate::error::FormatError;
use std::fmt;

pub const OBJECT_TYPE: usize = 0;
pub const UNIT_TYPE: usize = 1;
pub const COLOR_TYPE: usize = 2;
pub const INT16_TYPE: usize = 3;
pub const INT64_TYPE: usize = 4;

pub const KNOWN_TYPE_NAMES: [&str; 5] = ["object", "unit", "color", "int16", "int64"];

/// First index handed out to types named inline during one serialization.
/// Indices between the known table and this offset are never valid.
pub const DYNAMIC_TYPE_OFFSET: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnitType {
    #[default]
    Pixel,
    Point,
    Pica,
    Inch,
    Mm,
    Cm,
    Percentage,
    Em,
    Ex,
}

impl UnitType {
    pub fn suffix(self) -> &'static str {
        match self {
            UnitType::Pixel => "px",
            UnitType::Point => "pt",
            UnitType::Pica => "pc",
            UnitType::Inch => "in",
            UnitType::Mm => "mm",
            UnitType::Cm => "cm",
            UnitType::Percentage => "%",
            UnitType::Em => "em",
            UnitType::Ex => "ex",
        }
    }

    fn from_suffix(suffix: &str) -> Option<UnitType> {
        let ty = match suffix.to_ascii_lowercase().as_str() {
            "" | "px" => UnitType::Pixel,
            "pt" => UnitType::Point,
            "pc" => UnitType::Pica,
            "in" => UnitType::Inch,
            "mm" => UnitType::Mm,
            "cm" => UnitType::Cm,
            "%" => UnitType::Percentage,
            "em" => UnitType::Em,
            "ex" => UnitType::Ex,
            _ => return None,
        };
        Some(ty)
    }
}

/// A length: a number with a unit suffix, or empty.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Unit {
    #[default]
    Empty,
    Length { value: f64, ty: UnitType },
}

impl Unit {
    pub fn pixel(value: f64) -> Unit {
        Unit::Length {
            value,
            ty: UnitType::Pixel,
        }
    }

    pub fn percentage(value: f64) -> Unit {
        Unit::Length {
            value,
            ty: UnitType::Percentage,
        }
    }

    pub fn parse(text: &str) -> Result<Unit, FormatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Unit::Empty);
        }
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(text.len());
        let (number, suffix) = text.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| FormatError::conversion(KNOWN_TYPE_NAMES[UNIT_TYPE], text))?;
        if !value.is_finite() {
            return Err(FormatError::conversion(KNOWN_TYPE_NAMES[UNIT_TYPE], text));
        }
        let ty = UnitType::from_suffix(suffix.trim())
            .ok_or_else(|| FormatError::conversion(KNOWN_TYPE_NAMES[UNIT_TYPE], text))?;
        Ok(Unit::Length { value, ty })
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Empty => Ok(()),
            Unit::Length { value, ty } => write!(f, "{value}{}", ty.suffix()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Color {
    #[default]
    Empty,
    /// A named color (`Red`, `ButtonFace`, ...), kept as written.
    Named(String),
    Argb(u32),
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color::Argb(0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    pub fn parse(text: &str) -> Result<Color, FormatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Color::Empty);
        }
        let bad = || FormatError::conversion(KNOWN_TYPE_NAMES[COLOR_TYPE], text);
        if let Some(hex) = text.strip_prefix('#') {
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(bad());
            }
            let raw = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
            return match hex.len() {
                6 => Ok(Color::Argb(0xFF00_0000 | raw)),
                8 => Ok(Color::Argb(raw)),
                _ => Err(bad()),
            };
        }
        if text.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Ok(Color::Named(text.to_string()));
        }
        Err(bad())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Empty => Ok(()),
            Color::Named(name) => f.write_str(name),
            Color::Argb(argb) if argb >> 24 == 0xFF => write!(f, "#{:06X}", argb & 0x00FF_FFFF),
            Color::Argb(argb) => write!(f, "#{argb:08X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_text_forms() {
        assert_eq!(Unit::pixel(10.0).to_string(), "10px");
        assert_eq!(Unit::percentage(50.0).to_string(), "50%");
        assert_eq!(
            Unit::Length {
                value: 1.5,
                ty: UnitType::Em
            }
            .to_string(),
            "1.5em"
        );
        assert_eq!(Unit::Empty.to_string(), "");
    }

    #[test]
    fn unit_parse_defaults_to_pixels() {
        assert_eq!(Unit::parse("12").unwrap(), Unit::pixel(12.0));
        assert_eq!(Unit::parse(" 3.25 PT ").unwrap(), Unit::Length {
            value: 3.25,
            ty: UnitType::Point
        });
        assert_eq!(Unit::parse("").unwrap(), Unit::Empty);
    }

    #[test]
    fn unit_parse_rejects_garbage() {
        assert!(Unit::parse("px").is_err());
        assert!(Unit::parse("10furlongs").is_err());
    }

    #[test]
    fn color_hex_and_named() {
        assert_eq!(Color::parse("#FF0000").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::rgb(255, 0, 0).to_string(), "#FF0000");
        assert_eq!(Color::parse("#80112233").unwrap(), Color::Argb(0x8011_2233));
        assert_eq!(Color::Argb(0x8011_2233).to_string(), "#80112233");
        assert_eq!(
            Color::parse("ButtonFace").unwrap(),
            Color::Named("ButtonFace".to_string())
        );
        assert!(Color::parse("#12").is_err());
        assert!(Color::parse("not a color").is_err());
    }
}
