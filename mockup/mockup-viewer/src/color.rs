//! sRGB colors as the host supplies them (`#rrggbb`, `#rgb`, `rgb(r, g, b)`), and the transfer
//! functions between sRGB and linear light.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ColorParseError;

/// 8-bit sRGB color. Serializes as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`.
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn parse(value: &str) -> Result<Self, ColorParseError> {
        let s = value.trim();
        if s.is_empty() {
            return Err(ColorParseError::Empty);
        }
        let invalid = || ColorParseError::Invalid(value.to_string());
        if let Some(hex) = s.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            return match hex.len() {
                6 => u32::from_str_radix(hex, 16).map(Self::from_hex).map_err(|_| invalid()),
                3 => {
                    let mut c = [0u8; 3];
                    for (slot, ch) in c.iter_mut().zip(hex.chars()) {
                        let d = ch.to_digit(16).ok_or_else(invalid)? as u8;
                        *slot = d * 17;
                    }
                    Ok(Self::rgb(c[0], c[1], c[2]))
                }
                _ => Err(invalid()),
            };
        }
        let lower = s.to_ascii_lowercase();
        if let Some(body) = lower.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(invalid());
            }
            let mut c = [0u8; 3];
            for (slot, part) in c.iter_mut().zip(parts) {
                *slot = part.parse::<u8>().map_err(|_| invalid())?;
            }
            return Ok(Self::rgb(c[0], c[1], c[2]));
        }
        Err(invalid())
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels in [0, 1], still sRGB-encoded.
    pub fn to_srgb_f32(self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }

    /// Linear-light channels, for shading.
    pub fn to_linear(self) -> [f32; 3] {
        let [r, g, b] = self.to_srgb_f32();
        [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b)]
    }

    /// Linear RGBA with the given alpha.
    pub fn to_linear_rgba(self, alpha: f32) -> [f32; 4] {
        let [r, g, b] = self.to_linear();
        [r, g, b, alpha]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Quantize a linear channel to an 8-bit sRGB value.
pub fn linear_to_srgb_u8(c: f32) -> u8 {
    (linear_to_srgb(c) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(Color::parse("#ff0000").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::parse("#00FF00").unwrap(), Color::rgb(0, 255, 0));
        assert_eq!(Color::parse("#fff").unwrap(), Color::WHITE);
        assert_eq!(Color::parse("  #131316 ").unwrap(), Color::from_hex(0x131316));
    }

    #[test]
    fn parses_component_form() {
        assert_eq!(Color::parse("rgb(12, 34, 56)").unwrap(), Color::rgb(12, 34, 56));
        assert_eq!(Color::parse("RGB(0,0,255)").unwrap(), Color::rgb(0, 0, 255));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Color::parse(""), Err(ColorParseError::Empty));
        assert!(Color::parse("#ff00").is_err());
        assert!(Color::parse("#gg0000").is_err());
        assert!(Color::parse("red").is_err());
        assert!(Color::parse("rgb(256, 0, 0)").is_err());
        assert!(Color::parse("rgb(1, 2)").is_err());
    }

    #[test]
    fn hex_round_trip_through_serde() {
        let json = serde_json::to_string(&Color::rgb(0x13, 0x13, 0x16)).unwrap();
        assert_eq!(json, "\"#131316\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::from_hex(0x131316));
        assert!(serde_json::from_str::<Color>("\"nope\"").is_err());
    }

    #[test]
    fn transfer_functions_hit_endpoints() {
        for c in Color::WHITE.to_linear() {
            assert!((c - 1.0).abs() < 1e-6);
        }
        assert_eq!(Color::BLACK.to_linear(), [0.0, 0.0, 0.0]);
        for v in [0u8, 1, 17, 128, 200, 255] {
            let lin = srgb_to_linear(v as f32 / 255.0);
            assert_eq!(linear_to_srgb_u8(lin), v);
        }
    }
}
