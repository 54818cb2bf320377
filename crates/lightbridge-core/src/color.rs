//! Conversion between the protocol's HSV color triple and packed 24-bit RGB.
//!
//! The voice protocol speaks hue/saturation/brightness; bulbs take one byte
//! per additive channel. Channels are quantized by truncating `255 * c`, so
//! the two directions are not exact inverses: a round trip lands within one
//! 8-bit step per channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest value a [`PackedColor`] may hold.
pub const MAX_PACKED: u32 = 0x00FF_FFFF;

/// A perceptual color as carried on the wire.
///
/// `hue` is in degrees, `saturation` and `brightness` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTriple {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl ColorTriple {
    /// Reported for devices that have never had a color set.
    pub const WHITE: Self = Self {
        hue: 0.0,
        saturation: 0.0,
        brightness: 1.0,
    };

    pub fn new(hue: f64, saturation: f64, brightness: f64) -> Self {
        Self {
            hue,
            saturation,
            brightness,
        }
    }

    /// Check the triple is convertible.
    ///
    /// Any finite hue is accepted (it is reduced modulo 360); saturation and
    /// brightness must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ColorError> {
        if !self.hue.is_finite() {
            return Err(ColorError::NonFinite("hue"));
        }
        check_unit("saturation", self.saturation)?;
        check_unit("brightness", self.brightness)?;
        Ok(())
    }
}

impl Default for ColorTriple {
    fn default() -> Self {
        Self::WHITE
    }
}

fn check_unit(component: &'static str, value: f64) -> Result<(), ColorError> {
    if !value.is_finite() {
        return Err(ColorError::NonFinite(component));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ColorError::OutOfRange { component, value });
    }
    Ok(())
}

/// An RGB color packed as `red << 16 | green << 8 | blue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedColor(u32);

impl PackedColor {
    /// Wrap a raw value, rejecting anything wider than 24 bits.
    pub fn new(value: u32) -> Result<Self, ColorError> {
        if value > MAX_PACKED {
            return Err(ColorError::PackedOverflow(value));
        }
        Ok(Self(value))
    }

    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self(u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for PackedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl TryFrom<u32> for PackedColor {
    type Error = ColorError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackedColor> for u32 {
    fn from(color: PackedColor) -> Self {
        color.0
    }
}

/// Error converting a color.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColorError {
    #[error("color {0} must be a finite number")]
    NonFinite(&'static str),
    #[error("color {component} must be within [0, 1], got {value}")]
    OutOfRange { component: &'static str, value: f64 },
    #[error("packed color {0:#X} does not fit in 24 bits")]
    PackedOverflow(u32),
}

/// Convert a triple to a packed RGB value.
pub fn hsl_to_packed(color: &ColorTriple) -> Result<PackedColor, ColorError> {
    color.validate()?;
    let hue = color.hue.rem_euclid(360.0) / 360.0;
    let (r, g, b) = hsv_to_rgb(hue, color.saturation, color.brightness);
    Ok(PackedColor::from_rgb(quantize(r), quantize(g), quantize(b)))
}

/// Convert a packed RGB value back to a triple.
///
/// Achromatic colors (all channels equal) report hue and saturation 0.
pub fn packed_to_hsl(color: PackedColor) -> ColorTriple {
    let normalize = |channel: u8| f64::from(channel) / 255.0;
    let (h, s, v) = rgb_to_hsv(
        normalize(color.red()),
        normalize(color.green()),
        normalize(color.blue()),
    );
    ColorTriple::new(360.0 * h, s, v)
}

fn quantize(channel: f64) -> u8 {
    // Truncation, not rounding.
    (255.0 * channel) as u8
}

/// `h` is a fraction of a full turn.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let scaled = h * 6.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return (0.0, 0.0, max);
    }
    let span = max - min;
    let s = span / max;
    let rc = (max - r) / span;
    let gc = (max - g) / span;
    let bc = (max - b) / span;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, max)
}
