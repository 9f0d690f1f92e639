//! Pure derivations from an [`AnchorRecord`] to display geometry.

use std::fmt;
use std::str::FromStr;

use crate::record::AnchorRecord;

/// Half of the fixed gallery window, in CSS pixels.
pub const DEFAULT_INSET: f64 = 29.0;

/// Ratio between the stored image size and its displayed background size.
pub const DEFAULT_MULTIPLIER: f64 = 4.2;

/// Decimal places kept in CSS margins.
pub const CSS_PRECISION: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CssParams {
    pub multiplier: f64,
    pub inset: f64,
}

impl Default for CssParams {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            inset: DEFAULT_INSET,
        }
    }
}

/// Distance to shift the scaled image up and to the left, never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CssOffset {
    pub margin_left: f64,
    pub margin_top: f64,
}

pub fn css_offset(record: &AnchorRecord, params: &CssParams) -> CssOffset {
    let shift = |extent: u32, center: f64| {
        let raw = f64::from(extent) / params.multiplier * center - params.inset;
        round_to(raw.max(0.0), CSS_PRECISION)
    };
    CssOffset {
        margin_left: shift(record.width(), record.center_x()),
        margin_top: shift(record.height(), record.center_y()),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Output portrait size in pixels, parsed from `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortraitSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PortraitSize {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
        }
    }
}

impl FromStr for PortraitSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid portrait size '{s}', expected WIDTHxHEIGHT"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| format!("invalid portrait dimension '{v}' in '{s}'"))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

/// Crop window in source pixels. May extend past the image edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub left: i64,
    pub top: i64,
}

/// Renders as `{W}x{H}{±X}{±Y}`; the offsets always carry a sign.
impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{:+}{:+}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Portrait-sized window centered on the anchor. No clamping.
pub fn crop_rect(record: &AnchorRecord, portrait: PortraitSize) -> CropRect {
    let (abs_x, abs_y) = record.absolute_center();
    CropRect {
        width: portrait.width,
        height: portrait.height,
        left: (abs_x - f64::from(portrait.width) / 2.0).round_ties_even() as i64,
        top: (abs_y - f64::from(portrait.height) / 2.0).round_ties_even() as i64,
    }
}
