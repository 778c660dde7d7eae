//! Color scales for the map and the treemap.
//!
//! The map uses a continuous piecewise linear ramp; the treemap uses a
//! quantized nine step palette. Both are built per request from the active
//! metric and the aggregated snapshot.

use std::fmt;

use crate::aggregate::Snapshot;
use crate::format::format_number;
use crate::record::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    /// Channel-wise linear interpolation, `t` in `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl serde::Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fill of map features with no data or a zero value. Its red and green
/// channels are equal while blue is higher, which no ramp below produces.
pub const NO_DATA: Rgb = Rgb::hex(0xe2e2e8);

/// Fraction of the maximum at each ramp stop.
pub const BREAKPOINTS: [f64; 5] = [0.0, 0.1, 0.3, 0.6, 1.0];

pub fn map_ramp(metric: Metric) -> [Rgb; 5] {
    let hex = match metric {
        Metric::Confirmed => [0xf7f7f7, 0xfee5d9, 0xfcae91, 0xfb6a4a, 0xcb181d],
        Metric::Deaths => [0xf7f7f7, 0xe5e5e5, 0x969696, 0x636363, 0x252525],
        Metric::Recovered => [0xf7f7f7, 0xe5f5e0, 0xa1d99b, 0x41ab5d, 0x006d2c],
        Metric::Active => [0xf7f7f7, 0xdeebf7, 0x9ecae1, 0x3182bd, 0x08519c],
        Metric::Daily => [0xf7f7f7, 0xfcf4e6, 0xffd700, 0xff9500, 0xff6b00],
    };
    hex.map(Rgb::hex)
}

/// Fill of a hovered map feature.
pub fn map_hover(metric: Metric) -> Rgb {
    match metric {
        Metric::Confirmed => Rgb::hex(0xff6b6b),
        Metric::Deaths => Rgb::hex(0x666666),
        Metric::Recovered => Rgb::hex(0x2ca02c),
        Metric::Active => Rgb::hex(0x1f77b4),
        Metric::Daily => Rgb::hex(0xff7f0e),
    }
}

/// Nine step ColorBrewer palettes.
pub fn treemap_palette(metric: Metric) -> [Rgb; 9] {
    let hex = match metric {
        // Blues
        Metric::Confirmed => [
            0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c,
            0x08306b,
        ],
        // Greys
        Metric::Deaths => [
            0xffffff, 0xf0f0f0, 0xd9d9d9, 0xbdbdbd, 0x969696, 0x737373, 0x525252, 0x252525,
            0x000000,
        ],
        // Greens
        Metric::Recovered => [
            0xf7fcf5, 0xe5f5e0, 0xc7e9c0, 0xa1d99b, 0x74c476, 0x41ab5d, 0x238b45, 0x006d2c,
            0x00441b,
        ],
        // Oranges
        Metric::Active => [
            0xfff5eb, 0xfee6ce, 0xfdd0a2, 0xfdae6b, 0xfd8d3c, 0xf16913, 0xd94801, 0xa63603,
            0x7f2704,
        ],
        // Purples
        Metric::Daily => [
            0xfcfbfd, 0xefedf5, 0xdadaeb, 0xbcbddc, 0x9e9ac8, 0x807dba, 0x6a51a3, 0x54278f,
            0x3f007d,
        ],
    };
    hex.map(Rgb::hex)
}

fn max_value(snapshot: &Snapshot, metric: Metric) -> u64 {
    snapshot.values().map(|r| metric.select(r)).max().unwrap_or(0)
}

/// Continuous color scale of the choropleth map.
#[derive(Debug, Clone)]
pub struct ChoroplethScale {
    stops: [f64; 5],
    ramp: [Rgb; 5],
}

#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct LegendEntry {
    pub color: Rgb,
    pub label: String,
}

impl ChoroplethScale {
    pub fn new(snapshot: &Snapshot, metric: Metric) -> Self {
        Self::with_max(max_value(snapshot, metric), metric)
    }

    /// The domain is `[0, max]`, with `max` floored at 1.
    pub fn with_max(max: u64, metric: Metric) -> Self {
        let max = max.max(1) as f64;
        Self {
            stops: BREAKPOINTS.map(|f| f * max),
            ramp: map_ramp(metric),
        }
    }

    pub fn max(&self) -> f64 {
        self.stops[4]
    }

    /// Interpolated ramp color, clamped to the domain.
    pub fn ramp_color(&self, value: f64) -> Rgb {
        let value = value.clamp(0.0, self.max());
        let segment = (1..self.stops.len())
            .find(|&i| value <= self.stops[i])
            .unwrap_or(self.stops.len() - 1);
        let (lo, hi) = (self.stops[segment - 1], self.stops[segment]);
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.0 };
        self.ramp[segment - 1].lerp(self.ramp[segment], t)
    }

    /// Fill for a feature: [`NO_DATA`] for 0 or a missing record.
    pub fn fill(&self, value: Option<u64>) -> Rgb {
        match value {
            Some(v) if v > 0 => self.ramp_color(v as f64),
            _ => NO_DATA,
        }
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        let last = self.stops.len() - 1;
        self.stops
            .iter()
            .enumerate()
            .map(|(i, &stop)| {
                let rounded = format_number(stop.round() as u64);
                LegendEntry {
                    color: self.ramp_color(stop),
                    label: match i {
                        0 => "0".to_string(),
                        i if i == last => format!("{rounded}+"),
                        _ => rounded,
                    },
                }
            })
            .collect()
    }
}

/// Discrete color scale of the treemap: `[0, max]` split into nine equal
/// bins.
#[derive(Debug, Clone)]
pub struct QuantizeScale {
    max: f64,
    palette: [Rgb; 9],
}

impl QuantizeScale {
    pub fn new(snapshot: &Snapshot, metric: Metric) -> Self {
        let max = if snapshot.is_empty() {
            1
        } else {
            max_value(snapshot, metric)
        };
        Self {
            max: max as f64,
            palette: treemap_palette(metric),
        }
    }

    pub fn palette(&self) -> &[Rgb; 9] {
        &self.palette
    }

    pub fn color(&self, value: u64) -> Rgb {
        let n = self.palette.len();
        let value = value as f64;
        // Thresholds sit at (i + 1) * max / n; a value equal to a threshold
        // falls in the upper bin.
        let bin = (0..n - 1)
            .filter(|&i| (i + 1) as f64 * self.max / n as f64 <= value)
            .count();
        self.palette[bin]
    }
}
