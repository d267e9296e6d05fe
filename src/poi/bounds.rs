use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of decimal digits kept per edge (~100m at the equator).
pub const DEFAULT_BOUNDS_PRECISION: u32 = 3;

/// Geographic extent of a viewport, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// Parse `west,south,east,north`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let parts: Vec<f64> = input
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid bbox '{}': {}", input, e))?;

        match parts.as_slice() {
            [west, south, east, north] => Ok(Self::new(*west, *south, *east, *north)),
            _ => Err(format!("bbox must have 4 comma-separated values, got {}", parts.len())),
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    /// Shift by whole multiples of the box's own size.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        let (w, h) = (self.width(), self.height());
        Self::new(
            self.west + dx * w,
            self.south + dy * h,
            self.east + dx * w,
            self.north + dy * h,
        )
    }

    pub fn key(&self, precision: u32) -> BoundsKey {
        BoundsKey::new(self, precision)
    }
}

/// Dedup token for "already queried" tracking.
///
/// Two boxes whose edges round to the same values at `precision` share a key,
/// so nearly identical viewports coalesce into a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundsKey(String);

impl BoundsKey {
    pub fn new(bbox: &BoundingBox, precision: u32) -> Self {
        let edges = [bbox.west, bbox.south, bbox.east, bbox.north];
        let key = edges
            .iter()
            .map(|edge| round_edge(*edge, precision))
            .collect::<Vec<_>>()
            .join(",");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoundsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn round_edge(value: f64, precision: u32) -> String {
    let formatted = format!("{:.*}", precision as usize, value);
    // -0.0001 rounds to "-0.000"; keep it equal to the key for 0.0001
    match formatted.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => formatted,
    }
}
