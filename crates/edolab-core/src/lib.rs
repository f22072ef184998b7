#![deny(missing_docs)]
#![doc = "Core types shared by the edolab summarisation crates: the error surface, table cells and seed lineage."]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;

pub use errors::{ErrorInfo, LabError};
pub use rng::{RngHandle, SeedLineage};

/// Storage class of a column produced by a distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// 64-bit floating point values.
    Float,
    /// 64-bit signed integers.
    Integer,
    /// Booleans stored one byte per value.
    Boolean,
}

impl ColumnKind {
    /// Declared in-memory width of a single value, in bytes.
    pub const fn width(self) -> u64 {
        match self {
            ColumnKind::Float | ColumnKind::Integer => 8,
            ColumnKind::Boolean => 1,
        }
    }

    /// Decodes a serialized cell according to this kind.
    ///
    /// Returns `None` when the text does not represent a value of the kind.
    pub fn decode(self, raw: &str) -> Option<Cell> {
        let raw = raw.trim();
        match self {
            ColumnKind::Float => raw.parse::<f64>().ok().map(Cell::Float),
            ColumnKind::Integer => raw
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    // Integer columns written through a float pipeline come back as `3.0`.
                    raw.parse::<f64>()
                        .ok()
                        .filter(|value| value.fract() == 0.0 && value.is_finite())
                        .map(|value| value as i64)
                })
                .map(Cell::Integer),
            ColumnKind::Boolean => match raw {
                "true" | "True" | "TRUE" | "1" => Some(Cell::Boolean(true)),
                "false" | "False" | "FALSE" | "0" => Some(Cell::Boolean(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Float => "float",
            ColumnKind::Integer => "integer",
            ColumnKind::Boolean => "boolean",
        };
        f.write_str(label)
    }
}

/// A single decoded table value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Floating point value.
    Float(f64),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
}

impl Cell {
    /// Numeric view of the cell; booleans map to `0.0` / `1.0`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Cell::Float(value) => value,
            Cell::Integer(value) => value as f64,
            Cell::Boolean(value) => f64::from(u8::from(value)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Boolean(value) => write!(f, "{value}"),
        }
    }
}

/// Closed interval `[low, high]` serialized as a two element sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    /// Inclusive lower end.
    pub low: f64,
    /// Inclusive upper end.
    pub high: f64,
}

impl Bounds {
    /// Creates a new interval.
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Whether `low <= high` (and neither end is NaN).
    pub fn is_ordered(&self) -> bool {
        self.low <= self.high
    }

    /// Whether `self` lies entirely within `outer`.
    pub fn within(&self, outer: &Bounds) -> bool {
        outer.low <= self.low && self.high <= outer.high
    }
}

impl From<[f64; 2]> for Bounds {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(bounds: Bounds) -> Self {
        [bounds.low, bounds.high]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_decode_accepts_float_spelling() {
        assert_eq!(ColumnKind::Integer.decode("3.0"), Some(Cell::Integer(3)));
        assert_eq!(ColumnKind::Integer.decode("3.5"), None);
    }

    #[test]
    fn float_display_roundtrips() {
        let value = 0.1_f64 + 0.2_f64;
        let text = Cell::Float(value).to_string();
        assert_eq!(ColumnKind::Float.decode(&text), Some(Cell::Float(value)));
    }

    #[test]
    fn bounds_containment() {
        let inner = Bounds::new(-1.0, 0.0);
        assert!(inner.within(&Bounds::new(-100.0, 0.0)));
        assert!(!inner.within(&Bounds::new(-0.5, 0.0)));
        assert!(inner.within(&Bounds::new(f64::NEG_INFINITY, f64::INFINITY)));
    }
}
