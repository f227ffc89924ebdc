//! Fixed-point math and tile-grid geometry for deterministic simulation.
//!
//! All fractional quantities (spice, credits, damage, distances) use
//! fixed-point arithmetic so every client computes bit-identical results.
//! Tile positions are plain integer coordinates.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_bits()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Apply a percentage modifier (`value * percent / 100`).
///
/// Every modifier chain in the core goes through this helper so the
/// truncation step is the same everywhere.
#[must_use]
pub fn apply_percent(value: Fixed, percent: u32) -> Fixed {
    value * Fixed::from_num(percent) / Fixed::from_num(100)
}

/// Integer tile coordinate on the game map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row (grows southwards).
    pub y: i32,
}

/// Cost multiplier for one diagonal step: sqrt(2) - 1 added to the straight step.
const DIAGONAL_EXTRA_BITS: i64 = 1_779_033_704; // (sqrt(2) - 1) * 2^32

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid block distance: straight steps cost 1, diagonal steps cost sqrt(2).
    #[must_use]
    pub fn block_distance(self, other: Self) -> Fixed {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };

        Fixed::from_num(long) + Fixed::from_num(short) * Fixed::from_bits(DIAGONAL_EXTRA_BITS)
    }

    /// Chebyshev distance (number of 8-connected steps).
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Straight-line distance.
    #[must_use]
    pub fn euclidean_distance(self, other: Self) -> Fixed {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        fixed_sqrt(Fixed::from_num(dx * dx + dy * dy))
    }

    /// One 8-connected step from `self` towards `target`.
    #[must_use]
    pub fn step_towards(self, target: Self) -> Self {
        Self {
            x: self.x + (target.x - self.x).signum(),
            y: self.y + (target.y - self.y).signum(),
        }
    }
}

/// One of the eight directions a unit or turret can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Towards negative y.
    #[default]
    North,
    /// Diagonal north-east.
    NorthEast,
    /// Towards positive x.
    East,
    /// Diagonal south-east.
    SouthEast,
    /// Towards positive y.
    South,
    /// Diagonal south-west.
    SouthWest,
    /// Towards negative x.
    West,
    /// Diagonal north-west.
    NorthWest,
}

impl Facing {
    const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Direction of the vector `from -> to`, bucketed into 45° sectors.
    ///
    /// Returns `None` when both points coincide.
    #[must_use]
    pub fn between(from: Coord, to: Coord) -> Option<Self> {
        let dx = i64::from(to.x - from.x);
        let dy = i64::from(to.y - from.y);
        if dx == 0 && dy == 0 {
            return None;
        }

        // tan(22.5°) ~= 0.4142
        let ax = dx.abs();
        let ay = dy.abs();
        let horizontal = ay * 10_000 <= ax * 4_142;
        let vertical = ax * 10_000 <= ay * 4_142;

        let facing = if horizontal {
            if dx > 0 {
                Self::East
            } else {
                Self::West
            }
        } else if vertical {
            if dy > 0 {
                Self::South
            } else {
                Self::North
            }
        } else {
            match (dx > 0, dy > 0) {
                (true, true) => Self::SouthEast,
                (true, false) => Self::NorthEast,
                (false, true) => Self::SouthWest,
                (false, false) => Self::NorthWest,
            }
        };

        Some(facing)
    }

    /// Rotate one 45° step towards `goal` along the shorter arc.
    #[must_use]
    pub fn rotate_towards(self, goal: Self) -> Self {
        if self == goal {
            return self;
        }
        let clockwise = (goal.index() + 8 - self.index()) % 8;
        let next = if clockwise <= 4 {
            (self.index() + 1) % 8
        } else {
            (self.index() + 7) % 8
        };
        Self::ALL[next]
    }
}
