//! 2D Vector
//!
//! Arena-space vector used for unit, base and structure positions.

use std::fmt;
use serde::{Serialize, Deserialize};

/// 2D vector in arena units.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component (0 = left edge of the arena)
    pub x: f64,
    /// Y component (0 = top edge of the arena)
    pub y: f64,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (prefer this for comparisons).
    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Check whether `other` lies within `radius` (inclusive).
    #[inline]
    pub fn within(self, other: Self, radius: f64) -> bool {
        self.distance_squared(other) <= radius * radius
    }

    /// Absolute horizontal offset to another point.
    #[inline]
    pub fn horizontal_gap(self, other: Self) -> f64 {
        (self.x - other.x).abs()
    }

    /// Absolute vertical offset to another point.
    #[inline]
    pub fn vertical_gap(self, other: Self) -> f64 {
        (self.y - other.y).abs()
    }

    /// Move `step` units along the x axis toward `target_x`, never overshooting.
    #[inline]
    pub fn step_toward_x(self, target_x: f64, step: f64) -> Self {
        let dx = target_x - self.x;
        let x = if dx.abs() <= step {
            target_x
        } else {
            self.x + step * dx.signum()
        };
        Self { x, y: self.y }
    }

    /// Clamp the x component into `[min, max]`.
    #[inline]
    pub fn clamp_x(self, min: f64, max: f64) -> Self {
        Self { x: self.x.clamp(min, max), y: self.y }
    }

    /// Check that both components are finite numbers.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.2}, {:.2})", self.x, self.y)
    }
}
