use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// A point or displacement in the 2-D simulation domain.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Creates a new Vec2.
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Creates a zero vector.
    pub fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    /// Calculates the squared length (magnitude) of the vector.
    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Calculates the length (magnitude) of the vector.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector in the same direction.
    /// A zero-length vector yields the unit x axis instead of NaNs.
    pub fn normalize_or_unit(&self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > 0.0 {
            let inv_len = 1.0 / len_sq.sqrt();
            Vec2 { x: self.x * inv_len, y: self.y * inv_len }
        } else {
            Vec2::new(1.0, 0.0)
        }
    }

    /// Calculates the squared distance to another point.
    pub fn distance_squared(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Calculates the distance to another point.
    pub fn distance(&self, other: Vec2) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Midpoint of the segment joining two points.
    pub fn midpoint(&self, other: Vec2) -> Self {
        Vec2 { x: (self.x + other.x) * 0.5, y: (self.y + other.y) * 0.5 }
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(&self) -> Self {
        Vec2 { x: -self.y, y: self.x }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self { x: self.x / scalar, y: self.y / scalar }
    }
}

/// Euclidean distance between two points.
pub fn distance(p1: Vec2, p2: Vec2) -> f64 {
    p1.distance(p2)
}

/// Displacement vector pointing from `from` to `to`.
pub fn heading(from: Vec2, to: Vec2) -> Vec2 {
    to - from
}

/// Converts an angle (in radians) to a unit vector.
pub fn angle_to_vec(angle_rad: f64) -> Vec2 {
    Vec2::new(angle_rad.cos(), angle_rad.sin())
}

/// Clamps a value between a minimum and maximum.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Reflects a position that left `[0, size]²` back across the crossed edge.
/// A displacement larger than the domain still ends clamped inside it.
pub fn reflect_into_domain(pos: Vec2, size: f64) -> Vec2 {
    let reflect = |v: f64| {
        let v = if v < 0.0 {
            -v
        } else if v > size {
            2.0 * size - v
        } else {
            v
        };
        clamp(v, 0.0, size)
    };
    Vec2::new(reflect(pos.x), reflect(pos.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_reflect_off_the_domain_edges() {
        assert_eq!(reflect_into_domain(Vec2::new(-0.5, 20.25), 20.0), Vec2::new(0.5, 19.75));
        assert_eq!(reflect_into_domain(Vec2::new(3.0, 4.0), 20.0), Vec2::new(3.0, 4.0));
        assert_eq!(reflect_into_domain(Vec2::new(-50.0, 0.0), 20.0), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn heading_points_from_first_to_second() {
        let h = heading(Vec2::new(1.0, 1.0), Vec2::new(4.0, 5.0));
        assert_eq!(h, Vec2::new(3.0, 4.0));
        assert_eq!(h.length(), 5.0);
    }

    #[test]
    fn zero_vector_normalizes_to_unit_x() {
        assert_eq!(Vec2::zero().normalize_or_unit(), Vec2::new(1.0, 0.0));
    }
}
