//! 2D world coordinates

use serde::{Deserialize, Serialize};

/// A location on the simulation playfield, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another coordinate
    pub fn distance(&self, other: Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move `step` meters toward `target`, stopping exactly on it
    pub fn step_toward(&self, target: Coord, step: f64) -> Coord {
        let dist = self.distance(target);
        if dist <= step || dist == 0.0 {
            return target;
        }
        let frac = step / dist;
        Coord::new(
            self.x + (target.x - self.x) * frac,
            self.y + (target.y - self.y) * frac,
        )
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2},{:.2})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_toward_overshoot_clamps() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        let moved = a.step_toward(b, 5.0);
        assert_eq!(moved, b);
    }

    #[test]
    fn test_step_toward_partial() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(10.0, 0.0);
        let moved = a.step_toward(b, 4.0);
        assert!((moved.x - 4.0).abs() < 1e-12);
        assert_eq!(moved.y, 0.0);
    }
}
