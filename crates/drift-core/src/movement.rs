//! Movement-model contract
//!
//! Mobility models are external collaborators as far as the engine is
//! concerned: they provide an initial position and successive paths. The
//! two models shipped here are the minimum needed to drive the engine,
//! stationary placement and classic random waypoint. All randomness comes
//! from the world's movement sub-generator so runs stay reproducible.

use rand::Rng;
use rand::rngs::StdRng;

use crate::coord::Coord;

/// Random-waypoint state: alternating wait and move-to-target legs
#[derive(Debug, Clone)]
enum Leg {
    /// No path chosen yet
    Idle,
    Waiting { until: f64 },
    Moving { target: Coord, speed: f64 },
}

/// Random-waypoint movement within a rectangular world
#[derive(Debug, Clone)]
pub struct RandomWaypoint {
    pub world_size: (f64, f64),
    /// Speed range in m/s, sampled uniformly per leg
    pub speed: (f64, f64),
    /// Wait-time range in seconds, sampled uniformly per pause
    pub wait: (f64, f64),
    leg: Leg,
}

impl RandomWaypoint {
    pub fn new(world_size: (f64, f64), speed: (f64, f64), wait: (f64, f64)) -> Self {
        Self {
            world_size,
            speed,
            wait,
            leg: Leg::Idle,
        }
    }

    fn random_coord(&self, rng: &mut StdRng) -> Coord {
        Coord::new(
            rng.random_range(0.0..self.world_size.0),
            rng.random_range(0.0..self.world_size.1),
        )
    }

    fn sample(range: (f64, f64), rng: &mut StdRng) -> f64 {
        if range.0 >= range.1 {
            range.0
        } else {
            rng.random_range(range.0..range.1)
        }
    }
}

/// A host's movement model
#[derive(Debug, Clone)]
pub enum Movement {
    /// Host never moves
    Stationary,
    RandomWaypoint(RandomWaypoint),
}

impl Movement {
    /// Draw an initial position, if the model chooses its own
    ///
    /// Stationary hosts are placed by configuration (`nodeLocation`), so
    /// they return `None` here.
    pub fn initial_location(&self, rng: &mut StdRng) -> Option<Coord> {
        match self {
            Movement::Stationary => None,
            Movement::RandomWaypoint(rwp) => Some(rwp.random_coord(rng)),
        }
    }

    /// Advance one tick of `dt` seconds from `loc`, returning the new
    /// position
    pub fn step(&mut self, loc: Coord, dt: f64, now: f64, rng: &mut StdRng) -> Coord {
        match self {
            Movement::Stationary => loc,
            Movement::RandomWaypoint(rwp) => {
                match rwp.leg {
                    Leg::Idle => {
                        let wait = RandomWaypoint::sample(rwp.wait, rng);
                        rwp.leg = Leg::Waiting { until: now + wait };
                        loc
                    }
                    Leg::Waiting { until } if now < until => loc,
                    Leg::Waiting { .. } => {
                        let target = rwp.random_coord(rng);
                        let speed = RandomWaypoint::sample(rwp.speed, rng);
                        rwp.leg = Leg::Moving { target, speed };
                        loc
                    }
                    Leg::Moving { target, speed } => {
                        let next = loc.step_toward(target, speed * dt);
                        if next == target {
                            rwp.leg = Leg::Idle;
                        }
                        next
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_stationary_never_moves() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut movement = Movement::Stationary;
        let loc = Coord::new(3.0, 4.0);
        assert_eq!(movement.step(loc, 1.0, 0.0, &mut rng), loc);
        assert!(movement.initial_location(&mut rng).is_none());
    }

    #[test]
    fn test_waypoint_stays_in_world() {
        let mut rng = StdRng::seed_from_u64(42);
        let rwp = RandomWaypoint::new((100.0, 100.0), (1.0, 2.0), (0.0, 0.0));
        let mut movement = Movement::RandomWaypoint(rwp.clone());
        let mut loc = movement.initial_location(&mut rng).unwrap();
        let mut now = 0.0;
        for _ in 0..500 {
            loc = movement.step(loc, 1.0, now, &mut rng);
            now += 1.0;
            assert!((0.0..=100.0).contains(&loc.x));
            assert!((0.0..=100.0).contains(&loc.y));
        }
    }

    #[test]
    fn test_waypoint_eventually_moves() {
        let mut rng = StdRng::seed_from_u64(7);
        let rwp = RandomWaypoint::new((1000.0, 1000.0), (5.0, 5.0), (0.0, 0.0));
        let mut movement = Movement::RandomWaypoint(rwp);
        let start = Coord::new(500.0, 500.0);
        let mut loc = start;
        let mut now = 0.0;
        for _ in 0..100 {
            loc = movement.step(loc, 1.0, now, &mut rng);
            now += 1.0;
        }
        assert!(start.distance(loc) > 0.0);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let walk = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let rwp = RandomWaypoint::new((200.0, 200.0), (1.0, 3.0), (0.0, 5.0));
            let mut movement = Movement::RandomWaypoint(rwp);
            let mut loc = movement.initial_location(&mut rng).unwrap();
            let mut now = 0.0;
            let mut trace = Vec::new();
            for _ in 0..50 {
                loc = movement.step(loc, 1.0, now, &mut rng);
                now += 1.0;
                trace.push((loc.x, loc.y));
            }
            trace
        };
        assert_eq!(walk(9), walk(9));
    }
}
