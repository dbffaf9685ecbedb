//! Contact-avoiding movement for stem cells.
//!
//! The planner biases travel toward a target and steers around the arcs of
//! the cell's boundary that touching neighbours already occupy. It is a
//! heuristic deflection and does not guarantee that cells end up apart.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use rand::Rng;
use stemcell_common::{angle_to_vec, heading, Vec2};

use crate::arc::{ArcInterval, ArcUnion};
use crate::contact::{direction_angle, occupied_arc};

#[derive(Debug, Clone, Copy)]
pub struct MovementPlanner {
    pub radius: f64,
    /// Distance travelled per tick when the cell moves at all.
    pub step: f64,
}

impl MovementPlanner {
    pub fn new(radius: f64, step: f64) -> Self {
        Self { radius, step }
    }

    /// Union of the arcs occupied by every touching neighbour.
    pub fn blocked_arcs(&self, position: Vec2, neighbors: &[Vec2]) -> ArcUnion {
        ArcUnion::new(neighbors.iter().filter_map(|&other| occupied_arc(position, self.radius, other)))
    }

    /// Heading angle toward `target` with distance-scaled jitter, in `[0, 2π)`.
    pub fn jittered_heading<R: Rng + ?Sized>(&self, position: Vec2, target: Vec2, rng: &mut R) -> f64 {
        let mut toward = heading(position, target);
        let mut magnitude = toward.length();
        if magnitude == 0.0 {
            toward = Vec2::new(1.0, 0.0);
            magnitude = 1.0;
        }
        let base = direction_angle(toward.x, toward.y);
        // Closer cells wander more.
        let jitter = rng.random::<f64>() * PI / magnitude;
        (base + jitter).rem_euclid(TAU)
    }

    /// Next position of a cell at `position` whose touching neighbours sit at `neighbors`.
    pub fn plan<R: Rng + ?Sized>(&self, position: Vec2, neighbors: &[Vec2], target: Vec2, rng: &mut R) -> Vec2 {
        let mut angle = self.jittered_heading(position, target, rng);

        let blocked = if neighbors.is_empty() { ArcUnion::empty() } else { self.blocked_arcs(position, neighbors) };
        if !blocked.is_empty() {
            let endpoints = blocked.endpoints();
            let facing_forward = angle < FRAC_PI_2 || angle > 3.0 * FRAC_PI_2;
            let cone = ArcInterval::new(angle + FRAC_PI_2, angle - FRAC_PI_2, facing_forward);
            if endpoints.iter().any(|&theta| cone.contains(theta)) && blocked.contains(angle) {
                angle = nearest_angle(angle, &endpoints);
            }
        }

        let free_fraction = (TAU - blocked.measure()) / TAU;
        let displacement = angle_to_vec(angle) * (self.radius * free_fraction);
        let length = displacement.length();
        if length == 0.0 {
            return position;
        }
        position + displacement * (self.step / length)
    }
}

/// The candidate closest to `angle` by absolute difference; `angle` itself when there are none.
pub fn nearest_angle(angle: f64, candidates: &[f64]) -> f64 {
    let mut best = angle;
    let mut best_distance = f64::INFINITY;
    for &theta in candidates {
        let distance = (theta - angle).abs();
        if distance < best_distance {
            best_distance = distance;
            best = theta;
        }
    }
    best
}
