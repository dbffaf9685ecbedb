//! Circle–circle contact geometry on an agent's own boundary.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use stemcell_common::Vec2;

use crate::arc::ArcInterval;

/// Where a neighbour's circle crosses ours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Too far apart, or centres coincide: the neighbour imposes no constraint.
    Clear,
    /// Boundary crossing points. They are equal when the circles just touch.
    Crossing {
        first: Vec2,
        second: Vec2,
        /// The occupied arc crosses the 0/2π seam, i.e. the neighbour lies
        /// ahead along +x and our centre height falls strictly between the
        /// two crossing points.
        forward: bool,
    },
}

/// Intersection of two congruent circles of `radius` centred at `center` and `other`.
pub fn intersection_points(center: Vec2, radius: f64, other: Vec2) -> Contact {
    let offset = other - center;
    let dist = offset.length();
    if dist > 2.0 * radius || dist == 0.0 {
        return Contact::Clear;
    }

    // Half-chord length; clamp guards the tangent case against rounding below zero.
    let half_chord = (radius * radius - (dist / 2.0).powi(2)).max(0.0).sqrt();
    let mid = center.midpoint(other);
    let normal = (offset / dist).perp();
    let first = mid - normal * half_chord;
    let second = mid + normal * half_chord;

    let (low_y, high_y) = if first.y <= second.y { (first.y, second.y) } else { (second.y, first.y) };
    let forward = offset.x > 0.0 && center.y > low_y && center.y < high_y;

    Contact::Crossing { first, second, forward }
}

/// Direction angle in `[0, 2π)` of the displacement `(dx, dy)`.
///
/// Axis-aligned displacements map exactly onto the cardinal angles; all others
/// use the reference angle `atan(|dy/dx|)` corrected by quadrant. A zero
/// displacement maps to 0.
pub fn direction_angle(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 {
        return if dy > 0.0 {
            FRAC_PI_2
        } else if dy < 0.0 {
            3.0 * FRAC_PI_2
        } else {
            0.0
        };
    }
    if dy == 0.0 {
        return if dx > 0.0 { 0.0 } else { PI };
    }

    let theta = (dy / dx).abs().atan();
    match (dx > 0.0, dy > 0.0) {
        (true, true) => theta,
        (false, true) => PI - theta,
        (false, false) => theta + PI,
        (true, false) => TAU - theta,
    }
}

/// Angle of a point on (or near) the agent's boundary, relative to its centre.
pub fn to_polar(center: Vec2, point: Vec2) -> f64 {
    direction_angle(point.x - center.x, point.y - center.y)
}

/// The arc of our own circumference occupied by a touching neighbour, if any.
pub fn occupied_arc(center: Vec2, radius: f64, other: Vec2) -> Option<ArcInterval> {
    match intersection_points(center, radius, other) {
        Contact::Clear => None,
        Contact::Crossing { first, second, forward } => {
            Some(ArcInterval::new(to_polar(center, first), to_polar(center, second), forward))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stemcell_common::angle_to_vec;

    const EPS: f64 = 1e-9;

    #[test]
    fn distant_circles_do_not_constrain() {
        let c = intersection_points(Vec2::new(0.0, 0.0), 0.5, Vec2::new(1.5, 0.0));
        assert_eq!(c, Contact::Clear);
    }

    #[test]
    fn coincident_centres_do_not_divide_by_zero() {
        let c = intersection_points(Vec2::new(3.0, 3.0), 0.5, Vec2::new(3.0, 3.0));
        assert_eq!(c, Contact::Clear);
        assert!(occupied_arc(Vec2::new(3.0, 3.0), 0.5, Vec2::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn tangent_circles_meet_at_one_point_on_the_centre_line() {
        let center = Vec2::new(1.0, 2.0);
        let other = Vec2::new(2.0, 3.0);
        let radius = center.distance(other) / 2.0;
        match intersection_points(center, radius, other) {
            Contact::Crossing { first, second, .. } => {
                let mid = center.midpoint(other);
                assert!(first.distance(mid) < 1e-7);
                assert!(second.distance(mid) < 1e-7);
            }
            Contact::Clear => panic!("tangent circles must touch"),
        }
    }

    #[test]
    fn equal_heights_are_handled() {
        let center = Vec2::new(5.0, 5.0);
        match intersection_points(center, 0.5, Vec2::new(5.6, 5.0)) {
            Contact::Crossing { first, second, forward } => {
                assert!((first.x - 5.3).abs() < EPS && (second.x - 5.3).abs() < EPS);
                assert!((first.distance(center) - 0.5).abs() < EPS);
                assert!((second.distance(center) - 0.5).abs() < EPS);
                assert!(forward);
            }
            Contact::Clear => panic!("overlapping circles must cross"),
        }
    }

    #[test]
    fn arc_toward_right_neighbour_wraps_the_seam() {
        let center = Vec2::new(5.0, 5.0);
        let arc = occupied_arc(center, 0.5, Vec2::new(5.6, 5.0)).unwrap();
        assert!(arc.wrapped);
        assert!(arc.contains(0.0));
        assert!(!arc.contains(PI));
        // cos(θ) = 0.3 / 0.5 at the crossing points
        let half_angle = (0.6f64).acos();
        assert!((arc.measure() - 2.0 * half_angle).abs() < EPS);
    }

    #[test]
    fn arc_toward_left_neighbour_does_not_wrap() {
        let center = Vec2::new(5.0, 5.0);
        let arc = occupied_arc(center, 0.5, Vec2::new(4.4, 5.0)).unwrap();
        assert!(!arc.wrapped);
        assert!(arc.contains(PI));
        assert!(!arc.contains(0.0));
    }

    #[test]
    fn cardinal_points_map_exactly() {
        let c = Vec2::new(2.0, 2.0);
        assert_eq!(to_polar(c, Vec2::new(2.5, 2.0)), 0.0);
        assert_eq!(to_polar(c, Vec2::new(2.0, 2.5)), FRAC_PI_2);
        assert_eq!(to_polar(c, Vec2::new(1.5, 2.0)), PI);
        assert_eq!(to_polar(c, Vec2::new(2.0, 1.5)), 3.0 * FRAC_PI_2);
    }

    #[test]
    fn quadrant_corrections() {
        let c = Vec2::zero();
        let third = PI / 3.0;
        for expected in [third, PI - third, PI + third, TAU - third] {
            let p = angle_to_vec(expected) * 0.5;
            assert!((to_polar(c, p) - expected).abs() < EPS, "angle {}", expected);
        }
    }

    proptest! {
        #[test]
        fn boundary_point_round_trips(theta in 0.0..TAU, cx in -10.0..10.0f64, cy in -10.0..10.0f64) {
            let center = Vec2::new(cx, cy);
            let point = center + angle_to_vec(theta) * 0.5;
            let back = to_polar(center, point);
            // Angles just below 2π may come back as values near 0.
            let diff = (back - theta).abs();
            prop_assert!(diff < 1e-6 || (TAU - diff) < 1e-6);
        }
    }
}
