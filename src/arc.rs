//! Angular intervals on the circle and unions of them.
//!
//! Angles are radians in `[0, 2π)`. A *wrapped* interval stores the two
//! bounds of an arc that crosses the 0/2π seam: it covers everything at or
//! below `lower` and at or above `upper`.

use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcInterval {
    pub lower: f64,
    pub upper: f64,
    /// Boundary angles count as members.
    pub closed: bool,
    pub wrapped: bool,
}

impl ArcInterval {
    /// Closed interval between `a` and `b`, in either order.
    pub fn new(a: f64, b: f64, wrapped: bool) -> Self {
        Self { lower: a.min(b), upper: a.max(b), closed: true, wrapped }
    }

    /// Open interval between `a` and `b`; boundary angles are not members.
    pub fn open(a: f64, b: f64, wrapped: bool) -> Self {
        Self { closed: false, ..Self::new(a, b, wrapped) }
    }

    pub fn contains(&self, theta: f64) -> bool {
        if self.closed && (theta == self.lower || theta == self.upper) {
            return true;
        }
        if self.wrapped {
            theta < self.lower || theta > self.upper
        } else {
            theta > self.lower && theta < self.upper
        }
    }

    /// Angular length covered by the interval.
    pub fn measure(&self) -> f64 {
        if self.wrapped {
            TAU - (self.upper - self.lower)
        } else {
            self.upper - self.lower
        }
    }

    /// Splits a wrapped interval at the seam into `[0, lower]` and `[upper, 2π]`.
    fn unwrap_into(self, out: &mut Vec<ArcInterval>) {
        if self.wrapped {
            out.push(ArcInterval { lower: 0.0, upper: self.lower, closed: true, wrapped: false });
            out.push(ArcInterval { lower: self.upper, upper: TAU, closed: true, wrapped: false });
        } else {
            out.push(self);
        }
    }
}

/// A sorted set of pairwise disjoint, unwrapped intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArcUnion {
    intervals: Vec<ArcInterval>,
}

impl ArcUnion {
    /// Normalizes and merges `intervals` into a minimal disjoint cover.
    pub fn new<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = ArcInterval>,
    {
        let mut flat = Vec::new();
        for interval in intervals {
            interval.unwrap_into(&mut flat);
        }
        flat.sort_by(|a, b| a.lower.total_cmp(&b.lower));

        let mut merged: Vec<ArcInterval> = Vec::with_capacity(flat.len());
        for next in flat {
            match merged.last_mut() {
                // Only a strict overlap merges; touching endpoints stay separate.
                Some(current) if next.lower < current.upper => {
                    if next.upper > current.upper {
                        current.upper = next.upper;
                    }
                }
                _ => merged.push(next),
            }
        }
        Self { intervals: merged }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[ArcInterval] {
        &self.intervals
    }

    pub fn measure(&self) -> f64 {
        self.intervals.iter().map(ArcInterval::measure).sum()
    }

    pub fn contains(&self, theta: f64) -> bool {
        self.intervals.iter().any(|interval| interval.contains(theta))
    }

    /// Every interval bound, upper before lower for each member.
    pub fn endpoints(&self) -> Vec<f64> {
        self.intervals.iter().flat_map(|i| [i.upper, i.lower]).collect()
    }
}
