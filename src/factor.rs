//! Signaling factors drifting toward the colony.
//!
//! Factor A is intermittently mobile and is switched off while it touches a
//! free factor B. Factor B drifts until it touches a stem cell and is then
//! absorbed in place.

use rand::Rng;
use stemcell_common::{heading, reflect_into_domain, SimParams, Vec2};

use crate::grid::SpatialIndex;
use crate::population::{Agent, AgentKind, Behavior};

/// Read-only view of the agents as they stood at the start of the stage.
pub struct Neighborhood<'a> {
    agents: &'a [Agent],
    index: &'a SpatialIndex,
    max_radius: f64,
}

impl<'a> Neighborhood<'a> {
    pub fn new(agents: &'a [Agent], index: &'a SpatialIndex, max_radius: f64) -> Self {
        Self { agents, index, max_radius }
    }

    /// True when a disc at `point` touches any other agent matching `pred`.
    pub fn touches<P>(&self, slot: usize, point: Vec2, radius: f64, pred: P) -> bool
    where
        P: Fn(&Agent) -> bool,
    {
        let mut found = false;
        self.index.for_each_within(point, radius + self.max_radius, |other| {
            if other == slot {
                return true;
            }
            let agent = &self.agents[other];
            let reach = radius + agent.radius;
            if agent.position.distance_squared(point) <= reach * reach && pred(agent) {
                found = true;
                return false;
            }
            true
        });
        found
    }
}

fn is_stem_cell(agent: &Agent) -> bool {
    agent.kind() == AgentKind::StemCell
}

fn is_free_factor_b(agent: &Agent) -> bool {
    matches!(&agent.behavior, Behavior::FactorB(b) if !b.absorbed)
}

fn uniform_between<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    a + (b - a) * rng.random::<f64>()
}

/// Heading toward `target` with one axis kept and the other drawn from a
/// quadrant-dependent range. Not normalized.
pub fn jittered_drift<R: Rng + ?Sized>(position: Vec2, target: Vec2, rng: &mut R) -> Vec2 {
    let h = heading(position, target);
    if h.x == 0.0 && h.y == 0.0 {
        return Vec2::new(1.0, 1.0);
    }
    let (x_range, y_range) = match (h.x >= 0.0, h.y >= 0.0) {
        (true, true) => ((-h.y, h.x), (-h.x, h.y)),
        (false, false) => ((h.x, -h.y), (h.y, -h.x)),
        (false, true) => ((h.x, h.y), (h.x, h.y)),
        (true, false) => ((h.y, h.x), (h.y, h.x)),
    };
    if rng.random_bool(0.5) {
        Vec2::new(h.x, uniform_between(rng, y_range.0, y_range.1))
    } else {
        Vec2::new(uniform_between(rng, x_range.0, x_range.1), h.y)
    }
}

fn drift_step<R: Rng + ?Sized>(position: Vec2, params: &SimParams, step: f64, rng: &mut R) -> Vec2 {
    let center = Vec2::new(params.center.0, params.center.1);
    jittered_drift(position, center, rng).normalize_or_unit() * step
}

/// One tick of a factor A agent: movement or immobilization countdown, then
/// activity regulation by nearby free factor B.
pub fn update_factor_a<R: Rng + ?Sized>(
    agent: &mut Agent,
    slot: usize,
    hood: &Neighborhood,
    params: &SimParams,
    rng: &mut R,
) {
    let Agent { position, radius, behavior, .. } = agent;
    let Behavior::FactorA(state) = behavior else {
        return;
    };

    if !state.immobilized {
        let drift = drift_step(*position, params, params.factor_a_step, rng);
        let mut next = reflect_into_domain(*position + drift, params.domain_size);
        if hood.touches(slot, next, *radius, is_stem_cell) {
            // bounce
            next = reflect_into_domain(next - drift * 0.5, params.domain_size);
        }
        *position = next;

        if rng.random_range(0..100) < params.immobilize_percent {
            state.immobilized = true;
            state.immobilized_timer = rng.random_range(0..=params.max_immobilize_ticks);
        }
    } else {
        state.immobilized_timer = state.immobilized_timer.saturating_sub(1);
        if state.immobilized_timer == 0 {
            state.immobilized = false;
        }
    }

    if state.inactive_timer == 0 {
        if hood.touches(slot, *position, *radius, is_free_factor_b) {
            state.active = false;
            state.inactive_timer = rng.random_range(0..=params.max_inactive_ticks);
        } else {
            state.active = true;
        }
    } else {
        state.inactive_timer -= 1;
        if state.inactive_timer == 0 {
            state.active = true;
        }
    }
}

/// One tick of a factor B agent. Returns true when it was absorbed this tick.
pub fn update_factor_b<R: Rng + ?Sized>(
    agent: &mut Agent,
    slot: usize,
    hood: &Neighborhood,
    params: &SimParams,
    rng: &mut R,
) -> bool {
    let Agent { position, radius, behavior, .. } = agent;
    let Behavior::FactorB(state) = behavior else {
        return false;
    };
    if state.absorbed {
        return false;
    }

    let drift = drift_step(*position, params, params.factor_b_step, rng);
    *position = reflect_into_domain(*position + drift, params.domain_size);
    if hood.touches(slot, *position, *radius, is_stem_cell) {
        state.absorbed = true;
    }
    state.absorbed
}
