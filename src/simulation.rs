use std::f64::consts::TAU;

use anyhow::{Context, Result};
use log::{debug, info, trace};
use rand::prelude::*;
use rayon::prelude::*;
use stemcell_common::{
    angle_to_vec, reflect_into_domain, Label, LabelCounts, SignalSource, SimParams, SimulationConfig, Snapshot, Vec2,
};

use crate::differentiation::DifferentiationEngine;
use crate::factor::{update_factor_a, update_factor_b, Neighborhood};
use crate::field::DiffusionField;
use crate::grid::{ContactGraph, SpatialIndex};
use crate::planner::MovementPlanner;
use crate::population::{Agent, AgentId, AgentKind, Behavior, FactorA, FactorB, Population, PopulationSummary, StemCell};

/// Run-wide bookkeeping. Only the controller writes to it, between stages.
#[derive(Debug, Clone, Default)]
pub struct SimulationContext {
    /// Number of completed ticks.
    pub tick: u32,
    pub running: bool,
    pub cascade_enabled: bool,
    /// Tick on which the first differentiation happened.
    pub cascade_started_tick: Option<u32>,
    /// Stem cell chosen at setup whose label is reported in snapshots.
    pub tracked_id: Option<AgentId>,
    /// Exposure counter of the stem cell sampled on the last tick.
    pub sampled_exposure: u32,
}

/// Tick-driven controller owning the population and the concentration field.
pub struct Simulation {
    config: SimulationConfig,
    params: SimParams,
    population: Population,
    field: DiffusionField,
    engine: DifferentiationEngine,
    planner: MovementPlanner,
    graph: ContactGraph,
    context: SimulationContext,
    rng: StdRng,
    summary: Option<PopulationSummary>,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Creates a simulation with agents scattered around the domain centre.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.universe.seed);
        let params = config.get_sim_params();
        let population = place_initial_agents(&config, &params, &mut rng)?;
        Self::assemble(config, params, population, rng)
    }

    /// Creates a simulation around an already placed population.
    pub fn with_population(config: SimulationConfig, population: Population) -> Result<Self> {
        let rng = StdRng::seed_from_u64(config.universe.seed);
        let params = config.get_sim_params();
        Self::assemble(config, params, population, rng)
    }

    fn assemble(config: SimulationConfig, params: SimParams, population: Population, mut rng: StdRng) -> Result<Self> {
        let field = DiffusionField::from_params(&params, &config.field.initial, config.field.reaction)
            .context("Failed to build the concentration field")?;
        let engine = DifferentiationEngine::from_config(&config.differentiation);
        let planner = MovementPlanner::new(params.stem_radius, params.stem_step);

        let stems = population.stem_indices();
        let tracked_id = if stems.is_empty() {
            None
        } else {
            Some(population.agents()[stems[rng.random_range(0..stems.len())]].id)
        };

        info!(
            "Initialized {} stem cells, {} factor A, {} factor B on a {:.1} x {:.1} domain.",
            population.count(AgentKind::StemCell),
            population.count(AgentKind::FactorA),
            population.count(AgentKind::FactorB),
            params.domain_size,
            params.domain_size,
        );
        info!(
            "Concentration field: {}x{} grid, h = {:.4}, dt = {:.5}. Differentiation {} (signal: {:?}).",
            field.resolution(),
            field.resolution(),
            field.spacing(),
            field.dt(),
            if engine.is_enabled() { "enabled" } else { "disabled" },
            engine.source(),
        );

        Ok(Self {
            config,
            params,
            graph: ContactGraph::default(),
            population,
            field,
            engine,
            planner,
            context: SimulationContext { running: true, tracked_id, ..SimulationContext::default() },
            rng,
            summary: None,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the simulation by one tick. Does nothing once stopped.
    pub fn step(&mut self) -> Result<()> {
        if !self.context.running {
            return Ok(());
        }
        self.context.tick += 1;
        // Conversions triggered this tick only cascade from the next one.
        let cascade_active = self.context.cascade_enabled;

        // --- 1. Population summary ---
        self.summary = self.population.summary();

        // --- 2. Spatial index and contact graph (Parallel) ---
        let index = SpatialIndex::build(self.population.positions(), &self.params);
        self.graph = ContactGraph::build(&self.population, &index, self.max_radius());
        trace!("Tick {}: {} touching pairs.", self.context.tick, self.graph.edge_count());

        // --- 3. Field ---
        self.field.step();

        // --- 4. Agents ---
        // A failed update leaves the tick half applied, so the run stops here.
        if let Err(e) = self.update_agents(&index) {
            self.context.running = false;
            return Err(e);
        }

        // --- 5. Cascade ---
        if cascade_active {
            let converted = self.engine.cascade(&mut self.population, &self.graph);
            if converted > 0 {
                debug!("Tick {}: cascade converted {} stem cells.", self.context.tick, converted);
            }
        }

        // --- 6. Spawning ---
        self.handle_spawns();

        // --- 7. Termination ---
        self.check_termination();
        Ok(())
    }

    fn max_radius(&self) -> f64 {
        self.params.max_contact / 2.0
    }

    /// Plans stem cell moves in parallel against the tick snapshot, then
    /// applies every agent's update sequentially in slot order.
    fn update_agents(&mut self, index: &SpatialIndex) -> Result<()> {
        let tick = self.context.tick;
        let seed = self.config.universe.seed;
        let domain_size = self.params.domain_size;
        let max_radius = self.max_radius();
        let target = match self.summary {
            Some(summary) => summary.centroid,
            None => Vec2::new(self.params.center.0, self.params.center.1),
        };

        let snapshot: Vec<Agent> = self.population.agents().to_vec();
        let planner = self.planner;
        let graph = &self.graph;
        let population = &self.population;

        // Only virgin stem cells move; arcs are built against stem neighbours.
        let moves: Vec<Option<Vec2>> = snapshot
            .par_iter()
            .enumerate()
            .map(|(idx, agent)| {
                if !agent.label().is_some_and(|label| label.is_virgin()) {
                    return None;
                }
                let neighbors: Vec<Vec2> = graph
                    .neighbors_of_kind(population, idx, AgentKind::StemCell)
                    .map(|other| snapshot[other].position)
                    .collect();
                let agent_seed = seed
                    .wrapping_add(agent.id.wrapping_mul(0x1F3A))
                    .wrapping_add((tick as u64).wrapping_mul(0x58C7));
                let mut rng = StdRng::seed_from_u64(agent_seed);
                let next = planner.plan(agent.position, &neighbors, target, &mut rng);
                Some(reflect_into_domain(next, domain_size))
            })
            .collect();

        let Self { population, field, engine, graph, rng, params, context, .. } = self;
        let hood = Neighborhood::new(&snapshot, index, max_radius);
        let source = engine.source();
        let mut differentiated = 0;
        let mut absorbed = 0;

        for (idx, agent) in population.agents_mut().iter_mut().enumerate() {
            match agent.kind() {
                AgentKind::StemCell => {
                    if let Some(next) = moves[idx] {
                        agent.position = next;
                    }
                    let position = agent.position;
                    let id = agent.id;
                    let exposure = graph
                        .neighbors(idx)
                        .iter()
                        .filter(|&&other| matches!(&snapshot[other].behavior, Behavior::FactorA(a) if a.active))
                        .count() as u32;
                    let Some(cell) = agent.stem_mut() else { continue };
                    cell.energy += rng.random_range(0..=params.max_energy_gain);
                    cell.exposure += exposure;

                    let fired = engine
                        .tick_timer(cell, |cell| match source {
                            SignalSource::Field => field.sample(position),
                            SignalSource::Exposure => Ok(cell.exposure as f64),
                        })
                        .with_context(|| format!("Tick {}: stem cell {} failed to read its signal", tick, id))?;

                    if let Some(label) = fired {
                        differentiated += 1;
                        trace!("Tick {}: stem cell {} differentiated to {}.", tick, id, label);
                        if !context.cascade_enabled {
                            context.cascade_enabled = true;
                            context.cascade_started_tick = Some(tick);
                            info!("First differentiation at tick {} (cell {} -> {}); cascade enabled.", tick, id, label);
                        }
                    }
                }
                AgentKind::FactorA => update_factor_a(agent, idx, &hood, params, rng),
                AgentKind::FactorB => {
                    if update_factor_b(agent, idx, &hood, params, rng) {
                        absorbed += 1;
                    }
                }
            }
        }

        let stems = population.stem_indices();
        context.sampled_exposure = if stems.is_empty() {
            0
        } else {
            let idx = stems[rng.random_range(0..stems.len())];
            population.agents()[idx].stem().map_or(0, |cell| cell.exposure)
        };

        if differentiated > 0 || absorbed > 0 {
            debug!("Tick {}: {} stem cells differentiated, {} factor B absorbed.", tick, differentiated, absorbed);
        }
        Ok(())
    }

    /// Every stem cell at or above the spawn threshold buds one virgin child
    /// at its own position and keeps half of its energy.
    fn handle_spawns(&mut self) {
        let threshold = self.params.spawn_threshold;
        let parents: Vec<usize> = self
            .population
            .agents()
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.stem().is_some_and(|cell| cell.energy >= threshold))
            .map(|(idx, _)| idx)
            .collect();
        if parents.is_empty() {
            return;
        }

        for &parent in &parents {
            let timer = self.rng.random_range(self.params.diff_timer_min..=self.params.diff_timer_max);
            let Some(agent) = self.population.get_mut(parent) else { continue };
            let Some(cell) = agent.stem_mut() else { continue };
            cell.energy /= 2;
            let (position, radius, parent_id) = (agent.position, agent.radius, agent.id);

            let child = self.population.add_agent(position, radius, Behavior::Stem(StemCell::new(timer)));
            self.graph.register(self.population.len() - 1);
            trace!("Stem cell {} spawned {}.", parent_id, child);
        }
        debug!(
            "Tick {}: {} stem cells spawned, population now {}.",
            self.context.tick,
            parents.len(),
            self.population.len()
        );
    }

    fn check_termination(&mut self) {
        let tick = self.context.tick;
        if let Some(started) = self.context.cascade_started_tick {
            if tick >= started + self.config.timing.ticks_after_cascade {
                info!("Stopping at tick {}: {} ticks after the cascade started.", tick, tick - started);
                self.context.running = false;
                return;
            }
        }
        if tick >= self.config.timing.max_ticks {
            info!("Stopping at tick {}: reached max_ticks.", tick);
            self.context.running = false;
        }
    }

    /// Summarizes the current state without recording it.
    pub fn snapshot(&self) -> Snapshot {
        let mut stem_cells = LabelCounts::default();
        let (mut factor_a_total, mut factor_a_active, mut factor_a_immobilized) = (0, 0, 0);
        let (mut factor_b_total, mut factor_b_absorbed) = (0, 0);
        for agent in self.population.agents() {
            match &agent.behavior {
                Behavior::Stem(cell) => stem_cells.record(cell.label),
                Behavior::FactorA(a) => {
                    factor_a_total += 1;
                    factor_a_active += a.active as u32;
                    factor_a_immobilized += a.immobilized as u32;
                }
                Behavior::FactorB(b) => {
                    factor_b_total += 1;
                    factor_b_absorbed += b.absorbed as u32;
                }
            }
        }
        let summary = self.population.summary();

        Snapshot {
            tick: self.context.tick,
            stem_cells,
            factor_a_total,
            factor_a_active,
            factor_a_immobilized,
            factor_b_total,
            factor_b_absorbed,
            centroid: summary.map(|s| (s.centroid.x, s.centroid.y)),
            mean_radius: summary.map(|s| s.mean_radius),
            contact_edges: self.graph.edge_count() as u32,
            cascade_enabled: self.context.cascade_enabled,
            tracked_label: self.tracked_label(),
            sampled_exposure: self.context.sampled_exposure,
            interior_mass: self.field.interior_mass(),
        }
    }

    /// Records a snapshot of the current tick.
    pub fn record_snapshot(&mut self) -> &Snapshot {
        let snapshot = self.snapshot();
        debug!(
            "Recording snapshot at tick {}: {} virgin / {} differentiated stem cells.",
            snapshot.tick,
            snapshot.stem_cells.virgin,
            snapshot.stem_cells.differentiated()
        );
        self.recorded_snapshots.push(snapshot);
        &self.recorded_snapshots[self.recorded_snapshots.len() - 1]
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    pub fn tracked_label(&self) -> Option<Label> {
        let id = self.context.tracked_id?;
        let idx = self.population.index_of(id)?;
        self.population.agents()[idx].label()
    }

    /// Differentiates a virgin stem cell by hand, e.g. to seed a cascade.
    /// Differentiation is terminal: a target that is no longer virgin, or a
    /// virgin `label`, is rejected.
    pub fn force_label(&mut self, id: AgentId, label: Label) -> Result<()> {
        if label.is_virgin() {
            anyhow::bail!("Cannot force stem cell {} to virgin.", id);
        }
        let cell = self
            .population
            .index_of(id)
            .and_then(|idx| self.population.get_mut(idx))
            .and_then(|agent| agent.stem_mut())
            .ok_or_else(|| anyhow::anyhow!("Agent {} is not a stem cell.", id))?;
        if !cell.label.is_virgin() {
            anyhow::bail!("Stem cell {} is already differentiated ({}).", id, cell.label);
        }
        cell.label = label;
        Ok(())
    }

    /// Enables the cascade from the next tick on, as the first
    /// differentiation would.
    pub fn enable_cascade(&mut self) {
        if !self.context.cascade_enabled {
            self.context.cascade_enabled = true;
            self.context.cascade_started_tick = Some(self.context.tick);
        }
    }

    pub fn is_running(&self) -> bool {
        self.context.running
    }

    pub fn tick(&self) -> u32 {
        self.context.tick
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn field(&self) -> &DiffusionField {
        &self.field
    }

    pub fn contact_graph(&self) -> &ContactGraph {
        &self.graph
    }

    /// Stem cell summary taken at the start of the last tick.
    pub fn summary(&self) -> Option<PopulationSummary> {
        self.summary
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

/// Scatters every agent at `center + r (cos θ, sin θ)` with `r` uniform in
/// `[0, placement_radius)` and `θ` uniform in `[0, 2π)`.
fn place_initial_agents(config: &SimulationConfig, params: &SimParams, rng: &mut StdRng) -> Result<Population> {
    let spread = config.population.placement_radius;
    if !(spread >= 0.0) {
        anyhow::bail!("population.placement_radius must not be negative.");
    }
    let center = Vec2::new(params.center.0, params.center.1);
    let scatter = |rng: &mut StdRng| {
        let r = rng.random::<f64>() * spread;
        let theta = rng.random::<f64>() * TAU;
        reflect_into_domain(center + angle_to_vec(theta) * r, params.domain_size)
    };

    let mut population = Population::new();
    for _ in 0..config.population.num_stem_cells {
        let position = scatter(rng);
        let timer = rng.random_range(params.diff_timer_min..=params.diff_timer_max);
        population.add_agent(position, params.stem_radius, Behavior::Stem(StemCell::new(timer)));
    }
    for _ in 0..config.population.num_factor_a {
        let position = scatter(rng);
        population.add_agent(position, params.factor_a_radius, Behavior::FactorA(FactorA::new()));
    }
    for _ in 0..config.population.num_factor_b {
        let position = scatter(rng);
        population.add_agent(position, params.factor_b_radius, Behavior::FactorB(FactorB::default()));
    }
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> SimulationConfig {
        let text = format!(
            r#"
            [universe]
            size = 20.0
            seed = 42
            [timing]
            max_ticks = 40
            [population]
            num_stem_cells = 12
            num_factor_a = 6
            num_factor_b = 4
            [stem_cell]
            spawn_threshold = 8
            diff_timer = 10
            diff_timer_jitter = 4
            [differentiation]
            endo_min = 0.5
            ecto_max = 0.1
            [field]
            resolution = 21
            [output]
            base_filename = "test"
            {}
            "#,
            extra
        );
        SimulationConfig::from_toml_str(&text).unwrap()
    }

    #[test]
    fn setup_places_agents_near_the_centre() {
        let sim = Simulation::new(config("")).unwrap();
        assert_eq!(sim.population().len(), 22);
        for agent in sim.population().agents() {
            assert!(agent.position.distance(Vec2::new(10.0, 10.0)) < 1.0);
        }
        let timers: Vec<u32> = sim.population().agents().iter().filter_map(|a| a.stem()).map(|c| c.diff_timer).collect();
        assert!(timers.iter().all(|&t| (6..=10).contains(&t)));
        assert!(sim.context().tracked_id.is_some());
        assert!(sim.is_running());
    }

    #[test]
    fn spawned_children_start_virgin_with_halved_parent_energy() {
        let mut sim = Simulation::new(config("")).unwrap();
        let before = sim.population().count(AgentKind::StemCell);
        for _ in 0..10 {
            sim.step().unwrap();
        }
        let after = sim.population().count(AgentKind::StemCell);
        // The start-of-tick summary predates this tick's spawns.
        assert!(sim.summary().unwrap().count <= after);
        assert!(after > before, "no spawns in 10 ticks");
        assert_eq!(sim.contact_graph().len(), sim.population().len());
        for agent in sim.population().agents() {
            if let Some(cell) = agent.stem() {
                assert!(cell.energy < sim.params().spawn_threshold);
            }
        }
        // Ids keep increasing in slot order.
        let ids: Vec<AgentId> = sim.population().agents().iter().map(|a| a.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn run_stops_a_fixed_number_of_ticks_after_the_cascade() {
        let mut sim = Simulation::new(config("")).unwrap();
        while sim.is_running() {
            sim.step().unwrap();
        }
        let started = sim.context().cascade_started_tick.expect("no differentiation happened");
        assert_eq!(sim.tick(), started + sim.config().timing.ticks_after_cascade);
        // Steps after stopping are no-ops.
        sim.step().unwrap();
        assert_eq!(sim.tick(), started + 3);
    }

    #[test]
    fn differentiated_cells_stay_put() {
        let mut sim = Simulation::new(config("")).unwrap();
        let mut fixed: Vec<(AgentId, Vec2, Label)> = Vec::new();
        while sim.is_running() {
            sim.step().unwrap();
            for &(id, position, label) in &fixed {
                let agent = &sim.population().agents()[sim.population().index_of(id).unwrap()];
                assert_eq!(agent.position, position);
                assert_eq!(agent.label(), Some(label));
            }
            fixed = sim
                .population()
                .agents()
                .iter()
                .filter(|a| a.label().is_some_and(|l| !l.is_virgin()))
                .map(|a| (a.id, a.position, a.label().unwrap()))
                .collect();
        }
        assert!(!fixed.is_empty());
    }

    #[test]
    fn disabled_differentiation_runs_to_max_ticks() {
        let mut config = config("");
        config.differentiation.enabled = false;
        let mut sim = Simulation::new(config).unwrap();
        while sim.is_running() {
            sim.step().unwrap();
        }
        assert_eq!(sim.tick(), 40);
        let snapshot = sim.record_snapshot().clone();
        assert!(!snapshot.cascade_enabled);
        assert_eq!(snapshot.stem_cells.differentiated(), 0);
        assert_eq!(snapshot.factor_a_total, 6);
        assert_eq!(snapshot.factor_b_total, 4);
        assert_eq!(sim.get_recorded_snapshots().len(), 1);
    }

    #[test]
    fn force_label_rejects_factor_agents() {
        let mut sim = Simulation::new(config("")).unwrap();
        let factor_id = sim.population().agents().iter().find(|a| a.kind() == AgentKind::FactorA).unwrap().id;
        assert!(sim.force_label(factor_id, Label::Endoderm).is_err());
        assert!(sim.force_label(1, Label::Endoderm).is_ok());
        assert_eq!(sim.population().agents()[0].label(), Some(Label::Endoderm));
    }

    fn lone_cell(extra: &str) -> Simulation {
        let mut population = Population::new();
        population.add_agent(Vec2::new(10.0, 10.0), 0.5, Behavior::Stem(StemCell::new(0)));
        Simulation::with_population(config(extra), population).unwrap()
    }

    #[test]
    fn force_label_never_reverts_differentiation() {
        let mut sim = lone_cell("[field.initial]\nkind = \"uniform\"\nvalue = 20.0");
        assert!(sim.force_label(1, Label::Virgin).is_err());
        assert_eq!(sim.population().agents()[0].label(), Some(Label::Virgin));

        sim.step().unwrap();
        assert_eq!(sim.population().agents()[0].label(), Some(Label::Endoderm));
        assert!(sim.force_label(1, Label::Virgin).is_err());
        assert!(sim.force_label(1, Label::Ectoderm).is_err());
        assert_eq!(sim.population().agents()[0].label(), Some(Label::Endoderm));
    }

    #[test]
    fn failed_tick_stops_the_run() {
        let mut sim = lone_cell("");
        // Covers [0, 5]² only, so the cell at the centre cannot read it.
        sim.field = DiffusionField::new(11, 5.0, 1.0, 0.01, |_, _| 1.0, |_| 0.0).unwrap();
        let err = sim.step().unwrap_err();
        assert!(err.to_string().contains("failed to read its signal"));
        assert!(!sim.is_running());
        assert_eq!(sim.tick(), 1);

        sim.step().unwrap();
        assert_eq!(sim.tick(), 1);
    }
}
