//! Stem cell fate decisions.
//!
//! A virgin cell differentiates once its countdown timer has run out, by
//! comparing a signal against two thresholds. After the first decision the
//! cascade copies labels across contacts, one hop per tick.

use stemcell_common::{DifferentiationConfig, Label, SignalSource};

use crate::error::FieldError;
use crate::grid::ContactGraph;
use crate::population::{Population, StemCell};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Signals at or above this become endoderm.
    pub endo_min: f64,
    /// Signals at or above this (and below `endo_min`) become mesoderm.
    pub ecto_max: f64,
}

/// Ordered threshold test; the first matching branch wins.
pub fn classify(signal: f64, thresholds: &Thresholds) -> Label {
    if signal >= thresholds.endo_min {
        Label::Endoderm
    } else if signal >= thresholds.ecto_max {
        Label::Mesoderm
    } else {
        Label::Ectoderm
    }
}

#[derive(Debug, Clone)]
pub struct DifferentiationEngine {
    thresholds: Thresholds,
    source: SignalSource,
    enabled: bool,
}

impl DifferentiationEngine {
    pub fn new(thresholds: Thresholds, source: SignalSource, enabled: bool) -> Self {
        Self { thresholds, source, enabled }
    }

    pub fn from_config(config: &DifferentiationConfig) -> Self {
        let thresholds = Thresholds { endo_min: config.endo_min, ecto_max: config.ecto_max };
        Self::new(thresholds, config.signal, config.enabled)
    }

    pub fn source(&self) -> SignalSource {
        self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counts the cell's timer down, or runs the threshold test once it has
    /// reached zero. `signal` is only evaluated when the test actually fires.
    ///
    /// Returns the new label when the cell differentiated on this call.
    pub fn tick_timer<F>(&self, cell: &mut StemCell, signal: F) -> Result<Option<Label>, FieldError>
    where
        F: FnOnce(&StemCell) -> Result<f64, FieldError>,
    {
        if !self.enabled {
            return Ok(None);
        }
        if cell.diff_timer > 0 {
            cell.diff_timer -= 1;
            return Ok(None);
        }
        if !cell.label.is_virgin() {
            return Ok(None);
        }
        let label = classify(signal(cell)?, &self.thresholds);
        cell.label = label;
        Ok(Some(label))
    }

    /// One cascade pass: every virgin stem cell touching a differentiated one
    /// takes that neighbour's label. Labels are read from the state before
    /// the pass, so a conversion never propagates further within the same
    /// pass. Among several differentiated neighbours the lowest slot wins.
    ///
    /// Returns the number of converted cells.
    pub fn cascade(&self, population: &mut Population, graph: &ContactGraph) -> usize {
        if !self.enabled {
            return 0;
        }
        let labels: Vec<Option<Label>> = population.agents().iter().map(|a| a.label()).collect();
        let mut converted = 0;
        for (idx, agent) in population.agents_mut().iter_mut().enumerate() {
            let Some(cell) = agent.stem_mut() else {
                continue;
            };
            if !cell.label.is_virgin() {
                continue;
            }
            let inherited = graph
                .neighbors(idx)
                .iter()
                .filter_map(|&other| labels.get(other).copied().flatten())
                .find(|label| !label.is_virgin());
            if let Some(label) = inherited {
                cell.label = label;
                cell.diff_timer = 0;
                converted += 1;
            }
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SpatialIndex;
    use crate::population::Behavior;
    use stemcell_common::{SimulationConfig, Vec2};

    const THRESHOLDS: Thresholds = Thresholds { endo_min: 10.0, ecto_max: 5.0 };

    fn engine() -> DifferentiationEngine {
        DifferentiationEngine::new(THRESHOLDS, SignalSource::Field, true)
    }

    fn graph_for(pop: &Population) -> ContactGraph {
        let config = SimulationConfig::from_toml_str(
            r#"
            [universe]
            size = 20.0
            [timing]
            max_ticks = 1
            [population]
            num_stem_cells = 1
            [stem_cell]
            spawn_threshold = 10
            diff_timer = 5
            [differentiation]
            endo_min = 10.0
            ecto_max = 5.0
            [output]
            base_filename = "diff"
            "#,
        )
        .unwrap();
        let params = config.get_sim_params();
        let index = SpatialIndex::build(pop.positions(), &params);
        ContactGraph::build(pop, &index, params.max_contact / 2.0)
    }

    fn stem_at(pop: &mut Population, x: f64, label: Label) {
        let mut cell = StemCell::new(7);
        cell.label = label;
        pop.add_agent(Vec2::new(x, 10.0), 0.5, Behavior::Stem(cell));
    }

    fn labels(pop: &Population) -> Vec<Label> {
        pop.agents().iter().filter_map(|a| a.label()).collect()
    }

    #[test]
    fn thresholds_are_tested_in_order() {
        assert_eq!(classify(20.0, &THRESHOLDS), Label::Endoderm);
        assert_eq!(classify(10.0, &THRESHOLDS), Label::Endoderm);
        assert_eq!(classify(7.5, &THRESHOLDS), Label::Mesoderm);
        assert_eq!(classify(5.0, &THRESHOLDS), Label::Mesoderm);
        assert_eq!(classify(4.99, &THRESHOLDS), Label::Ectoderm);
        assert_eq!(classify(0.0, &THRESHOLDS), Label::Ectoderm);

        let collapsed = Thresholds { endo_min: 3.0, ecto_max: 3.0 };
        assert_eq!(classify(3.0, &collapsed), Label::Endoderm);
        assert_eq!(classify(2.0, &collapsed), Label::Ectoderm);
    }

    #[test]
    fn timer_counts_down_before_sampling() {
        let engine = engine();
        let mut cell = StemCell::new(3);
        for _ in 0..3 {
            let fired = engine.tick_timer(&mut cell, |_| panic!("sampled before the timer ran out")).unwrap();
            assert_eq!(fired, None);
        }
        assert_eq!(cell.diff_timer, 0);
        assert_eq!(engine.tick_timer(&mut cell, |_| Ok(7.0)).unwrap(), Some(Label::Mesoderm));
        assert_eq!(cell.label, Label::Mesoderm);
    }

    #[test]
    fn differentiated_cells_are_terminal() {
        let engine = engine();
        let mut cell = StemCell::new(0);
        engine.tick_timer(&mut cell, |_| Ok(12.0)).unwrap();
        for signal in [0.0, 6.0, 50.0] {
            assert_eq!(engine.tick_timer(&mut cell, |_| Ok(signal)).unwrap(), None);
            assert_eq!(cell.label, Label::Endoderm);
        }
    }

    #[test]
    fn exposure_signal_reads_the_cell() {
        let engine = DifferentiationEngine::new(THRESHOLDS, SignalSource::Exposure, true);
        let mut cell = StemCell::new(0);
        cell.exposure = 11;
        let fired = engine.tick_timer(&mut cell, |c| Ok(c.exposure as f64)).unwrap();
        assert_eq!(fired, Some(Label::Endoderm));
        assert_eq!(engine.source(), SignalSource::Exposure);
    }

    #[test]
    fn sampling_errors_propagate() {
        let engine = engine();
        let mut cell = StemCell::new(0);
        let err = engine
            .tick_timer(&mut cell, |_| Err(FieldError::OutOfDomain { x: -1.0, y: 0.0, resolution: 10 }))
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfDomain { .. }));
        assert!(cell.label.is_virgin());
    }

    #[test]
    fn disabled_engine_never_fires() {
        let engine = DifferentiationEngine::new(THRESHOLDS, SignalSource::Field, false);
        let mut cell = StemCell::new(0);
        assert_eq!(engine.tick_timer(&mut cell, |_| Ok(100.0)).unwrap(), None);
        assert!(cell.label.is_virgin());

        let mut pop = Population::new();
        stem_at(&mut pop, 10.0, Label::Mesoderm);
        stem_at(&mut pop, 10.9, Label::Virgin);
        let graph = graph_for(&pop);
        assert_eq!(engine.cascade(&mut pop, &graph), 0);
    }

    #[test]
    fn cascade_moves_one_hop_per_pass() {
        let engine = engine();
        let mut pop = Population::new();
        stem_at(&mut pop, 8.0, Label::Mesoderm);
        stem_at(&mut pop, 8.9, Label::Virgin);
        stem_at(&mut pop, 9.8, Label::Virgin);
        let graph = graph_for(&pop);

        assert_eq!(engine.cascade(&mut pop, &graph), 1);
        assert_eq!(labels(&pop), vec![Label::Mesoderm, Label::Mesoderm, Label::Virgin]);
        assert_eq!(pop.agents()[1].stem().unwrap().diff_timer, 0);

        assert_eq!(engine.cascade(&mut pop, &graph), 1);
        assert_eq!(labels(&pop), vec![Label::Mesoderm; 3]);
        assert_eq!(engine.cascade(&mut pop, &graph), 0);
    }

    #[test]
    fn lowest_slot_neighbour_wins() {
        let engine = engine();
        let mut pop = Population::new();
        stem_at(&mut pop, 8.0, Label::Ectoderm);
        stem_at(&mut pop, 8.9, Label::Virgin);
        stem_at(&mut pop, 9.8, Label::Endoderm);
        let graph = graph_for(&pop);
        engine.cascade(&mut pop, &graph);
        assert_eq!(labels(&pop), vec![Label::Ectoderm, Label::Ectoderm, Label::Endoderm]);
    }
}
