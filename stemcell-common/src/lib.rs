pub mod config;
pub mod label;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    DifferentiationConfig, FactorConfig, FieldConfig, InitialCondition, OutputConfig, PopulationConfig,
    ReactionKind, SignalSource, SimulationConfig, StemCellConfig, TimingConfig, UniverseConfig,
};
pub use label::Label;
pub use sim_params::SimParams;
pub use snapshot::{LabelCounts, Snapshot};
pub use vecmath::{angle_to_vec, clamp, distance, heading, reflect_into_domain, Vec2};
