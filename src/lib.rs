//! Agent-based simulation of stem cell differentiation in a diffusing
//! signal field.

pub mod arc;
pub mod banded;
pub mod contact;
pub mod differentiation;
pub mod error;
pub mod factor;
pub mod field;
pub mod grid;
pub mod planner;
pub mod population;
pub mod simulation;

pub use error::FieldError;
pub use simulation::{Simulation, SimulationContext};
