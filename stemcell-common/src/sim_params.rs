use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Domain & spatial hash
    pub domain_size: f64,
    pub center: (f64, f64),
    pub hash_cell_size: f64,
    pub inv_hash_cell_size: f64,
    pub hash_dim: u32,

    // Concentration field
    pub resolution: u32,
    pub field_dt: f64,
    pub kappa: f64,

    // Agent geometry and motion
    pub stem_radius: f64,
    pub stem_step: f64,
    pub factor_a_radius: f64,
    pub factor_b_radius: f64,
    pub factor_a_step: f64,
    pub factor_b_step: f64,
    pub immobilize_percent: u32,
    pub max_immobilize_ticks: u32,
    pub max_inactive_ticks: u32,
    pub max_contact: f64, // Largest sum of radii over all kind pairs

    // Growth
    pub spawn_threshold: u32,
    pub max_energy_gain: u32,

    // Differentiation
    pub diff_timer_min: u32,
    pub diff_timer_max: u32,
}
