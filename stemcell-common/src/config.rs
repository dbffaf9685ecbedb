use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::Path;

// Domain and master seed
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UniverseConfig {
    /// Side length of the square domain.
    #[serde(default = "default_domain_size")]
    pub size: f64,
    #[serde(default)]
    pub seed: u64,
}

// Run length and recording cadence
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub max_ticks: u32,
    /// Extra ticks to run once the cascade has been enabled.
    #[serde(default = "default_ticks_after_cascade")]
    pub ticks_after_cascade: u32,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
}

// Initial population, one count per agent kind
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    pub num_stem_cells: u32,
    #[serde(default)]
    pub num_factor_a: u32,
    #[serde(default)]
    pub num_factor_b: u32,
    /// Agents are scattered uniformly in radius/angle within this distance of the centre.
    #[serde(default = "default_placement_radius")]
    pub placement_radius: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StemCellConfig {
    #[serde(default = "default_stem_radius")]
    pub radius: f64,
    /// Distance covered by a virgin cell per tick.
    #[serde(default = "default_stem_step")]
    pub step: f64,
    pub spawn_threshold: u32,
    #[serde(default = "default_max_energy_gain")]
    pub max_energy_gain: u32,
    pub diff_timer: u32,
    #[serde(default = "default_diff_timer_jitter")]
    pub diff_timer_jitter: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FactorConfig {
    #[serde(default = "default_factor_radius")]
    pub radius_a: f64,
    #[serde(default = "default_factor_radius")]
    pub radius_b: f64,
    #[serde(default = "default_step_a")]
    pub step_a: f64,
    #[serde(default = "default_step_b")]
    pub step_b: f64,
    #[serde(default = "default_immobilize_percent")]
    pub immobilize_percent: u32,
    #[serde(default = "default_factor_timer")]
    pub max_immobilize_ticks: u32,
    #[serde(default = "default_factor_timer")]
    pub max_inactive_ticks: u32,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Sample the concentration field at the cell's grid index.
    Field,
    /// Use the cell's accumulated contact-exposure counter.
    Exposure,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DifferentiationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endo_min: f64,
    pub ecto_max: f64,
    #[serde(default = "default_signal")]
    pub signal: SignalSource,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InitialCondition {
    /// `amplitude * exp(-((x-cx)^2 + (y-cy)^2) / width^2)`; centre defaults to the domain centre.
    Gaussian {
        #[serde(default)]
        center: Option<(f64, f64)>,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
        #[serde(default = "default_width")]
        width: f64,
    },
    Uniform { value: f64 },
    /// `a + bx * x + by * y`
    Linear { a: f64, bx: f64, by: f64 },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    None,
    Logistic,
    Log,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldConfig {
    /// Grid points per axis (N).
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default = "default_kappa")]
    pub kappa: f64,
    /// Time step; defaults to `0.01 * h` when omitted.
    #[serde(default)]
    pub dt: Option<f64>,
    #[serde(default = "default_initial")]
    pub initial: InitialCondition,
    #[serde(default = "default_reaction")]
    pub reaction: ReactionKind,
}

// Final-state output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_final_state: bool,
    #[serde(default = "default_true")]
    pub save_summary: bool,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub universe: UniverseConfig,
    pub timing: TimingConfig,
    pub population: PopulationConfig,
    pub stem_cell: StemCellConfig,
    #[serde(default)]
    pub factor: FactorConfig,
    pub differentiation: DifferentiationConfig,
    #[serde(default)]
    pub field: FieldConfig,
    pub output: OutputConfig,
}

impl Default for FactorConfig {
    fn default() -> Self {
        FactorConfig {
            radius_a: default_factor_radius(),
            radius_b: default_factor_radius(),
            step_a: default_step_a(),
            step_b: default_step_b(),
            immobilize_percent: default_immobilize_percent(),
            max_immobilize_ticks: default_factor_timer(),
            max_inactive_ticks: default_factor_timer(),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            resolution: default_resolution(),
            kappa: default_kappa(),
            dt: None,
            initial: default_initial(),
            reaction: default_reaction(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.universe.size <= 0.0 {
            anyhow::bail!("universe.size must be positive.");
        }
        if self.stem_cell.radius <= 0.0 || self.factor.radius_a <= 0.0 || self.factor.radius_b <= 0.0 {
            anyhow::bail!("agent radii must be positive.");
        }
        if self.stem_cell.step < 0.0 || self.factor.step_a < 0.0 || self.factor.step_b < 0.0 {
            anyhow::bail!("step lengths must not be negative.");
        }
        if self.stem_cell.spawn_threshold == 0 {
            anyhow::bail!("stem_cell.spawn_threshold must be greater than 0.");
        }
        if self.field.resolution < 3 {
            anyhow::bail!("field.resolution must be at least 3 (one interior point).");
        }
        if self.field.kappa < 0.0 {
            anyhow::bail!("field.kappa must not be negative.");
        }
        if let Some(dt) = self.field.dt {
            if dt <= 0.0 {
                anyhow::bail!("field.dt must be positive.");
            }
        }
        if self.differentiation.ecto_max > self.differentiation.endo_min {
            anyhow::bail!(
                "differentiation.ecto_max ({}) must not exceed endo_min ({}).",
                self.differentiation.ecto_max,
                self.differentiation.endo_min
            );
        }
        if self.factor.immobilize_percent > 100 {
            anyhow::bail!("factor.immobilize_percent must be within 0..=100.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let domain_size = self.universe.size;
        let resolution = self.field.resolution;
        let grid_spacing = domain_size / (resolution - 1) as f64;
        let field_dt = self.field.dt.unwrap_or(0.01 * grid_spacing);

        let stem_radius = self.stem_cell.radius;
        let max_radius = stem_radius.max(self.factor.radius_a).max(self.factor.radius_b);
        // Largest contact distance between any two kinds.
        let max_contact = 2.0 * max_radius;

        // Spatial hash cells are at least one contact distance wide
        let hash_cell_size = max_contact.max(1e-6);
        let inv_hash_cell_size = 1.0 / hash_cell_size;
        let hash_dim = ((domain_size * inv_hash_cell_size).ceil() as u32).max(1);

        SimParams {
            domain_size,
            center: (domain_size / 2.0, domain_size / 2.0),
            hash_cell_size,
            inv_hash_cell_size,
            hash_dim,
            resolution,
            field_dt,
            kappa: self.field.kappa,
            stem_radius,
            stem_step: self.stem_cell.step,
            factor_a_radius: self.factor.radius_a,
            factor_b_radius: self.factor.radius_b,
            factor_a_step: self.factor.step_a,
            factor_b_step: self.factor.step_b,
            immobilize_percent: self.factor.immobilize_percent,
            max_immobilize_ticks: self.factor.max_immobilize_ticks,
            max_inactive_ticks: self.factor.max_inactive_ticks,
            max_contact,
            spawn_threshold: self.stem_cell.spawn_threshold,
            max_energy_gain: self.stem_cell.max_energy_gain,
            diff_timer_min: self.stem_cell.diff_timer.saturating_sub(self.stem_cell.diff_timer_jitter),
            diff_timer_max: self.stem_cell.diff_timer,
        }
    }
}

// Default functions for optional parameters
fn default_domain_size() -> f64 {
    20.0
}

fn default_ticks_after_cascade() -> u32 {
    3
}

fn default_snapshot_interval() -> u32 {
    1
}

fn default_placement_radius() -> f64 {
    1.0
}

fn default_stem_radius() -> f64 {
    0.5
}

fn default_stem_step() -> f64 {
    0.2 // one fifth of a unit per tick
}

fn default_max_energy_gain() -> u32 {
    2
}

fn default_diff_timer_jitter() -> u32 {
    10
}

fn default_factor_radius() -> f64 {
    0.1
}

fn default_step_a() -> f64 {
    1.0 / 3.0
}

fn default_step_b() -> f64 {
    2.0
}

fn default_immobilize_percent() -> u32 {
    49
}

fn default_factor_timer() -> u32 {
    10
}

fn default_signal() -> SignalSource {
    SignalSource::Field
}

fn default_amplitude() -> f64 {
    1.0
}

fn default_width() -> f64 {
    1.0
}

fn default_initial() -> InitialCondition {
    InitialCondition::Gaussian { center: None, amplitude: default_amplitude(), width: default_width() }
}

fn default_reaction() -> ReactionKind {
    ReactionKind::None
}

fn default_resolution() -> u32 {
    100
}

fn default_kappa() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [universe]
        seed = 7

        [timing]
        max_ticks = 50

        [population]
        num_stem_cells = 10
        num_factor_a = 4

        [stem_cell]
        spawn_threshold = 10
        diff_timer = 20

        [differentiation]
        endo_min = 10.0
        ecto_max = 5.0

        [output]
        base_filename = "run"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.universe.size, 20.0);
        assert_eq!(config.field.resolution, 100);
        assert_eq!(config.field.reaction, ReactionKind::None);
        assert_eq!(config.differentiation.signal, SignalSource::Field);
        assert_eq!(config.timing.ticks_after_cascade, 3);
        assert_eq!(config.population.num_factor_b, 0);
        assert!(config.differentiation.enabled);
    }

    #[test]
    fn derived_params_scale_default_dt_with_grid_spacing() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        let params = config.get_sim_params();
        let h = 20.0 / 99.0;
        assert!((params.field_dt - 0.01 * h).abs() < 1e-12);
        assert_eq!(params.diff_timer_min, 10);
        assert_eq!(params.diff_timer_max, 20);
        assert_eq!(params.max_contact, 1.0);
    }

    #[test]
    fn initial_condition_table_parses() {
        let text = format!("{}\n[field]\nresolution = 21\ninitial = {{ kind = \"uniform\", value = 20.0 }}\nreaction = \"logistic\"\n", MINIMAL);
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.field.initial, InitialCondition::Uniform { value: 20.0 });
        assert_eq!(config.field.reaction, ReactionKind::Logistic);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let text = MINIMAL.replace("ecto_max = 5.0", "ecto_max = 15.0");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let text = format!("{}\n[field]\nresolution = 2\n", MINIMAL);
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }
}
