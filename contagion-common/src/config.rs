use crate::sim_params::SimParams;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Grid dimensions, fixed for the lifetime of a simulation instance.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    #[serde(default = "default_cells_x")]
    pub cells_x: u32,
    #[serde(default = "default_cells_y")]
    pub cells_y: u32,
}

// Disease progression parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DiseaseConfig {
    /// Steps an occupant stays infectious before counting as recovered.
    #[serde(default = "default_incubation_period")]
    pub incubation_period: u32,
    /// Per-step chance that contact with an infectious neighbour infects.
    #[serde(default = "default_contamination_prob")]
    pub contamination_prob: f64,
    /// Fraction of habitable cells initially seeded as susceptible.
    #[serde(default = "default_population_density")]
    pub population_density: f64,
    /// Fraction of recovered occupants reported as deaths.
    #[serde(default = "default_death_ratio")]
    pub death_ratio: f64,
}

// Projection of grid-local counts onto a real-world population.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScalingConfig {
    #[serde(default = "default_reference_population")]
    pub reference_population: f64,
    #[serde(default = "default_susceptible_ratio")]
    pub susceptible_ratio: f64,
}

// Initial conditions, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    /// Seed for the simulation RNG. Unset means OS entropy (non-reproducible runs).
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Coordinates forced to infected by `randomize()`. An empty list falls
    /// back to the two opposite grid corners.
    #[serde(default)]
    pub initial_infected: Vec<[u32; 2]>,
}

// Optional land-mask variant.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TerrainConfig {
    /// Path to a text map file (`#` blocked, `.` habitable), one line per row.
    #[serde(default)]
    pub map_file: Option<String>,
}

// Driver loop timing and history sampling.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Rounds between history samples fed to chart collaborators.
    #[serde(default = "default_sample_interval_steps")]
    pub sample_interval_steps: u32,
    /// Bounded display window: oldest history entries beyond this are evicted.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Stop automatic stepping once the epidemic has concluded.
    #[serde(default = "default_stop_when_concluded")]
    pub stop_when_concluded: bool,
}

// Configuration for output settings, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_snapshots: bool,
    #[serde(default = "default_true")]
    pub save_history: bool,
    /// Include full cell-code payloads in each snapshot (large files).
    #[serde(default)]
    pub save_cells_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_cells_x() -> u32 {
    160
}
fn default_cells_y() -> u32 {
    80
}
fn default_incubation_period() -> u32 {
    10
}
fn default_contamination_prob() -> f64 {
    0.2
}
fn default_population_density() -> f64 {
    0.3
}
fn default_death_ratio() -> f64 {
    0.03
}
fn default_reference_population() -> f64 {
    1_000_000.0
}
fn default_susceptible_ratio() -> f64 {
    1.0
}
fn default_max_steps() -> u32 {
    1_000
}
fn default_sample_interval_steps() -> u32 {
    10
}
fn default_history_window() -> usize {
    100
}
fn default_stop_when_concluded() -> bool {
    true
}
fn default_base_filename() -> String {
    "contagion".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            cells_x: default_cells_x(),
            cells_y: default_cells_y(),
        }
    }
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        DiseaseConfig {
            incubation_period: default_incubation_period(),
            contamination_prob: default_contamination_prob(),
            population_density: default_population_density(),
            death_ratio: default_death_ratio(),
        }
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        ScalingConfig {
            reference_population: default_reference_population(),
            susceptible_ratio: default_susceptible_ratio(),
        }
    }
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions {
            rng_seed: None,
            initial_infected: Vec::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            max_steps: default_max_steps(),
            sample_interval_steps: default_sample_interval_steps(),
            history_window: default_history_window(),
            stop_when_concluded: default_stop_when_concluded(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_snapshots: true,
            save_history: true,
            save_cells_in_snapshot: false,
            format: None,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub disease: DiseaseConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects parameter combinations the step algorithm's correctness depends on.
    pub fn validate(&self) -> Result<()> {
        if self.grid.cells_x == 0 || self.grid.cells_y == 0 {
            anyhow::bail!("grid dimensions must be positive.");
        }
        if self.disease.incubation_period < 2 {
            anyhow::bail!("incubation_period must be at least 2.");
        }
        if !(0.0..=1.0).contains(&self.disease.contamination_prob) {
            anyhow::bail!("contamination_prob must be within [0, 1].");
        }
        if !(0.0..=1.0).contains(&self.disease.population_density) {
            anyhow::bail!("population_density must be within [0, 1].");
        }
        if !(0.0..=1.0).contains(&self.disease.death_ratio) {
            anyhow::bail!("death_ratio must be within [0, 1].");
        }
        if self.scaling.susceptible_ratio < 0.0 {
            anyhow::bail!("susceptible_ratio must be non-negative.");
        }
        if self.scaling.reference_population < 0.0 {
            anyhow::bail!("reference_population must be non-negative.");
        }
        if self.timing.sample_interval_steps == 0 {
            anyhow::bail!("sample_interval_steps must be at least 1.");
        }
        if self.timing.history_window == 0 {
            anyhow::bail!("history_window must be at least 1.");
        }
        for &[x, y] in &self.initial_conditions.initial_infected {
            if x >= self.grid.cells_x || y >= self.grid.cells_y {
                anyhow::bail!(
                    "initial_infected coordinate ({}, {}) is outside the {}x{} grid.",
                    x,
                    y,
                    self.grid.cells_x,
                    self.grid.cells_y
                );
            }
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    ///
    /// `habitable_fraction` comes from the terrain mask (1.0 without one) and
    /// feeds the estimated simulated population used for count scaling.
    pub fn get_sim_params(&self, habitable_fraction: f64) -> SimParams {
        let cells_x = self.grid.cells_x;
        let cells_y = self.grid.cells_y;
        let num_cells = cells_x as u64 * cells_y as u64;

        // Expected occupant count when randomize() seeds at the configured density.
        let estimated_population =
            self.disease.population_density * num_cells as f64 * habitable_fraction;

        SimParams {
            cells_x,
            cells_y,
            num_cells,
            incubation_period: self.disease.incubation_period,
            contamination_prob: self.disease.contamination_prob,
            population_density: self.disease.population_density,
            death_ratio: self.disease.death_ratio,
            susceptible_ratio: self.scaling.susceptible_ratio,
            reference_population: self.scaling.reference_population,
            habitable_fraction,
            estimated_population,
            sample_interval_steps: self.timing.sample_interval_steps,
            history_window: self.timing.history_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.grid.cells_x, 160);
        assert_eq!(config.grid.cells_y, 80);
        assert_eq!(config.disease.incubation_period, 10);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SimulationConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.disease.contamination_prob, 0.2);
        assert!(config.initial_conditions.rng_seed.is_none());
    }

    #[test]
    fn rejects_short_incubation_period() {
        let mut config = SimulationConfig::default();
        config.disease.incubation_period = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_probabilities() {
        let mut config = SimulationConfig::default();
        config.disease.contamination_prob = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.disease.population_density = -0.1;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.disease.death_ratio = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_bounds_seed_coordinates() {
        let mut config = SimulationConfig::default();
        config.initial_conditions.initial_infected = vec![[160, 0]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_grids_do_not_overflow_the_cell_count() {
        let mut config = SimulationConfig::default();
        config.grid.cells_x = 100_000;
        config.grid.cells_y = 100_000;
        config.validate().unwrap();
        let params = config.get_sim_params(1.0);
        assert_eq!(params.num_cells, 10_000_000_000);
    }

    #[test]
    fn derived_params_scale_with_habitable_fraction() {
        let config = SimulationConfig::default();
        let params = config.get_sim_params(0.5);
        assert_eq!(params.num_cells, 160 * 80);
        let expected = 0.3 * (160.0 * 80.0) * 0.5;
        assert!((params.estimated_population - expected).abs() < 1e-9);
    }
}
