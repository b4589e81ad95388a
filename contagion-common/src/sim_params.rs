use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Grid
    pub cells_x: u32,
    pub cells_y: u32,
    pub num_cells: u64, // cells_x * cells_y, widened so large grids cannot overflow

    // Disease
    pub incubation_period: u32,      // Steps from infection to recovery
    pub contamination_prob: f64,     // Per-step infection chance near an infectious neighbour
    pub population_density: f64,     // Fraction of habitable cells seeded as susceptible
    pub death_ratio: f64,            // Fraction of recovered counted as deaths

    // Population scaling
    pub susceptible_ratio: f64,      // Scaling factor onto the reference population
    pub reference_population: f64,   // Real-world population the grid stands in for
    pub habitable_fraction: f64,     // 1.0 without a terrain mask
    pub estimated_population: f64,   // Expected occupant count at randomize()

    // Timing / history
    pub sample_interval_steps: u32,  // Rounds between history samples
    pub history_window: usize,       // Max retained history entries per series
}
