pub mod cell;
pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod terrain;

// Re-export key types for easier use by dependent crates
pub use cell::Cell;
pub use config::{
    DiseaseConfig, GridConfig, InitialConditions, OutputConfig, ScalingConfig, SimulationConfig,
    TerrainConfig, TimingConfig,
};
pub use sim_params::SimParams;
pub use snapshot::Snapshot;
pub use terrain::TerrainMask;
