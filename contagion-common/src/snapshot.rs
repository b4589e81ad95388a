use serde::{Deserialize, Serialize};

/// A snapshot of the simulation state and metrics at a specific round.
#[derive(Debug, Clone, Serialize, Deserialize)] // Derive traits for easy saving/loading
pub struct Snapshot {
    /// The round counter at which the snapshot was taken.
    pub round: u32,
    /// Raw count of susceptible occupants on the grid.
    pub susceptible: u64,
    /// Raw count of actively infected occupants (day-1 cells are susceptible, not infected).
    pub infected: u64,
    /// Raw count of recovered occupants.
    pub recovered: u64,
    /// floor(recovered * death_ratio).
    pub estimated_deaths: u64,
    /// Counts projected onto the configured reference population.
    pub scaled_susceptible: u64,
    pub scaled_infected: u64,
    pub scaled_recovered: u64,
    /// Optional: full cell codes (-1 terrain, 0 empty, 1 susceptible,
    /// 2..incubation infected, incubation recovered) in x-major order.
    /// Included only if `config.output.save_cells_in_snapshot` is true.
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "cells": null
    pub cells: Option<Vec<i32>>,
}
