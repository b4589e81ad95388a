use crate::grid::Grid;
use crate::stats::{self, Counts, StatsTracker};
use anyhow::Result;
use contagion_common::{Cell, SimParams, SimulationConfig, Snapshot, TerrainMask};
use log::{debug, warn};
use rand::prelude::*;

/// One simulation session: configuration, double-buffered grid state, RNG,
/// round counter and rolling statistics. Owned explicitly by the driver;
/// changing parameters means constructing a new instance.
pub struct Simulation {
    config: SimulationConfig,
    params: SimParams,
    /// Host RNG for contagion rolls and movement draws. Seeded from
    /// `initial_conditions.rng_seed` when set, OS entropy otherwise.
    rng: StdRng,
    /// Current state. External readers only ever see this post-swap grid.
    grid: Grid,
    /// Output buffer for the in-progress step; swapped, never reallocated.
    buffer: Grid,
    /// Completed steps since the last clear()/randomize().
    round: u32,
    stats: StatsTracker,
    /// Counts recomputed after every state change.
    latest: Counts,
    /// Stores collected statistics snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Creates a session from a validated configuration, loading the terrain
    /// map named in `[terrain]` if any. The grid starts empty; call
    /// `randomize()` to populate it.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let terrain = match &config.terrain.map_file {
            Some(path) => Some(TerrainMask::load(
                path,
                config.grid.cells_x,
                config.grid.cells_y,
            )?),
            None => None,
        };
        Self::with_terrain(config, terrain)
    }

    /// Variant taking an already-built land mask from a map collaborator.
    pub fn with_terrain(config: SimulationConfig, terrain: Option<TerrainMask>) -> Result<Self> {
        config.validate()?;

        let habitable_fraction = terrain
            .as_ref()
            .map(|m| m.habitable_fraction())
            .unwrap_or(1.0);
        let params = config.get_sim_params(habitable_fraction);

        let rng = match config.initial_conditions.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let grid = Grid::new(params.cells_x, params.cells_y, terrain.as_ref());
        let buffer = grid.clone();
        let stats = StatsTracker::new(&params);

        Ok(Self {
            config,
            params,
            rng,
            grid,
            buffer,
            round: 0,
            stats,
            latest: Counts::default(),
            recorded_snapshots: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Post-swap grid state for renderer collaborators.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn counts(&self) -> Counts {
        self.latest
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// True once the epidemic has run its course (no infectious occupants
    /// left after recoveries were observed). Drivers should stop stepping.
    pub fn is_concluded(&self) -> bool {
        self.stats.is_concluded()
    }

    /// Advances the simulation by exactly one round.
    ///
    /// Three rules are applied to every occupied cell in row-major order
    /// (x outer, y inner), each reading only the pre-step grid:
    /// incubation, contagion, then movement into the output buffer. The
    /// buffers swap at the end, so no partial state is ever observable.
    pub fn step(&mut self) -> Counts {
        let cells_x = self.params.cells_x as i64;
        let cells_y = self.params.cells_y as i64;
        let incubation_period = self.params.incubation_period;
        let contamination_prob = self.params.contamination_prob;

        // Terrain persists in the buffer; everything else starts empty.
        self.buffer.clear_occupants();

        for x in 0..cells_x {
            for y in 0..cells_y {
                let state = self.grid.get(x, y);
                if !state.is_occupied() {
                    continue;
                }

                // Rule 1: infected occupants incubate.
                let mut next = match state {
                    Cell::Infected(day) => {
                        if day + 1 >= incubation_period {
                            Cell::Recovered
                        } else {
                            Cell::Infected(day + 1)
                        }
                    }
                    other => other,
                };

                // Rule 2: contact with an infectious neighbour may infect.
                // One independent draw per eligible cell per step.
                if next == Cell::Susceptible
                    && self.grid.count_infected_neighbours(x, y) > 0
                    && self.rng.random::<f64>() < contamination_prob
                {
                    next = Cell::newly_infected(incubation_period);
                }

                // Rule 3: everyone drifts. The target must be inside the
                // grid, empty before the step started, and not yet claimed
                // in the buffer; first writer wins, otherwise stay put.
                let new_x = x + self.rng.random_range(-1..=1);
                let new_y = y + self.rng.random_range(-1..=1);
                if self.grid.get(new_x, new_y).is_empty() && self.buffer.get(new_x, new_y).is_empty()
                {
                    self.buffer.set(new_x, new_y, next);
                } else {
                    // The origin cannot have been claimed: movers only
                    // target cells that were empty pre-step.
                    self.buffer.set(x, y, next);
                }
            }
        }

        // Flip buffers: the completed output becomes the visible state.
        std::mem::swap(&mut self.grid, &mut self.buffer);
        self.round += 1;

        self.latest = stats::summarize(&self.grid);
        self.stats.record(self.round, &self.latest);
        self.latest
    }

    /// Resets all non-terrain cells to empty, the round counter to 0 and
    /// drops the statistics history.
    pub fn clear(&mut self) {
        self.grid.clear_occupants();
        self.buffer.clear_occupants();
        self.round = 0;
        self.stats.clear();
        self.latest = Counts::default();
    }

    /// Clears, then seeds each habitable cell as susceptible with
    /// probability `population_density` and forces the configured initial
    /// infected coordinates (the two opposite corners by default).
    pub fn randomize(&mut self) {
        self.clear();

        let cells_x = self.params.cells_x as i64;
        let cells_y = self.params.cells_y as i64;
        let density = self.params.population_density;

        for x in 0..cells_x {
            for y in 0..cells_y {
                if self.grid.get(x, y).is_terrain() {
                    continue;
                }
                if self.rng.random::<f64>() < density {
                    self.grid.set(x, y, Cell::Susceptible);
                }
            }
        }

        let mut seeds = self.config.initial_conditions.initial_infected.clone();
        if seeds.is_empty() {
            seeds.push([0, 0]);
            seeds.push([self.params.cells_x - 1, self.params.cells_y - 1]);
        }
        for [x, y] in seeds {
            if self.grid.get(x as i64, y as i64).is_terrain() {
                warn!("Initial infected seed ({}, {}) is on terrain, skipping.", x, y);
                continue;
            }
            self.grid
                .set(x as i64, y as i64, Cell::newly_infected(self.params.incubation_period));
        }

        self.latest = stats::summarize(&self.grid);
        self.stats.record(self.round, &self.latest);
        debug!(
            "Randomized grid: {} susceptible, {} infected.",
            self.latest.susceptible, self.latest.infected
        );
    }

    /// Forces a single in-bounds, non-terrain cell to freshly infected.
    pub fn toggle_cell(&mut self, x: u32, y: u32) {
        if x >= self.params.cells_x || y >= self.params.cells_y {
            return;
        }
        if self.grid.get(x as i64, y as i64).is_terrain() {
            return;
        }
        self.grid
            .set(x as i64, y as i64, Cell::newly_infected(self.params.incubation_period));
        self.latest = stats::summarize(&self.grid);
    }

    /// Captures the current round's metrics into the recorded series.
    pub fn record_snapshot(&mut self) {
        let counts = self.latest;
        let cells = if self.config.output.save_cells_in_snapshot {
            Some(self.grid.codes(self.params.incubation_period))
        } else {
            None
        };
        self.recorded_snapshots.push(Snapshot {
            round: self.round,
            susceptible: counts.susceptible,
            infected: counts.infected,
            recovered: counts.recovered,
            estimated_deaths: counts.estimated_deaths(self.params.death_ratio),
            scaled_susceptible: self.stats.scaled(counts.susceptible),
            scaled_infected: self.stats.scaled(counts.infected),
            scaled_recovered: self.stats.scaled(counts.recovered),
            cells,
        });
    }

    pub fn recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(cells_x: u32, cells_y: u32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.cells_x = cells_x;
        config.grid.cells_y = cells_y;
        config.initial_conditions.rng_seed = Some(42);
        config.timing.sample_interval_steps = 1;
        config
    }

    #[test]
    fn occupants_are_conserved_across_steps() {
        let mut config = base_config(20, 15);
        config.disease.population_density = 0.4;
        let mut sim = Simulation::new(config).unwrap();
        sim.randomize();
        let initial = sim.grid().occupant_count();
        assert!(initial > 0);
        for _ in 0..50 {
            let counts = sim.step();
            assert_eq!(sim.grid().occupant_count(), initial);
            assert_eq!(counts.occupants() as usize, initial);
        }
    }

    #[test]
    fn susceptible_without_infected_neighbours_never_infects() {
        let mut config = base_config(8, 8);
        config.disease.contamination_prob = 1.0;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        // A lone susceptible occupant, nothing infectious anywhere.
        sim.grid.set(4, 4, Cell::Susceptible);
        sim.latest = stats::summarize(&sim.grid);
        for _ in 0..25 {
            let counts = sim.step();
            assert_eq!(counts.susceptible, 1);
            assert_eq!(counts.infected, 0);
        }
    }

    #[test]
    fn incubation_advances_monotonically_to_recovery() {
        let mut config = base_config(6, 6);
        config.disease.incubation_period = 4;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.grid.set(3, 3, Cell::Infected(2));
        sim.latest = stats::summarize(&sim.grid);

        // Day 2 -> day 3.
        let counts = sim.step();
        assert_eq!(counts.infected, 1);
        assert_eq!(counts.recovered, 0);
        // Day 3 -> recovered, and recovered never re-enters the infected range.
        let counts = sim.step();
        assert_eq!(counts.infected, 0);
        assert_eq!(counts.recovered, 1);
        for _ in 0..10 {
            let counts = sim.step();
            assert_eq!(counts.infected, 0);
            assert_eq!(counts.recovered, 1);
        }
    }

    #[test]
    fn single_infected_on_3x3_recovers_and_stays_single() {
        // incubation 3: a day-2 occupant becomes day 3 (recovered) in one
        // step and lands on exactly one of the nine positions.
        let mut config = base_config(3, 3);
        config.disease.incubation_period = 3;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.grid.set(1, 1, Cell::Infected(2));
        sim.latest = stats::summarize(&sim.grid);

        let counts = sim.step();
        assert_eq!(counts.occupants(), 1);
        assert_eq!(counts.recovered, 1);
        assert_eq!(sim.grid().occupant_count(), 1);
    }

    #[test]
    fn certain_contamination_infects_adjacent_susceptible() {
        let mut config = base_config(2, 1);
        config.disease.contamination_prob = 1.0;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.grid.set(0, 0, Cell::Susceptible);
        sim.grid.set(1, 0, Cell::Infected(2));
        sim.latest = stats::summarize(&sim.grid);

        let counts = sim.step();
        assert_eq!(counts.susceptible, 0);
        assert_eq!(counts.infected, 2);
    }

    #[test]
    fn minimum_incubation_period_recovers_instantly_and_never_spreads() {
        // Period 2 admits no infectious days: a fresh infection lands
        // directly in the recovered class and cannot contaminate anyone.
        let mut config = base_config(2, 1);
        config.disease.incubation_period = 2;
        config.disease.contamination_prob = 1.0;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.grid.set(0, 0, Cell::Susceptible);
        sim.latest = stats::summarize(&sim.grid);
        sim.toggle_cell(1, 0);

        let counts = sim.counts();
        assert_eq!(counts.infected, 0);
        assert_eq!(counts.recovered, 1);
        assert_eq!(sim.grid().get(1, 0), Cell::Recovered);

        for _ in 0..10 {
            let counts = sim.step();
            assert_eq!(counts.susceptible, 1);
            assert_eq!(counts.infected, 0);
            assert_eq!(counts.recovered, 1);
        }
    }

    #[test]
    fn minimum_incubation_period_randomize_seeds_as_recovered() {
        let mut config = base_config(4, 4);
        config.disease.incubation_period = 2;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.randomize();
        assert_eq!(sim.counts().infected, 0);
        assert_eq!(sim.counts().recovered, 2);
    }

    #[test]
    fn zero_density_randomize_seeds_only_initial_infected() {
        let mut config = base_config(12, 9);
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.randomize();
        let counts = sim.counts();
        assert_eq!(counts.susceptible, 0);
        // Default seeds: the two opposite corners.
        assert_eq!(counts.infected, 2);
        assert_eq!(sim.grid().get(0, 0), Cell::Infected(2));
        assert_eq!(sim.grid().get(11, 8), Cell::Infected(2));
    }

    #[test]
    fn randomize_then_clear_empties_every_habitable_cell() {
        let mut config = base_config(10, 10);
        config.disease.population_density = 0.8;
        let mut sim = Simulation::new(config).unwrap();
        sim.randomize();
        sim.step();
        sim.clear();
        assert_eq!(sim.round(), 0);
        assert_eq!(sim.grid().occupant_count(), 0);
        assert!(sim.stats().round_labels().is_empty());
        assert!(sim.grid().cells().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn terrain_cells_are_invariant_and_never_entered() {
        let mut config = base_config(4, 4);
        config.disease.population_density = 1.0;
        config.initial_conditions.initial_infected = vec![[1, 0]];
        let mask = TerrainMask::parse("..#.\n....\n.#..\n....\n", 4, 4).unwrap();
        let mut sim = Simulation::with_terrain(config, Some(mask)).unwrap();
        sim.randomize();
        // Map rows are y, columns are x: blocked at (2,0) and (1,2).
        let blocked = [(2i64, 0i64), (1, 2)];
        let occupants = sim.grid().occupant_count();
        for _ in 0..30 {
            sim.step();
            for &(x, y) in &blocked {
                assert_eq!(sim.grid().get(x, y), Cell::Terrain);
            }
            assert_eq!(sim.grid().occupant_count(), occupants);
        }
    }

    #[test]
    fn randomize_skips_seed_coordinates_on_terrain() {
        let mut config = base_config(2, 2);
        config.disease.population_density = 0.0;
        config.initial_conditions.initial_infected = vec![[0, 0], [1, 1]];
        let mask = TerrainMask::parse("#.\n..\n", 2, 2).unwrap();
        let mut sim = Simulation::with_terrain(config, Some(mask)).unwrap();
        sim.randomize();
        assert_eq!(sim.grid().get(0, 0), Cell::Terrain);
        assert_eq!(sim.grid().get(1, 1), Cell::Infected(2));
        assert_eq!(sim.counts().infected, 1);
    }

    #[test]
    fn toggle_cell_forces_infection_in_bounds_only() {
        let mut config = base_config(5, 5);
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.toggle_cell(2, 2);
        assert_eq!(sim.grid().get(2, 2), Cell::Infected(2));
        assert_eq!(sim.counts().infected, 1);
        // Out of range: silently ignored.
        sim.toggle_cell(5, 0);
        sim.toggle_cell(0, 99);
        assert_eq!(sim.counts().infected, 1);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let run = || {
            let mut config = base_config(16, 16);
            config.disease.population_density = 0.5;
            let mut sim = Simulation::new(config).unwrap();
            sim.randomize();
            for _ in 0..20 {
                sim.step();
            }
            sim.grid().codes(sim.params().incubation_period)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn conclusion_is_signalled_once_infection_dies_out() {
        let mut config = base_config(3, 1);
        config.disease.incubation_period = 3;
        config.disease.contamination_prob = 0.0;
        config.disease.population_density = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.grid.set(1, 0, Cell::Infected(2));
        sim.latest = stats::summarize(&sim.grid);
        assert!(!sim.is_concluded());
        sim.step();
        assert!(sim.is_concluded());
    }

    #[test]
    fn snapshots_capture_counts_and_optional_cells() {
        let mut config = base_config(4, 4);
        config.disease.population_density = 0.0;
        config.output.save_cells_in_snapshot = true;
        let mut sim = Simulation::new(config).unwrap();
        sim.randomize();
        sim.record_snapshot();
        let snapshot = &sim.recorded_snapshots()[0];
        assert_eq!(snapshot.round, 0);
        assert_eq!(snapshot.infected, 2);
        assert_eq!(snapshot.cells.as_ref().unwrap().len(), 16);
    }
}
