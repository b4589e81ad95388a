use crate::grid::Grid;
use contagion_common::{Cell, SimParams};
use rayon::prelude::*;

/// Per-step population counts derived from a full grid scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
}

impl Counts {
    pub fn occupants(&self) -> u64 {
        self.susceptible + self.infected + self.recovered
    }

    /// floor(recovered * death_ratio).
    pub fn estimated_deaths(&self, death_ratio: f64) -> u64 {
        (self.recovered as f64 * death_ratio).floor() as u64
    }

    fn add(mut self, other: Counts) -> Counts {
        self.susceptible += other.susceptible;
        self.infected += other.infected;
        self.recovered += other.recovered;
        self
    }
}

/// Classifies every cell in one parallel pass. Day-1 occupants are
/// susceptible, not infected; empty and terrain cells count for nothing.
pub fn summarize(grid: &Grid) -> Counts {
    grid.cells()
        .par_iter()
        .fold(Counts::default, |mut acc, cell| {
            match cell {
                Cell::Susceptible => acc.susceptible += 1,
                Cell::Infected(_) => acc.infected += 1,
                Cell::Recovered => acc.recovered += 1,
                Cell::Empty | Cell::Terrain => {}
            }
            acc
        })
        .reduce(Counts::default, Counts::add)
}

/// Rolling per-step statistics: bounded history series for external
/// charting, population scaling onto a reference population, and the
/// epidemic-conclusion signal.
#[derive(Debug)]
pub struct StatsTracker {
    reference_population: f64,
    susceptible_ratio: f64,
    estimated_population: f64,
    sample_interval_steps: u32,
    history_window: usize,

    // Equal-length series, one entry per sampled round, oldest evicted
    // beyond the display window.
    rounds: Vec<u32>,
    susceptible_history: Vec<u64>,
    infected_history: Vec<u64>,
    recovered_history: Vec<u64>,

    recovered_seen: bool,
    concluded: bool,
}

impl StatsTracker {
    pub fn new(params: &SimParams) -> Self {
        Self {
            reference_population: params.reference_population,
            susceptible_ratio: params.susceptible_ratio,
            estimated_population: params.estimated_population,
            sample_interval_steps: params.sample_interval_steps,
            history_window: params.history_window,
            rounds: Vec::new(),
            susceptible_history: Vec::new(),
            infected_history: Vec::new(),
            recovered_history: Vec::new(),
            recovered_seen: false,
            concluded: false,
        }
    }

    /// Projects a raw cell count onto the reference population:
    /// floor(raw * reference * susceptible_ratio / estimated_population).
    /// Zero when no simulated population was estimated.
    pub fn scaled(&self, raw: u64) -> u64 {
        if self.estimated_population <= 0.0 {
            return 0;
        }
        (raw as f64 * self.reference_population * self.susceptible_ratio
            / self.estimated_population)
            .floor() as u64
    }

    /// Feeds one completed round into the tracker. Conclusion tracking sees
    /// every round; the history series only sample every
    /// `sample_interval_steps` rounds.
    pub fn record(&mut self, round: u32, counts: &Counts) {
        if counts.recovered > 0 {
            self.recovered_seen = true;
        }
        // Terminal: nobody left infectious after the epidemic actually ran.
        if self.recovered_seen && counts.infected == 0 {
            self.concluded = true;
        }

        if round % self.sample_interval_steps != 0 {
            return;
        }
        self.rounds.push(round);
        self.susceptible_history.push(counts.susceptible);
        self.infected_history.push(counts.infected);
        self.recovered_history.push(counts.recovered);
        while self.rounds.len() > self.history_window {
            self.rounds.remove(0);
            self.susceptible_history.remove(0);
            self.infected_history.remove(0);
            self.recovered_history.remove(0);
        }
    }

    /// True once `infected == 0` has been observed after at least one round
    /// with a non-zero recovered count. Drivers should stop stepping.
    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// Sampled round labels, aligned with the three history series.
    pub fn round_labels(&self) -> &[u32] {
        &self.rounds
    }

    pub fn susceptible_history(&self) -> &[u64] {
        &self.susceptible_history
    }

    pub fn infected_history(&self) -> &[u64] {
        &self.infected_history
    }

    pub fn recovered_history(&self) -> &[u64] {
        &self.recovered_history
    }

    /// Drops all history and re-arms the conclusion detector.
    pub fn clear(&mut self) {
        self.rounds.clear();
        self.susceptible_history.clear();
        self.infected_history.clear();
        self.recovered_history.clear();
        self.recovered_seen = false;
        self.concluded = false;
    }
}
