use serde::{Deserialize, Serialize};

/// State of a single grid position.
///
/// `Infected` carries the incubation day counter, which runs from 2
/// (freshly infected) up to `incubation_period - 1`; reaching
/// `incubation_period` classifies the occupant as `Recovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    /// Impassable terrain. Never occupied, never a movement target.
    Terrain,
    /// Habitable but unoccupied.
    Empty,
    /// Healthy occupant that can catch the contagion.
    Susceptible,
    /// Infectious occupant, tagged with its incubation day counter.
    Infected(u32),
    /// Occupant past the incubation period. Immune, no reinfection.
    Recovered,
}

impl Cell {
    /// State assigned at the moment of infection: day 2, the start of the
    /// infectious range. At `incubation_period == 2` that range is empty
    /// (day 2 is already past it), so the occupant recovers immediately
    /// and never becomes infectious.
    pub fn newly_infected(incubation_period: u32) -> Cell {
        if incubation_period <= 2 {
            Cell::Recovered
        } else {
            Cell::Infected(2)
        }
    }

    /// True for any occupant (susceptible, infected or recovered).
    #[inline]
    pub fn is_occupied(&self) -> bool {
        matches!(self, Cell::Susceptible | Cell::Infected(_) | Cell::Recovered)
    }

    /// True only while the occupant is actively infectious.
    /// Day-1 (susceptible) and recovered occupants never count.
    #[inline]
    pub fn is_infectious(&self) -> bool {
        matches!(self, Cell::Infected(_))
    }

    #[inline]
    pub fn is_terrain(&self) -> bool {
        matches!(self, Cell::Terrain)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Integer code used by renderers and serialized snapshots:
    /// -1 terrain, 0 empty, 1 susceptible, 2..incubation_period infected
    /// (value = day counter), incubation_period recovered.
    pub fn code(&self, incubation_period: u32) -> i32 {
        match *self {
            Cell::Terrain => -1,
            Cell::Empty => 0,
            Cell::Susceptible => 1,
            Cell::Infected(day) => day as i32,
            Cell::Recovered => incubation_period as i32,
        }
    }
}
