use crate::config::ModelConfig;
use crate::error::Error;
use crate::grid::{Coord, Grid};
use crate::model::{Agent, TypeMap};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::{fmt::Debug, ops::Bound, ops::RangeBounds};

/// Largest accepted grid side, keeping cell indices within `i32` coordinates.
pub const MAX_SIDE: usize = 10_000;

/// Relocation performed by a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub from: Coord,
    pub to: Coord,
}

/// Schelling segregation model.
///
/// Owns the grid with its population and the random number generator.
/// Agents are only reachable through the grid, and the only mutation after
/// construction is [`Simulation::update`].
pub struct Simulation {
    grid: Grid,
    rng: ChaCha12Rng,
}

impl Simulation {
    /// Create a new `Simulation` and scatter its population over the grid.
    ///
    /// `floor(density * width * height)` agents are split evenly among the types,
    /// dropping the remainder, and each one is placed on a random empty cell.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if a parameter is out of range.
    pub fn new(cfg: &ModelConfig, mut rng: ChaCha12Rng) -> Result<Self, Error> {
        check_param("width", cfg.width, 1..=MAX_SIDE)?;
        check_param("height", cfg.height, 1..=MAX_SIDE)?;
        check_param(
            "population density",
            cfg.population_density,
            (Bound::Excluded(0.0), Bound::Excluded(1.0)),
        )?;
        check_param("happiness threshold", cfg.happiness_threshold, 0.0..=1.0)?;
        check_param("number of types", cfg.number_types, 1..)?;

        let mut grid = Grid::new(cfg.width, cfg.height);

        let n_cells = (cfg.width * cfg.height) as f64;
        let n_agt = (cfg.population_density * n_cells).floor() as usize;
        let n_agt_per_type = n_agt / cfg.number_types;
        for kind in 0..cfg.number_types {
            for _ in 0..n_agt_per_type {
                let agent = Agent::new(kind, cfg.happiness_threshold);
                let location = grid.random_empty_location(&mut rng)?;
                grid.place(agent, location)?;
            }
        }
        log::debug!(
            "placed {n_agt_per_type} agents of each of {} types",
            cfg.number_types
        );

        Ok(Self { grid, rng })
    }

    /// Create a `Simulation` over an already populated grid.
    pub fn from_grid(grid: Grid, rng: ChaCha12Rng) -> Self {
        Self { grid, rng }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Evaluate one randomly chosen agent and relocate it if it is unhappy.
    ///
    /// Returns `None` when the agent stays put (or there are no agents at all).
    /// An unhappy agent always moves: to the first empty cell where it would be
    /// happy, scanning empty cells in random order, or else to the last cell scanned.
    ///
    /// # Errors
    /// Returns [`Error::NoEmptyLocation`] if an unhappy agent finds no empty cell,
    /// and propagates grid errors, which indicate corrupted bookkeeping.
    pub fn update(&mut self) -> Result<Option<Relocation>, Error> {
        let Some(from) = self.grid.random_occupied_location(&mut self.rng) else {
            return Ok(None);
        };
        let agent = *self.grid.get(from).ok_or(Error::EmptyLocation(from))?;

        if agent.is_happy(&self.neighbor_types(from)) {
            return Ok(None);
        }

        let to = self.find_new_location(&agent)?;
        self.grid.relocate(from, to)?;
        log::trace!("moved agent of type {} from {from} to {to}", agent.kind());

        Ok(Some(Relocation { from, to }))
    }

    /// Types of the occupied cells around `coord`, in neighborhood order.
    pub fn neighbor_types(&self, coord: Coord) -> Vec<usize> {
        coord
            .neighbors()
            .filter(|&nbr| self.grid.is_valid(nbr))
            .filter_map(|nbr| self.grid.get(nbr).map(Agent::kind))
            .collect()
    }

    /// Check whether the agent at `coord` is happy there, `None` if the cell is empty.
    pub fn is_happy_at(&self, coord: Coord) -> Option<bool> {
        let agent = self.grid.get(coord)?;
        Some(agent.is_happy(&self.neighbor_types(coord)))
    }

    /// Snapshot of the agent types, row by row.
    pub fn type_map(&self) -> TypeMap {
        let (width, height) = (self.grid.width(), self.grid.height());
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.push(self.grid.get(Coord::new(x, y)).map(Agent::kind));
            }
        }
        TypeMap::new(width, height, cells)
    }

    fn find_new_location(&mut self, agent: &Agent) -> Result<Coord, Error> {
        let mut candidates = self.grid.empty_locations();
        candidates.shuffle(&mut self.rng);

        let mut last_checked = None;
        for candidate in candidates {
            last_checked = Some(candidate);
            if agent.is_happy(&self.neighbor_types(candidate)) {
                return Ok(candidate);
            }
        }

        last_checked.ok_or(Error::NoEmptyLocation)
    }
}

fn check_param<T, R>(name: &str, value: T, range: R) -> Result<(), Error>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&value) {
        return Err(Error::Configuration(format!(
            "{name} must be in the range {range:?}, but is {value:?}"
        )));
    }
    Ok(())
}
