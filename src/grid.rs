//! Spatial occupancy of the simulation.

use crate::error::Error;
use crate::model::Agent;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell coordinate, `x` is the column and `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The 8 surrounding coordinates in row-major order, possibly out of bounds.
    pub fn neighbors(self) -> impl Iterator<Item = Coord> {
        NEIGHBOR_OFFSETS
            .into_iter()
            .map(move |(dy, dx)| Coord::new(self.x + dx, self.y + dy))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Neighborhood offsets as `(dy, dx)` pairs.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Set of cell indices with O(1) insertion, removal and uniform sampling.
#[derive(Debug, Clone)]
struct CellSet {
    members: Vec<usize>,
    slots: Vec<Option<usize>>,
}

impl CellSet {
    fn with_cells(n_cells: usize) -> Self {
        Self {
            members: Vec::with_capacity(n_cells),
            slots: vec![None; n_cells],
        }
    }

    fn contains(&self, idx: usize) -> bool {
        self.slots[idx].is_some()
    }

    fn insert(&mut self, idx: usize) {
        if self.contains(idx) {
            return;
        }
        self.slots[idx] = Some(self.members.len());
        self.members.push(idx);
    }

    fn remove(&mut self, idx: usize) {
        let Some(slot) = self.slots[idx].take() else {
            return;
        };
        self.members.swap_remove(slot);
        // The former last member now sits in the vacated slot.
        if let Some(&moved) = self.members.get(slot) {
            self.slots[moved] = Some(slot);
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }
}

/// Rectangular grid holding at most one agent per cell.
///
/// Besides the cell array, the grid keeps the sets of empty and occupied
/// cells, which always partition the whole grid. Both sets are updated on
/// every [`Grid::place`] and [`Grid::relocate`].
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Option<Agent>>,
    empty: CellSet,
    occupied: CellSet,
}

impl Grid {
    /// Create an empty grid of `width x height` cells.
    pub fn new(width: usize, height: usize) -> Self {
        let n_cells = width * height;
        let mut empty = CellSet::with_cells(n_cells);
        for idx in 0..n_cells {
            empty.insert(idx);
        }
        Self {
            width,
            height,
            cells: vec![None; n_cells],
            empty,
            occupied: CellSet::with_cells(n_cells),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Check whether `coord` lies inside the grid.
    pub fn is_valid(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    /// Check whether the cell at `coord` holds an agent.
    ///
    /// # Panics
    /// Panics if `coord` is outside the grid. Callers check [`Grid::is_valid`] first.
    pub fn is_occupied(&self, coord: Coord) -> bool {
        self.cells[self.index(coord)].is_some()
    }

    /// Get the agent at `coord`, if any.
    ///
    /// # Panics
    /// Panics if `coord` is outside the grid.
    pub fn get(&self, coord: Coord) -> Option<&Agent> {
        self.cells[self.index(coord)].as_ref()
    }

    /// Put `agent` on the empty cell at `coord`.
    ///
    /// # Errors
    /// Returns [`Error::OccupiedLocation`] if the cell already holds an agent.
    pub fn place(&mut self, agent: Agent, coord: Coord) -> Result<(), Error> {
        let idx = self.index(coord);
        if self.cells[idx].is_some() {
            return Err(Error::OccupiedLocation(coord));
        }
        self.cells[idx] = Some(agent);
        self.empty.remove(idx);
        self.occupied.insert(idx);
        Ok(())
    }

    /// Move the agent at `from` to the empty cell at `to`.
    ///
    /// Both preconditions are checked before anything is modified.
    ///
    /// # Errors
    /// Returns [`Error::EmptyLocation`] if `from` holds no agent
    /// and [`Error::OccupiedLocation`] if `to` already holds one.
    pub fn relocate(&mut self, from: Coord, to: Coord) -> Result<(), Error> {
        let i_from = self.index(from);
        let i_to = self.index(to);
        if self.cells[i_from].is_none() {
            return Err(Error::EmptyLocation(from));
        }
        if self.cells[i_to].is_some() {
            return Err(Error::OccupiedLocation(to));
        }

        self.cells[i_to] = self.cells[i_from].take();
        self.occupied.remove(i_from);
        self.empty.insert(i_from);
        self.empty.remove(i_to);
        self.occupied.insert(i_to);
        Ok(())
    }

    /// Sample a uniformly random empty cell.
    ///
    /// # Errors
    /// Returns [`Error::NoEmptyLocation`] if every cell is occupied.
    pub fn random_empty_location<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Coord, Error> {
        self.empty
            .members
            .choose(rng)
            .map(|&idx| self.coord(idx))
            .ok_or(Error::NoEmptyLocation)
    }

    /// Sample a uniformly random occupied cell, `None` if the grid holds no agents.
    pub fn random_occupied_location<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Coord> {
        self.occupied
            .members
            .choose(rng)
            .map(|&idx| self.coord(idx))
    }

    /// Empty cells, in the internal set order.
    pub fn empty_locations(&self) -> Vec<Coord> {
        self.empty.members.iter().map(|&idx| self.coord(idx)).collect()
    }

    /// Occupied cells, in the internal set order.
    pub fn occupied_locations(&self) -> Vec<Coord> {
        self.occupied
            .members
            .iter()
            .map(|&idx| self.coord(idx))
            .collect()
    }

    pub fn n_empty(&self) -> usize {
        self.empty.len()
    }

    pub fn n_occupied(&self) -> usize {
        self.occupied.len()
    }

    fn index(&self, coord: Coord) -> usize {
        assert!(self.is_valid(coord), "location {coord} is outside the grid");
        coord.y as usize * self.width + coord.x as usize
    }

    fn coord(&self, idx: usize) -> Coord {
        Coord::new((idx % self.width) as i32, (idx / self.width) as i32)
    }

    /// Panic unless the cell array and both cell sets agree.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        let n_cells = self.width * self.height;
        assert_eq!(self.empty.len() + self.occupied.len(), n_cells);
        for (idx, cell) in self.cells.iter().enumerate() {
            assert_eq!(self.occupied.contains(idx), cell.is_some(), "cell {idx}");
            assert_eq!(self.empty.contains(idx), cell.is_none(), "cell {idx}");
        }
        for (slot, &idx) in self.empty.members.iter().enumerate() {
            assert_eq!(self.empty.slots[idx], Some(slot));
        }
        for (slot, &idx) in self.occupied.members.iter().enumerate() {
            assert_eq!(self.occupied.slots[idx], Some(slot));
        }
    }
}
