use crate::grid::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resident of the grid.
///
/// Type and threshold are fixed for the whole run; the position is only known to the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    kind: usize,
    happiness_threshold: f64,
}

impl Agent {
    pub fn new(kind: usize, happiness_threshold: f64) -> Self {
        Self {
            kind,
            happiness_threshold,
        }
    }

    pub fn kind(&self) -> usize {
        self.kind
    }

    pub fn happiness_threshold(&self) -> f64 {
        self.happiness_threshold
    }

    /// Check whether the agent is happy among neighbors of the given types.
    ///
    /// An agent without neighbors is never happy, whatever its threshold.
    pub fn is_happy(&self, neighbor_types: &[usize]) -> bool {
        if neighbor_types.is_empty() {
            return false;
        }
        let n_same = neighbor_types.iter().filter(|&&kind| kind == self.kind).count();
        n_same as f64 / neighbor_types.len() as f64 >= self.happiness_threshold
    }
}

/// Snapshot of agent types over the grid, `None` marks an empty cell.
///
/// Cells are stored row by row. Deserialization rejects a cell count
/// that does not match the dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTypeMap")]
pub struct TypeMap {
    width: usize,
    height: usize,
    cells: Vec<Option<usize>>,
}

impl TypeMap {
    pub fn new(width: usize, height: usize, cells: Vec<Option<usize>>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Type at `coord`, `None` if the cell is empty or outside the map.
    pub fn get(&self, coord: Coord) -> Option<usize> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y * self.width + x]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<usize>]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Occupied cells with their types, row by row.
    pub fn occupied(&self) -> impl Iterator<Item = (Coord, usize)> + '_ {
        self.cells.iter().enumerate().filter_map(|(idx, cell)| {
            cell.map(|kind| {
                let coord = Coord::new((idx % self.width) as i32, (idx / self.width) as i32);
                (coord, kind)
            })
        })
    }

    pub fn n_occupied(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Types of the occupied neighbors of `coord`, in neighborhood order.
    pub fn neighbor_types(&self, coord: Coord) -> Vec<usize> {
        coord.neighbors().filter_map(|nbr| self.get(nbr)).collect()
    }
}

#[derive(Deserialize)]
struct RawTypeMap {
    width: usize,
    height: usize,
    cells: Vec<Option<usize>>,
}

impl TryFrom<RawTypeMap> for TypeMap {
    type Error = String;

    fn try_from(raw: RawTypeMap) -> Result<Self, Self::Error> {
        let n_cells = raw.width.checked_mul(raw.height);
        if n_cells != Some(raw.cells.len()) {
            return Err(format!(
                "type map of {}x{} cells cannot hold {} cells",
                raw.width,
                raw.height,
                raw.cells.len()
            ));
        }
        Ok(Self {
            width: raw.width,
            height: raw.height,
            cells: raw.cells,
        })
    }
}

impl fmt::Display for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for cell in row {
                let symbol = match cell {
                    Some(kind) => u32::try_from(*kind)
                        .ok()
                        .and_then(|kind| char::from_digit(kind, 36))
                        .unwrap_or('?'),
                    None => '•',
                };
                write!(f, "{symbol}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Saved state of the simulation after a given number of steps.
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    /// Number of updates performed so far.
    pub step: usize,

    /// Relocations since the previous frame.
    pub n_moves: usize,

    pub type_map: TypeMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lonely_agent_is_unhappy() {
        assert!(!Agent::new(0, 0.0).is_happy(&[]));
        assert!(!Agent::new(1, 1.0).is_happy(&[]));
    }

    #[test]
    fn threshold_is_inclusive() {
        let agent = Agent::new(0, 0.5);
        assert!(agent.is_happy(&[0, 1]));
        assert!(agent.is_happy(&[1, 0, 0, 1]));
        assert!(!agent.is_happy(&[0, 1, 1]));

        let agent = Agent::new(2, 1.0 / 3.0);
        assert!(agent.is_happy(&[2, 0, 1]));
        assert!(!agent.is_happy(&[0, 1, 1, 2]));
    }

    #[test]
    fn zero_threshold_accepts_any_company() {
        let agent = Agent::new(0, 0.0);
        assert!(agent.is_happy(&[1, 1, 1]));
    }

    #[test]
    fn type_map_renders_rows() {
        let map = TypeMap::new(3, 2, vec![Some(0), None, Some(1), None, Some(11), None]);
        assert_eq!(map.to_string(), "0•1\n•b•\n");
        assert_eq!(map.n_occupied(), 3);
        assert_eq!(map.rows().count(), 2);
    }

    #[test]
    fn decoding_checks_cell_count() {
        let map = TypeMap::new(2, 2, vec![Some(0), None, None, Some(1)]);
        let bytes = rmp_serde::to_vec(&map).unwrap();
        let decoded: TypeMap = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, map);

        let short = TypeMap {
            width: 3,
            height: 2,
            cells: vec![None; 4],
        };
        let bytes = rmp_serde::to_vec(&short).unwrap();
        assert!(rmp_serde::from_slice::<TypeMap>(&bytes).is_err());

        let zero_width = TypeMap {
            width: 0,
            height: 2,
            cells: vec![Some(0)],
        };
        let bytes = rmp_serde::to_vec(&zero_width).unwrap();
        assert!(rmp_serde::from_slice::<TypeMap>(&bytes).is_err());
    }

    #[test]
    fn type_map_neighbors_skip_outside_cells() {
        let map = TypeMap::new(2, 2, vec![Some(0), Some(1), None, Some(1)]);
        assert_eq!(map.neighbor_types(Coord::new(0, 0)), vec![1, 1]);
        assert_eq!(map.neighbor_types(Coord::new(0, 1)), vec![0, 1, 1]);
        assert_eq!(map.get(Coord::new(2, 0)), None);
    }
}
