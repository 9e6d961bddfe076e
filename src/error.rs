//! Errors raised by the grid and the simulation core.

use crate::grid::Coord;
use thiserror::Error;

/// Failure of a grid or simulation operation.
///
/// [`Error::Configuration`] is the only variant expected in normal use.
/// The location variants signal broken occupancy bookkeeping and should propagate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("location {0} is occupied")]
    OccupiedLocation(Coord),

    #[error("location {0} is empty")]
    EmptyLocation(Coord),

    #[error("no empty location available")]
    NoEmptyLocation,
}
