//! Schelling's model of residential segregation.
//!
//! Agents of several types live on a rectangular grid and move to another
//! empty cell when too few of their neighbors share their type.
//! [`simulation::Simulation`] drives the model one agent at a time;
//! [`manager::Manager`] runs, saves and analyzes whole trajectories.

pub mod analysis;
pub mod config;
pub mod error;
pub mod grid;
pub mod manager;
pub mod model;
pub mod simulation;
pub mod stats;
