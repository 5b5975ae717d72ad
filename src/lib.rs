//! Domain-decomposed molecular dynamics: the box is split across rank
//! threads, each rank keeps a halo of ghost atoms, builds neighbor lists
//! over owned + ghost atoms and exchanges per-atom state with its face
//! neighbors every step.

pub mod atoms;
pub mod compute;
pub mod config;
pub mod domain;
pub mod error;
pub mod integrators;
pub mod lattice;
pub mod logging;
pub mod neighbor;
pub mod output;
pub mod parallel;
pub mod plugin;
pub mod prelude;
pub mod region;
pub mod registry;
pub mod simulation;
pub mod styles;
pub mod utils;

pub use error::Error;
pub use simulation::{RunSummary, Simulation, Stage};
