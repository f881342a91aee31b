//! Horde Simulation Library
//!
//! Decision core for a 2D survival shoot-em-up: per-enemy finite-state AI
//! with boss phases, projectiles whose behaviors are composed from trait
//! objects, and same-kind separation. A reference tick driver
//! (`game::simulation::Simulation`) runs it end to end.

pub mod config;
pub mod game;
pub mod metrics;
pub mod util;
