pub mod behaviors;
pub mod constants;
pub mod events;
pub mod simulation;
pub mod spatial;
pub mod state;
pub mod systems;
pub mod world;
