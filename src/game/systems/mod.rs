pub mod ai;
pub mod avoidance;
pub mod boss;
pub mod projectile;
pub mod tuning;
