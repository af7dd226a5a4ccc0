//! Core types shared by the wind fields, the engine and the aggregator

pub mod trajectory;
pub mod units;
pub mod vec2;

pub use trajectory::{Ensemble, Trajectory};
pub use units::{DegreesPerHour, MetersPerSecond};
pub use vec2::Vec2;
