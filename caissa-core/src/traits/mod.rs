//! Hardware abstraction traits
//!
//! The firmware crates implement these over their GPIO/peripheral
//! layers; everything above them stays board-agnostic and host-testable.

mod actuation;
mod sensing;

pub use actuation::MagnetPin;
pub use sensing::SensorMatrix;
