//! Board-agnostic core logic for the Caissa chessboard bridge
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (sensor matrix, magnet output)
//! - Sensor debounce and occupancy tracking
//! - Lift/place move detection state machine
//! - Coordinate mapping, path planning and step interpolation
//! - Homing sequencer
//! - Magnet handshake and wireless link monitoring
//! - Board-controller state object
//! - Configuration type definitions

#![no_std]
#![deny(unsafe_code)]

pub mod board;
pub mod config;
pub mod link;
pub mod motion;
pub mod moves;
pub mod sensing;
pub mod state;
pub mod traits;
