//! Wire protocol between the board controller, the motion controller and
//! the remote game server.
//!
//! # Serial protocol
//!
//! The two controllers exchange plain-text lines over a point-to-point
//! UART link. Every message is a single newline-terminated line:
//!
//! ```text
//! board -> motion    e2-e4                      execute this move
//! motion -> board    MAGNET_ON / MAGNET_OFF    request magnet state change
//! board -> motion    MAGNET_READY / MAGNET_OFF_READY   acknowledge it
//! motion -> board    REQUEST_BOARD_STATE        ask for an occupancy snapshot
//! board -> motion    BOARD_STATE:<64 x 0/1>     snapshot (a1 first, h8 last)
//! board -> motion    SENSORS_DISABLED           snapshot unavailable
//! board -> motion    RESET                      soft reset request
//! motion -> board    MOTION_RESET_COMPLETE      reset done
//! either direction   PROBE / READY              liveness self-test
//! motion -> board    FAULT:<code>               status line
//! ```
//!
//! Unknown lines parse to an error and are discarded by the receiver.
//! Acknowledgement lines have their own message variants - they can never
//! be mistaken for a move by a well-typed receiver.
//!
//! # Game-server contract
//!
//! The board controller polls the game server for the opponent's move and
//! posts physically detected moves back. Both payloads are small JSON
//! objects, see [`server`].

#![no_std]
#![deny(unsafe_code)]

pub mod line;
pub mod messages;
pub mod moves;
pub mod server;

pub use line::{LineReader, MAX_LINE_LEN};
pub use messages::{BoardMessage, FaultCode, MotionMessage, ParseError};
pub use moves::{Move, MoveFormatError, Square};
pub use server::{MoveReport, PollResponse};
