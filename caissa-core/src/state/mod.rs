//! Board-controller state

mod controller;

pub use controller::{BoardAction, BoardActions, BoardController};
