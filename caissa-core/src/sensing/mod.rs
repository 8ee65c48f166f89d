//! Hall-sensor matrix scanning and debounce

mod debounce;
mod matrix;

pub use debounce::{SensorCell, SensorGrid, Transition, TransitionKind};
pub use matrix::{MuxAddress, CELL_COUNT, MUX_CHANNELS, MUX_COUNT};
