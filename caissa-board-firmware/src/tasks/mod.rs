//! Embassy tasks for the board controller

pub mod net;
pub mod sensing;
pub mod serial;

pub use net::net_task;
pub use sensing::sensing_task;
pub use serial::{serial_rx_task, serial_tx_task};
