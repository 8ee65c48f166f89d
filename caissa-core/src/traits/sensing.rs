//! Sensor matrix seam

use crate::sensing::MuxAddress;

/// One multiplexed hall-sensor array.
///
/// Implementations select the channel on the shared address bus, allow
/// for settling, and sample the chosen mux output as a boolean level
/// (true = piece present).
pub trait SensorMatrix {
    fn read(&mut self, addr: MuxAddress) -> bool;
}
