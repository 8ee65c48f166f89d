//! Hardware sensor matrix over the shared multiplexer bus.
//!
//! Four 16-channel analog multiplexers share one 4-bit channel-select
//! bus; each mux output is wired to its own GPIO input. Selecting a
//! channel needs a short settle delay before the level is valid.

use embassy_rp::gpio::{Input, Level, Output};
use embassy_time::{block_for, Duration};

use caissa_core::sensing::MuxAddress;
use caissa_core::traits::SensorMatrix;

/// Settle time after switching the select bus.
const SETTLE_US: u64 = 5;

/// GPIO-driven 4x16 multiplexed hall-sensor array.
pub struct MuxMatrix<'d> {
    select: [Output<'d>; 4],
    inputs: [Input<'d>; 4],
}

impl<'d> MuxMatrix<'d> {
    pub fn new(select: [Output<'d>; 4], inputs: [Input<'d>; 4]) -> Self {
        Self { select, inputs }
    }
}

impl SensorMatrix for MuxMatrix<'_> {
    fn read(&mut self, addr: MuxAddress) -> bool {
        for (bit, pin) in self.select.iter_mut().enumerate() {
            pin.set_level(Level::from(addr.channel & (1 << bit) != 0));
        }
        block_for(Duration::from_micros(SETTLE_US));
        self.inputs[addr.mux as usize].is_high()
    }
}
