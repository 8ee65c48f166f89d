//! Electromagnet output pin.

use embassy_rp::gpio::Output;

use caissa_core::traits::MagnetPin;

/// GPIO-driven magnet power output (high = energized).
pub struct Magnet<'d> {
    pin: Output<'d>,
}

impl<'d> Magnet<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl MagnetPin for Magnet<'_> {
    fn set_engaged(&mut self, engaged: bool) {
        if engaged {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_engaged(&self) -> bool {
        self.pin.is_set_high()
    }
}
