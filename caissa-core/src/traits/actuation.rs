//! Actuator seams

/// The electromagnet power output.
///
/// Lives on the board controller; the motion controller requests state
/// changes over the serial handshake and the bridge drives this pin.
pub trait MagnetPin {
    fn set_engaged(&mut self, engaged: bool);
    fn is_engaged(&self) -> bool;
}
