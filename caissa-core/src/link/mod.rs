//! Inter-controller handshake and wireless link health

mod handshake;
mod monitor;

pub use handshake::{HandshakeError, HandshakeKind, HandshakeState, MagnetHandshake};
pub use monitor::{LinkMonitor, LinkStatus};
