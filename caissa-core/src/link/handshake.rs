//! Magnet handshake tracking (motion-controller side).
//!
//! Every piece-dragging leg is bracketed by the handshake: the motion
//! controller requests `MAGNET_ON`, waits for `MAGNET_READY`, steps,
//! requests `MAGNET_OFF`, waits for `MAGNET_OFF_READY`. Each wait is
//! bounded; a missing acknowledgement aborts the move instead of
//! stalling the control loop.

use caissa_protocol::{BoardMessage, MotionMessage};

/// Which magnet transition is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeKind {
    /// `MAGNET_ON`, acknowledged by `MAGNET_READY`
    Engage,
    /// `MAGNET_OFF`, acknowledged by `MAGNET_OFF_READY`
    Release,
}

/// Handshake tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeState {
    Idle,
    AwaitingAck {
        kind: HandshakeKind,
        since_ms: u32,
    },
}

/// The acknowledgement never arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeError {
    pub kind: HandshakeKind,
}

/// Request/acknowledge tracker for the magnet handshake.
#[derive(Debug, Clone)]
pub struct MagnetHandshake {
    state: HandshakeState,
    timeout_ms: u32,
}

impl MagnetHandshake {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            state: HandshakeState::Idle,
            timeout_ms,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == HandshakeState::Idle
    }

    /// Open a request, returning the line to send.
    pub fn request(&mut self, kind: HandshakeKind, now_ms: u32) -> MotionMessage {
        self.state = HandshakeState::AwaitingAck { kind, since_ms: now_ms };
        match kind {
            HandshakeKind::Engage => MotionMessage::MagnetOn,
            HandshakeKind::Release => MotionMessage::MagnetOff,
        }
    }

    /// Feed an inbound line; returns true when it resolves the pending
    /// request. Non-matching acknowledgements are ignored.
    pub fn on_board_message(&mut self, msg: &BoardMessage) -> bool {
        let HandshakeState::AwaitingAck { kind, .. } = self.state else {
            return false;
        };
        let resolved = matches!(
            (kind, msg),
            (HandshakeKind::Engage, BoardMessage::MagnetReady)
                | (HandshakeKind::Release, BoardMessage::MagnetOffReady)
        );
        if resolved {
            self.state = HandshakeState::Idle;
        }
        resolved
    }

    /// Check the acknowledgement budget.
    ///
    /// On timeout the tracker resets to idle so the magnet can be
    /// commanded back to a safe state; the caller aborts the move and
    /// surfaces the fault.
    pub fn poll(&mut self, now_ms: u32) -> Result<(), HandshakeError> {
        if let HandshakeState::AwaitingAck { kind, since_ms } = self.state {
            if now_ms.wrapping_sub(since_ms) >= self.timeout_ms {
                self.state = HandshakeState::Idle;
                return Err(HandshakeError { kind });
            }
        }
        Ok(())
    }

    /// Abandon any pending request (e.g. on a move abort).
    pub fn abort(&mut self) {
        self.state = HandshakeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_release_cycle() {
        let mut hs = MagnetHandshake::new(2_000);
        assert_eq!(hs.request(HandshakeKind::Engage, 0), MotionMessage::MagnetOn);
        assert!(!hs.is_idle());

        // Wrong ack is ignored.
        assert!(!hs.on_board_message(&BoardMessage::MagnetOffReady));
        assert!(!hs.is_idle());

        assert!(hs.on_board_message(&BoardMessage::MagnetReady));
        assert!(hs.is_idle());

        assert_eq!(
            hs.request(HandshakeKind::Release, 100),
            MotionMessage::MagnetOff
        );
        assert!(hs.on_board_message(&BoardMessage::MagnetOffReady));
        assert!(hs.is_idle());
    }

    #[test]
    fn test_timeout_resets_to_idle() {
        let mut hs = MagnetHandshake::new(2_000);
        hs.request(HandshakeKind::Engage, 0);
        assert!(hs.poll(1_999).is_ok());
        let err = hs.poll(2_000).unwrap_err();
        assert_eq!(err.kind, HandshakeKind::Engage);
        assert!(hs.is_idle());
        // Subsequent polls are clean.
        assert!(hs.poll(3_000).is_ok());
    }

    #[test]
    fn test_ack_without_request_ignored() {
        let mut hs = MagnetHandshake::new(2_000);
        assert!(!hs.on_board_message(&BoardMessage::MagnetReady));
        assert!(hs.is_idle());
    }

    #[test]
    fn test_abort_clears_pending() {
        let mut hs = MagnetHandshake::new(2_000);
        hs.request(HandshakeKind::Release, 0);
        hs.abort();
        assert!(hs.is_idle());
        assert!(hs.poll(10_000).is_ok());
    }
}
