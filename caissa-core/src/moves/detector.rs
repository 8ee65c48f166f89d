//! Move detection state machine.
//!
//! Converts debounced lift/place transitions into candidate moves:
//!
//! ```text
//! Idle -> Lifted -> (emit | AwaitingConfirm) -> Idle
//! ```
//!
//! A lift opens a pending move; placing on a different square completes
//! the candidate; placing back on the origin cancels it; no placement
//! within the timeout discards it. At most one pending move exists at a
//! time, and a completed move is emitted exactly once.

use caissa_protocol::{Move, MoveFormatError, Square};

use crate::config::{ConfirmPolicy, DetectionConfig};
use crate::sensing::{Transition, TransitionKind};

/// A lift waiting for its matching place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingMove {
    /// Square the piece was lifted from
    pub from: Square,
    /// When the lift was observed (ms)
    pub started_at_ms: u32,
}

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectorState {
    /// No pending move
    Idle,
    /// Piece lifted, waiting for a placement
    Lifted(PendingMove),
    /// Candidate complete, held for the confirm trigger
    AwaitingConfirm(Move),
    /// Candidate piece lifted again (possible cancellation in progress)
    RevertingLift(Move),
}

/// Events produced by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectorEvent {
    /// A confirmed move, ready for the outbound queue
    MoveReady(Move),
    /// A candidate is waiting for the physical confirm trigger
    AwaitingConfirmation(Move),
    /// The piece went back to its origin square
    Cancelled(Square),
    /// No placement arrived within the timeout
    TimedOut(Square),
    /// A candidate failed move-format validation and was dropped
    FormatError(MoveFormatError),
}

/// Lift/place move detector.
#[derive(Debug, Clone)]
pub struct MoveDetector {
    state: DetectorState,
    config: DetectionConfig,
    /// Last emitted move, for duplicate suppression
    last_emitted: Option<Move>,
}

impl MoveDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            state: DetectorState::Idle,
            config,
            last_emitted: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether a pending move is live (between lift and place).
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            DetectorState::Lifted(_) | DetectorState::RevertingLift(_)
        )
    }

    /// Feed one debounced transition.
    pub fn on_transition(&mut self, t: Transition, _now_ms: u32) -> Option<DetectorEvent> {
        match (self.state, t.kind) {
            (DetectorState::Idle, TransitionKind::Lifted) => {
                self.state = DetectorState::Lifted(PendingMove {
                    from: t.square,
                    started_at_ms: t.at_ms,
                });
                None
            }
            // A placement with nothing pending carries no information
            // for move detection.
            (DetectorState::Idle, TransitionKind::Placed) => None,

            (DetectorState::Lifted(pending), TransitionKind::Placed) => {
                if t.square == pending.from {
                    // Piece put back where it came from.
                    self.state = DetectorState::Idle;
                    return Some(DetectorEvent::Cancelled(pending.from));
                }
                self.complete(pending.from, t.square)
            }
            // A second lift while one move is pending is ignored: exactly
            // one pending move may exist at a time.
            (DetectorState::Lifted(_), TransitionKind::Lifted) => None,

            (DetectorState::AwaitingConfirm(mv), TransitionKind::Lifted) => {
                if t.square == mv.to {
                    self.state = DetectorState::RevertingLift(mv);
                }
                None
            }
            (DetectorState::AwaitingConfirm(_), TransitionKind::Placed) => None,

            (DetectorState::RevertingLift(mv), TransitionKind::Placed) => {
                if t.square == mv.from {
                    // Pre-confirmation cancellation: piece returned home.
                    self.state = DetectorState::Idle;
                    return Some(DetectorEvent::Cancelled(mv.from));
                }
                if t.square == mv.to {
                    // Put back down; candidate unchanged.
                    self.state = DetectorState::AwaitingConfirm(mv);
                    return None;
                }
                // Placed somewhere else: the candidate destination moved.
                self.complete(mv.from, t.square)
            }
            (DetectorState::RevertingLift(_), TransitionKind::Lifted) => None,
        }
    }

    /// The physical confirm trigger fired.
    pub fn on_confirm(&mut self) -> Option<DetectorEvent> {
        if let DetectorState::AwaitingConfirm(mv) = self.state {
            self.state = DetectorState::Idle;
            return self.emit(mv);
        }
        None
    }

    /// Discard a pending lift that outlived the timeout.
    pub fn poll_timeout(&mut self, now_ms: u32) -> Option<DetectorEvent> {
        if let DetectorState::Lifted(pending) = self.state {
            if now_ms.wrapping_sub(pending.started_at_ms) >= self.config.move_timeout_ms {
                self.state = DetectorState::Idle;
                return Some(DetectorEvent::TimedOut(pending.from));
            }
        }
        None
    }

    /// Forget duplicate-suppression history (e.g. after a remote move).
    pub fn reset_history(&mut self) {
        self.last_emitted = None;
    }

    fn complete(&mut self, from: Square, to: Square) -> Option<DetectorEvent> {
        match Move::new(from, to) {
            Some(mv) => match self.config.confirm_policy {
                ConfirmPolicy::Auto => {
                    self.state = DetectorState::Idle;
                    self.emit(mv)
                }
                ConfirmPolicy::Manual => {
                    self.state = DetectorState::AwaitingConfirm(mv);
                    Some(DetectorEvent::AwaitingConfirmation(mv))
                }
            },
            None => {
                self.state = DetectorState::Idle;
                Some(DetectorEvent::FormatError(
                    MoveFormatError::IdenticalSquares,
                ))
            }
        }
    }

    fn emit(&mut self, mv: Move) -> Option<DetectorEvent> {
        if self.last_emitted == Some(mv) {
            // Duplicate sensor noise for the same square pair must not
            // re-enqueue the move.
            return None;
        }
        self.last_emitted = Some(mv);
        Some(DetectorEvent::MoveReady(mv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;

    fn sq(s: &str) -> Square {
        let b = s.as_bytes();
        Square::parse(b[0], b[1]).unwrap()
    }

    fn lift(square: &str, at_ms: u32) -> Transition {
        Transition {
            square: sq(square),
            kind: TransitionKind::Lifted,
            at_ms,
        }
    }

    fn place(square: &str, at_ms: u32) -> Transition {
        Transition {
            square: sq(square),
            kind: TransitionKind::Placed,
            at_ms,
        }
    }

    fn auto_detector() -> MoveDetector {
        MoveDetector::new(DetectionConfig {
            confirm_policy: ConfirmPolicy::Auto,
            ..DetectionConfig::default()
        })
    }

    fn manual_detector() -> MoveDetector {
        MoveDetector::new(DetectionConfig::default())
    }

    #[test]
    fn test_lift_place_yields_exactly_one_move() {
        let mut det = auto_detector();
        assert_eq!(det.on_transition(lift("e2", 0), 0), None);
        assert!(det.is_active());
        let event = det.on_transition(place("e4", 500), 500);
        assert_eq!(
            event,
            Some(DetectorEvent::MoveReady(Move::parse("e2-e4").unwrap()))
        );
        assert_eq!(det.state(), DetectorState::Idle);
    }

    #[test]
    fn test_replacing_piece_cancels() {
        let mut det = auto_detector();
        det.on_transition(lift("e2", 0), 0);
        let event = det.on_transition(place("e2", 300), 300);
        assert_eq!(event, Some(DetectorEvent::Cancelled(sq("e2"))));
        assert_eq!(det.state(), DetectorState::Idle);
    }

    #[test]
    fn test_timeout_discards_pending_move() {
        let mut det = auto_detector();
        det.on_transition(lift("e2", 0), 0);
        assert_eq!(det.poll_timeout(9_999), None);
        assert_eq!(det.poll_timeout(10_000), Some(DetectorEvent::TimedOut(sq("e2"))));
        assert_eq!(det.state(), DetectorState::Idle);
        // A later placement finds nothing pending.
        assert_eq!(det.on_transition(place("e4", 10_100), 10_100), None);
    }

    #[test]
    fn test_manual_policy_holds_for_confirmation() {
        let mut det = manual_detector();
        det.on_transition(lift("g1", 0), 0);
        let mv = Move::parse("g1-f3").unwrap();
        assert_eq!(
            det.on_transition(place("f3", 200), 200),
            Some(DetectorEvent::AwaitingConfirmation(mv))
        );
        assert_eq!(det.state(), DetectorState::AwaitingConfirm(mv));
        assert_eq!(det.on_confirm(), Some(DetectorEvent::MoveReady(mv)));
        assert_eq!(det.state(), DetectorState::Idle);
    }

    #[test]
    fn test_preconfirm_cancellation_by_returning_piece() {
        let mut det = manual_detector();
        det.on_transition(lift("g1", 0), 0);
        det.on_transition(place("f3", 200), 200);
        // Piece picked back up and returned home before confirmation.
        assert_eq!(det.on_transition(lift("f3", 400), 400), None);
        assert_eq!(
            det.on_transition(place("g1", 600), 600),
            Some(DetectorEvent::Cancelled(sq("g1")))
        );
        assert_eq!(det.on_confirm(), None);
    }

    #[test]
    fn test_candidate_destination_can_be_adjusted() {
        let mut det = manual_detector();
        det.on_transition(lift("g1", 0), 0);
        det.on_transition(place("f3", 200), 200);
        det.on_transition(lift("f3", 400), 400);
        let event = det.on_transition(place("h3", 600), 600);
        assert_eq!(
            event,
            Some(DetectorEvent::AwaitingConfirmation(
                Move::parse("g1-h3").unwrap()
            ))
        );
    }

    #[test]
    fn test_duplicate_emission_suppressed() {
        let mut det = auto_detector();
        det.on_transition(lift("e2", 0), 0);
        assert!(det.on_transition(place("e4", 100), 100).is_some());
        // Sensor noise replays the same pair.
        det.on_transition(lift("e2", 200), 200);
        assert_eq!(det.on_transition(place("e4", 300), 300), None);
        // A different move is not suppressed.
        det.on_transition(lift("d2", 400), 400);
        assert_eq!(
            det.on_transition(place("d4", 500), 500),
            Some(DetectorEvent::MoveReady(Move::parse("d2-d4").unwrap()))
        );
    }

    #[test]
    fn test_second_lift_ignored_while_pending() {
        let mut det = auto_detector();
        det.on_transition(lift("e2", 0), 0);
        assert_eq!(det.on_transition(lift("d2", 50), 50), None);
        // The original pending move still completes.
        assert_eq!(
            det.on_transition(place("e4", 100), 100),
            Some(DetectorEvent::MoveReady(Move::parse("e2-e4").unwrap()))
        );
    }
}
