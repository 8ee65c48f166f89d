//! Move execution sequencer (motion-controller side).
//!
//! Drives one requested move through its full lifecycle: occupancy sync
//! with the board controller, capture removal, and the magnet-bracketed
//! legs of the planned route. The sequencer is event-driven - the
//! control loop performs the returned actions (serial sends, free
//! travel, dragging legs) and reports back when a leg finishes. Every
//! wait is bounded; a timeout aborts the move, releases the magnet and
//! surfaces a fault instead of stalling.

use heapless::Vec;

use caissa_protocol::{BoardMessage, FaultCode, MotionMessage, Move};

use crate::board::Occupancy;
use crate::config::MotionConfig;
use crate::link::{HandshakeKind, MagnetHandshake};
use crate::motion::mapper::{BoardPosition, CoordinateMapper, GridPos};
use crate::motion::planner::{Leg, MovePlan, PathPlanner, PlanError, Route};

/// Actions the control loop performs on behalf of the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionAction {
    /// Write a line to the board controller
    Send(MotionMessage),
    /// Move the head (magnet off, no handshake) to an absolute position
    TravelTo(GridPos),
    /// Drag the engaged piece along one leg
    DragLeg(Leg),
}

/// At most two actions result from any one event.
pub type Actions = Vec<MotionAction, 2>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Awaiting the occupancy snapshot reply
    Sync { since_ms: u32 },
    /// Free-moving to the start of a route
    Traveling,
    /// Awaiting `MAGNET_READY`
    Engaging,
    /// Dragging the current leg
    Dragging,
    /// Awaiting `MAGNET_OFF_READY`
    Releasing,
}

/// Executes planned moves leg by leg.
#[derive(Debug, Clone)]
pub struct MoveExecutor {
    planner: PathPlanner,
    handshake: MagnetHandshake,
    occupancy: Occupancy,
    position: BoardPosition,
    phase: Phase,
    sync_timeout_ms: u32,
    /// Move requested but not yet planned (waiting for sync)
    requested: Option<Move>,
    /// The plan being executed
    plan: Option<MovePlan>,
    /// True while the removal route runs
    in_removal: bool,
    /// Leg index within the current route
    leg_index: usize,
    /// Last fully executed move, for duplicate suppression
    last_completed: Option<Move>,
}

impl MoveExecutor {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            planner: PathPlanner,
            handshake: MagnetHandshake::new(config.handshake_timeout_ms),
            occupancy: Occupancy::starting_position(),
            position: BoardPosition::unknown(),
            phase: Phase::Idle,
            sync_timeout_ms: config.sync_timeout_ms,
            requested: None,
            plan: None,
            in_removal: false,
            leg_index: 0,
            last_completed: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    pub fn position(&self) -> BoardPosition {
        self.position
    }

    /// Mark the gantry homed at the reference square.
    pub fn set_homed(&mut self) {
        self.position.set(CoordinateMapper::reference_position());
    }

    /// Reinitialize for a new game (soft reset).
    pub fn reset(&mut self) {
        self.handshake.abort();
        self.phase = Phase::Idle;
        self.requested = None;
        self.plan = None;
        self.occupancy = Occupancy::starting_position();
        self.last_completed = None;
    }

    /// A move line arrived from the board controller.
    ///
    /// Duplicate consecutive commands are suppressed; a busy sequencer
    /// ignores new requests entirely.
    pub fn start_move(&mut self, mv: Move, now_ms: u32) -> Actions {
        let mut actions = Actions::new();
        if self.phase != Phase::Idle || !self.position.is_homed() {
            return actions;
        }
        if self.last_completed == Some(mv) {
            // The same move twice in a row is a no-op, not a re-run.
            return actions;
        }
        self.requested = Some(mv);
        self.phase = Phase::Sync { since_ms: now_ms };
        let _ = actions.push(MotionAction::Send(MotionMessage::RequestBoardState));
        actions
    }

    /// A line from the board controller arrived.
    pub fn on_message(&mut self, msg: &BoardMessage, now_ms: u32) -> Actions {
        match (self.phase, msg) {
            (Phase::Sync { .. }, BoardMessage::BoardState(bits)) => {
                // Live sensor truth wins over the model.
                self.occupancy = Occupancy::from_bits(*bits);
                self.plan_and_go()
            }
            (Phase::Sync { .. }, BoardMessage::SensorsDisabled) => {
                // Keep the model maintained from executed moves.
                self.plan_and_go()
            }
            (Phase::Engaging, BoardMessage::MagnetReady) => {
                if self.handshake.on_board_message(msg) {
                    self.phase = Phase::Dragging;
                    let mut actions = Actions::new();
                    if let Some(leg) = self.current_leg() {
                        let _ = actions.push(MotionAction::DragLeg(leg));
                    }
                    actions
                } else {
                    Actions::new()
                }
            }
            (Phase::Releasing, BoardMessage::MagnetOffReady) => {
                if self.handshake.on_board_message(msg) {
                    self.advance_leg(now_ms)
                } else {
                    Actions::new()
                }
            }
            _ => Actions::new(),
        }
    }

    /// The control loop finished the last `TravelTo` or `DragLeg`.
    pub fn leg_complete(&mut self, now_ms: u32) -> Actions {
        match self.phase {
            Phase::Traveling => self.engage(now_ms),
            Phase::Dragging => {
                self.phase = Phase::Releasing;
                let msg = self.handshake.request(HandshakeKind::Release, now_ms);
                one(MotionAction::Send(msg))
            }
            _ => Actions::new(),
        }
    }

    /// Check timeout budgets. Call every control-loop cycle.
    pub fn poll(&mut self, now_ms: u32) -> Actions {
        match self.phase {
            Phase::Sync { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= self.sync_timeout_ms {
                    return self.abort(FaultCode::SyncTimeout);
                }
                Actions::new()
            }
            Phase::Engaging | Phase::Releasing => {
                if self.handshake.poll(now_ms).is_err() {
                    return self.abort(FaultCode::HandshakeTimeout);
                }
                Actions::new()
            }
            _ => Actions::new(),
        }
    }

    /// Plan the requested move and start its first route.
    fn plan_and_go(&mut self) -> Actions {
        let Some(mv) = self.requested else {
            self.phase = Phase::Idle;
            return Actions::new();
        };
        match self.planner.plan(mv, &self.occupancy) {
            Ok(plan) => {
                self.in_removal = plan.removal.is_some();
                self.leg_index = 0;
                let start = self.current_route_start(&plan);
                self.plan = Some(plan);
                self.phase = Phase::Traveling;
                one(MotionAction::TravelTo(start))
            }
            Err(PlanError::UnsupportedShape) => {
                self.requested = None;
                self.phase = Phase::Idle;
                one(MotionAction::Send(MotionMessage::Fault(
                    FaultCode::PlanRejected,
                )))
            }
        }
    }

    fn current_route_start(&self, plan: &MovePlan) -> GridPos {
        if self.in_removal {
            if let Some(removal) = &plan.removal {
                return removal.start;
            }
        }
        plan.main.start
    }

    fn current_route(&self) -> Option<&Route> {
        let plan = self.plan.as_ref()?;
        if self.in_removal {
            plan.removal.as_ref()
        } else {
            Some(&plan.main)
        }
    }

    fn current_leg(&self) -> Option<Leg> {
        self.current_route()
            .and_then(|route| route.legs.get(self.leg_index))
            .copied()
    }

    fn engage(&mut self, now_ms: u32) -> Actions {
        self.phase = Phase::Engaging;
        let msg = self.handshake.request(HandshakeKind::Engage, now_ms);
        one(MotionAction::Send(msg))
    }

    /// One leg fully released; move to the next leg, route or finish.
    fn advance_leg(&mut self, now_ms: u32) -> Actions {
        self.leg_index += 1;
        let legs_len = match self.current_route() {
            Some(route) => route.legs.len(),
            None => 0,
        };

        if self.leg_index < legs_len {
            return self.engage(now_ms);
        }

        if self.in_removal {
            // Removal done: the captured square is now empty; continue
            // with the main route.
            if let Some(mv) = self.requested {
                self.occupancy.apply_capture_removal(mv.to);
            }
            self.in_removal = false;
            self.leg_index = 0;
            let start = match self.plan.as_ref() {
                Some(plan) => plan.main.start,
                None => return Actions::new(),
            };
            self.phase = Phase::Traveling;
            return one(MotionAction::TravelTo(start));
        }

        // Whole move done.
        if let Some(mv) = self.requested.take() {
            self.occupancy.apply_move(mv);
            self.last_completed = Some(mv);
        }
        if let Some(plan) = self.plan.take() {
            self.position.set(plan.main.end());
        }
        self.phase = Phase::Idle;
        Actions::new()
    }

    /// Abort the move: magnet to a safe state, fault upward, idle.
    fn abort(&mut self, code: FaultCode) -> Actions {
        self.handshake.abort();
        self.phase = Phase::Idle;
        self.requested = None;
        self.plan = None;
        // A half-dragged piece leaves the model unreliable for the
        // aborted squares, but the head position is still commanded by
        // us; the next occupancy sync restores sensor truth.
        let mut actions = Actions::new();
        let _ = actions.push(MotionAction::Send(MotionMessage::MagnetOff));
        let _ = actions.push(MotionAction::Send(MotionMessage::Fault(code)));
        actions
    }
}

fn one(action: MotionAction) -> Actions {
    let mut actions = Actions::new();
    let _ = actions.push(action);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use caissa_protocol::Square;

    fn sq(s: &str) -> Square {
        let b = s.as_bytes();
        Square::parse(b[0], b[1]).unwrap()
    }

    fn mv(s: &str) -> Move {
        Move::parse(s).unwrap()
    }

    fn grid(s: &str) -> GridPos {
        CoordinateMapper::square_to_grid(sq(s))
    }

    fn homed_executor() -> MoveExecutor {
        let mut exec = MoveExecutor::new(&MotionConfig::default());
        exec.set_homed();
        exec
    }

    /// Drive one leg through engage -> drag -> release.
    fn run_leg(exec: &mut MoveExecutor, expected: Leg, now: &mut u32) {
        *now += 10;
        let actions = exec.on_message(&BoardMessage::MagnetReady, *now);
        assert_eq!(actions.as_slice(), &[MotionAction::DragLeg(expected)]);
        *now += 10;
        let actions = exec.leg_complete(*now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::MagnetOff)]
        );
        *now += 10;
    }

    #[test]
    fn test_not_homed_ignores_moves() {
        let mut exec = MoveExecutor::new(&MotionConfig::default());
        assert!(exec.start_move(mv("e2-e4"), 0).is_empty());
    }

    #[test]
    fn test_straight_move_full_sequence() {
        let mut exec = homed_executor();
        let mut now = 0;

        // Request triggers an occupancy sync first.
        let actions = exec.start_move(mv("e2-e4"), now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::RequestBoardState)]
        );

        // Snapshot arrives: plan and travel to the source square.
        now += 10;
        let snapshot = Occupancy::starting_position().bits();
        let actions = exec.on_message(&BoardMessage::BoardState(snapshot), now);
        assert_eq!(actions.as_slice(), &[MotionAction::TravelTo(grid("e2"))]);

        // Arrived: engage the magnet.
        now += 10;
        let actions = exec.leg_complete(now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::MagnetOn)]
        );

        // READY -> drag -> OFF -> OFF_READY completes the move.
        run_leg(&mut exec, Leg::new(0, 4), &mut now);
        let actions = exec.on_message(&BoardMessage::MagnetOffReady, now);
        assert!(actions.is_empty());
        assert!(exec.is_idle());

        // Occupancy and position are updated.
        assert!(!exec.occupancy().get(sq("e2")));
        assert!(exec.occupancy().get(sq("e4")));
        assert_eq!(exec.position().get(), Some(grid("e4")));
    }

    #[test]
    fn test_duplicate_move_is_noop() {
        let mut exec = homed_executor();
        let mut now = 0;

        exec.start_move(mv("e2-e4"), now);
        exec.on_message(&BoardMessage::SensorsDisabled, now);
        exec.leg_complete(now);
        run_leg(&mut exec, Leg::new(0, 4), &mut now);
        exec.on_message(&BoardMessage::MagnetOffReady, now);
        assert!(exec.is_idle());

        // Same command again: suppressed entirely.
        let actions = exec.start_move(mv("e2-e4"), now);
        assert!(actions.is_empty());
        assert!(exec.is_idle());

        // A different move still runs.
        let actions = exec.start_move(mv("d2-d4"), now);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_capture_removal_runs_first() {
        let mut exec = homed_executor();
        let mut now = 0;

        // e4 and d5 occupied; e4 captures d5.
        let mut board = Occupancy::empty();
        board.set(sq("e4"));
        board.set(sq("d5"));

        exec.start_move(mv("e4-d5"), now);
        let actions = exec.on_message(&BoardMessage::BoardState(board.bits()), now);
        // First travel goes to the captured piece, not the source.
        assert_eq!(actions.as_slice(), &[MotionAction::TravelTo(grid("d5"))]);

        // Removal route: two legs (to the top edge, then off board).
        let actions = exec.leg_complete(now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::MagnetOn)]
        );
        run_leg(&mut exec, Leg::new(0, 7), &mut now);
        let actions = exec.on_message(&BoardMessage::MagnetOffReady, now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::MagnetOn)]
        );
        run_leg(&mut exec, Leg::new(8, 0), &mut now);
        let actions = exec.on_message(&BoardMessage::MagnetOffReady, now);

        // Captured bit cleared before the main move starts.
        assert!(!exec.occupancy().get(sq("d5")));
        assert_eq!(actions.as_slice(), &[MotionAction::TravelTo(grid("e4"))]);

        // Main diagonal leg.
        let actions = exec.leg_complete(now);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::MagnetOn)]
        );
        run_leg(&mut exec, Leg::new(2, 2), &mut now);
        exec.on_message(&BoardMessage::MagnetOffReady, now);

        assert!(exec.is_idle());
        assert!(exec.occupancy().get(sq("d5")));
        assert!(!exec.occupancy().get(sq("e4")));
        assert_eq!(exec.occupancy().count(), 1);
    }

    #[test]
    fn test_handshake_timeout_aborts_with_fault() {
        let mut exec = homed_executor();
        let mut now = 0;

        exec.start_move(mv("e2-e4"), now);
        exec.on_message(&BoardMessage::SensorsDisabled, now);
        exec.leg_complete(now); // sends MAGNET_ON, awaiting READY

        now += 1_999;
        assert!(exec.poll(now).is_empty());
        now += 1;
        let actions = exec.poll(now);
        assert_eq!(
            actions.as_slice(),
            &[
                MotionAction::Send(MotionMessage::MagnetOff),
                MotionAction::Send(MotionMessage::Fault(FaultCode::HandshakeTimeout)),
            ]
        );
        assert!(exec.is_idle());
        // The move did not complete: occupancy unchanged.
        assert!(exec.occupancy().get(sq("e2")));
        assert!(!exec.occupancy().get(sq("e4")));
    }

    #[test]
    fn test_sync_timeout_aborts() {
        let mut exec = homed_executor();
        exec.start_move(mv("e2-e4"), 0);
        let actions = exec.poll(1_500);
        assert_eq!(
            actions.as_slice(),
            &[
                MotionAction::Send(MotionMessage::MagnetOff),
                MotionAction::Send(MotionMessage::Fault(FaultCode::SyncTimeout)),
            ]
        );
        assert!(exec.is_idle());
    }

    #[test]
    fn test_unsupported_shape_faults() {
        let mut exec = homed_executor();
        exec.start_move(mv("a1-b4"), 0);
        let actions = exec.on_message(&BoardMessage::SensorsDisabled, 0);
        assert_eq!(
            actions.as_slice(),
            &[MotionAction::Send(MotionMessage::Fault(
                FaultCode::PlanRejected
            ))]
        );
        assert!(exec.is_idle());
    }

    #[test]
    fn test_busy_executor_ignores_new_moves() {
        let mut exec = homed_executor();
        exec.start_move(mv("e2-e4"), 0);
        assert!(exec.start_move(mv("d2-d4"), 0).is_empty());
    }

    #[test]
    fn test_reset_reinitializes() {
        let mut exec = homed_executor();
        let mut now = 0;
        exec.start_move(mv("e2-e4"), now);
        exec.on_message(&BoardMessage::SensorsDisabled, now);
        exec.leg_complete(now);
        run_leg(&mut exec, Leg::new(0, 4), &mut now);
        exec.on_message(&BoardMessage::MagnetOffReady, now);

        exec.reset();
        assert!(exec.is_idle());
        assert_eq!(exec.occupancy(), Occupancy::starting_position());
        // Duplicate suppression history is gone: the same move runs again.
        assert_eq!(exec.start_move(mv("e2-e4"), now).len(), 1);
    }
}
