//! The board controller's shared state object.
//!
//! Earlier firmware revisions of this class of system kept the
//! sensing-disabled flag, the last seen move and the occupancy authority
//! as free globals poked from both tasks; one of them re-parsed every
//! serial acknowledgement as a move and re-executed stale commands.
//! This object centralizes that state behind a synchronous event API:
//! the firmware wraps one instance in a mutex and both tasks go through
//! it.
//!
//! Serial input arrives pre-parsed as [`MotionMessage`], which has no
//! move-shaped variant - an acknowledgement cannot become a move here
//! by construction.

use heapless::Vec;

use caissa_protocol::{BoardMessage, MotionMessage, Move};

use crate::board::Occupancy;

/// Actions for the firmware tasks to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardAction {
    /// Write a line to the motion controller
    SendSerial(BoardMessage),
    /// Drive the electromagnet output pin
    SetMagnet(bool),
    /// Post a physically detected move to the game server
    PostMove(Move),
    /// Hand a status line to the sensing task
    QueueStatus(MotionMessage),
    /// The sensing task must rebuild its debounce baseline
    RequestRebaseline,
}

/// At most two actions result from any one event.
pub type BoardActions = Vec<BoardAction, 2>;

/// Centralized board-controller state.
#[derive(Debug, Clone)]
pub struct BoardController {
    /// While false, sensor transitions are motor noise, not human moves
    sensing_enabled: bool,
    /// Last move accepted from the server, for duplicate suppression
    last_remote: Option<Move>,
    /// The magnet has engaged since sensing was disabled: the frozen
    /// debounce snapshot no longer matches the physical board
    dragged_since_disable: bool,
}

impl Default for BoardController {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardController {
    pub const fn new() -> Self {
        Self {
            sensing_enabled: true,
            last_remote: None,
            dragged_since_disable: false,
        }
    }

    pub fn sensing_enabled(&self) -> bool {
        self.sensing_enabled
    }

    /// The server reported a move.
    ///
    /// Sensing is disabled before the move is forwarded so the sensor
    /// deltas produced by the motion controller dragging the piece over
    /// intermediate squares are not misread as a human move. The same
    /// move seen twice in a row is a no-op.
    pub fn on_remote_move(&mut self, mv: Move) -> BoardActions {
        let mut actions = BoardActions::new();
        if self.last_remote == Some(mv) {
            return actions;
        }
        self.last_remote = Some(mv);
        self.sensing_enabled = false;
        let _ = actions.push(BoardAction::SendSerial(BoardMessage::Move(mv)));
        actions
    }

    /// A parsed line arrived from the motion controller.
    ///
    /// The two magnet requests are acted on immediately; status and
    /// board-sync lines go to the sensing task; nothing here ever
    /// produces a move.
    pub fn on_motion_message(&mut self, msg: MotionMessage) -> BoardActions {
        let mut actions = BoardActions::new();
        match msg {
            MotionMessage::MagnetOn => {
                if !self.sensing_enabled {
                    self.dragged_since_disable = true;
                }
                let _ = actions.push(BoardAction::SetMagnet(true));
                let _ = actions.push(BoardAction::SendSerial(BoardMessage::MagnetReady));
            }
            MotionMessage::MagnetOff => {
                let _ = actions.push(BoardAction::SetMagnet(false));
                let _ = actions.push(BoardAction::SendSerial(BoardMessage::MagnetOffReady));
            }
            MotionMessage::RequestBoardState
            | MotionMessage::ResetComplete
            | MotionMessage::Ready
            | MotionMessage::Fault(_) => {
                let _ = actions.push(BoardAction::QueueStatus(msg));
            }
        }
        actions
    }

    /// The sensing side confirmed a physical move.
    pub fn on_detected_move(&mut self, mv: Move) -> BoardActions {
        let mut actions = BoardActions::new();
        let _ = actions.push(BoardAction::PostMove(mv));
        actions
    }

    /// The external resume trigger fired.
    ///
    /// Sensing re-enables only here, and only together with a fresh
    /// baseline scan: the net delta accumulated during motor dragging
    /// must not surface as transitions.
    pub fn on_resume_sensing(&mut self) -> BoardActions {
        let mut actions = BoardActions::new();
        self.sensing_enabled = true;
        self.dragged_since_disable = false;
        let _ = actions.push(BoardAction::RequestRebaseline);
        actions
    }

    /// Build the reply to `REQUEST_BOARD_STATE`.
    ///
    /// Sensor truth is authoritative while sensing runs, and stays
    /// authoritative after it is disabled up to the first magnet
    /// engagement: the debounce snapshot is frozen at that point and
    /// still matches the physical board. The motion controller asks
    /// exactly in that window, before it starts dragging. Once the
    /// magnet has engaged the snapshot is motor-noise territory and the
    /// motion controller keeps its own model.
    pub fn board_state_reply(&self, sensed: Occupancy) -> BoardMessage {
        if self.sensing_enabled || !self.dragged_since_disable {
            BoardMessage::BoardState(sensed.bits())
        } else {
            BoardMessage::SensorsDisabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;
    use crate::motion::{CoordinateMapper, MotionAction, MoveExecutor};
    use caissa_protocol::Square;

    fn mv(s: &str) -> Move {
        Move::parse(s).unwrap()
    }

    fn sq(s: &str) -> Square {
        let b = s.as_bytes();
        Square::parse(b[0], b[1]).unwrap()
    }

    #[test]
    fn test_remote_move_disables_sensing_and_forwards_once() {
        let mut ctrl = BoardController::new();
        assert!(ctrl.sensing_enabled());

        let actions = ctrl.on_remote_move(mv("e2-e4"));
        assert_eq!(
            actions.as_slice(),
            &[BoardAction::SendSerial(BoardMessage::Move(mv("e2-e4")))]
        );
        assert!(!ctrl.sensing_enabled());

        // Polling returns the same move until the opponent moves again:
        // forwarded exactly once.
        assert!(ctrl.on_remote_move(mv("e2-e4")).is_empty());

        let actions = ctrl.on_remote_move(mv("g8-f6"));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_magnet_requests_acted_on_immediately() {
        let mut ctrl = BoardController::new();
        assert_eq!(
            ctrl.on_motion_message(MotionMessage::MagnetOn).as_slice(),
            &[
                BoardAction::SetMagnet(true),
                BoardAction::SendSerial(BoardMessage::MagnetReady),
            ]
        );
        assert_eq!(
            ctrl.on_motion_message(MotionMessage::MagnetOff).as_slice(),
            &[
                BoardAction::SetMagnet(false),
                BoardAction::SendSerial(BoardMessage::MagnetOffReady),
            ]
        );
    }

    #[test]
    fn test_status_lines_queued_for_sensing_task() {
        let mut ctrl = BoardController::new();
        for msg in [
            MotionMessage::RequestBoardState,
            MotionMessage::ResetComplete,
            MotionMessage::Ready,
        ] {
            assert_eq!(
                ctrl.on_motion_message(msg).as_slice(),
                &[BoardAction::QueueStatus(msg)]
            );
        }
    }

    #[test]
    fn test_board_state_reply_authority_window() {
        let mut ctrl = BoardController::new();
        let sensed = Occupancy::starting_position();
        assert_eq!(
            ctrl.board_state_reply(sensed),
            BoardMessage::BoardState(sensed.bits())
        );

        // Sensing disabled but nothing dragged yet: the frozen snapshot
        // is still the pre-move board and stays authoritative.
        ctrl.on_remote_move(mv("e2-e4"));
        assert_eq!(
            ctrl.board_state_reply(sensed),
            BoardMessage::BoardState(sensed.bits())
        );

        // After the first magnet engagement the snapshot is stale.
        ctrl.on_motion_message(MotionMessage::MagnetOn);
        assert_eq!(ctrl.board_state_reply(sensed), BoardMessage::SensorsDisabled);

        // Resume restores sensor authority.
        ctrl.on_resume_sensing();
        assert_eq!(
            ctrl.board_state_reply(sensed),
            BoardMessage::BoardState(sensed.bits())
        );
    }

    #[test]
    fn test_resume_requires_trigger_and_rebaselines() {
        let mut ctrl = BoardController::new();
        ctrl.on_remote_move(mv("e2-e4"));
        assert!(!ctrl.sensing_enabled());
        let actions = ctrl.on_resume_sensing();
        assert_eq!(actions.as_slice(), &[BoardAction::RequestRebaseline]);
        assert!(ctrl.sensing_enabled());
    }

    /// Full remote-move scenario: e2-e4 arrives while sensing is
    /// enabled, the motion controller executes it with the magnet
    /// handshake, and sensing re-enables only on the confirm trigger.
    #[test]
    fn test_end_to_end_remote_move() {
        let mut ctrl = BoardController::new();
        let mut exec = MoveExecutor::new(&MotionConfig::default());
        exec.set_homed();
        let mut now = 0u32;

        // Lines crossing the serial link, for the handshake transcript.
        let mut to_motion: heapless::Vec<BoardMessage, 8> = heapless::Vec::new();
        let mut transcript: heapless::Vec<&'static str, 8> = heapless::Vec::new();

        // 1. Poll finds "e2-e4".
        for action in ctrl.on_remote_move(mv("e2-e4")) {
            if let BoardAction::SendSerial(msg) = action {
                to_motion.push(msg).unwrap();
            }
        }
        assert!(!ctrl.sensing_enabled());

        // 2. The serial bridge forwards the move verbatim.
        let BoardMessage::Move(forwarded) = to_motion[0] else {
            panic!("expected a move line");
        };
        let mut motion_out = exec.start_move(forwarded, now);

        // 3. Pump messages between the two sides until idle.
        while let Some(action) = motion_out.pop() {
            now += 10;
            match action {
                MotionAction::Send(msg) => {
                    match msg {
                        MotionMessage::MagnetOn => transcript.push("ON").unwrap(),
                        MotionMessage::MagnetOff => transcript.push("OFF").unwrap(),
                        _ => {}
                    }
                    // Board side handles the line.
                    let mut reply = None;
                    for ba in ctrl.on_motion_message(msg) {
                        match ba {
                            BoardAction::SendSerial(m) => reply = Some(m),
                            BoardAction::QueueStatus(MotionMessage::RequestBoardState) => {
                                reply = Some(
                                    ctrl.board_state_reply(Occupancy::starting_position()),
                                );
                            }
                            _ => {}
                        }
                    }
                    if let Some(m) = reply {
                        match m {
                            BoardMessage::MagnetReady => transcript.push("READY").unwrap(),
                            BoardMessage::MagnetOffReady => {
                                transcript.push("OFF_READY").unwrap()
                            }
                            _ => {}
                        }
                        motion_out = exec.on_message(&m, now);
                    }
                }
                MotionAction::TravelTo(_) | MotionAction::DragLeg(_) => {
                    motion_out = exec.leg_complete(now);
                }
            }
        }

        // Handshake ran ON -> READY -> OFF -> OFF_READY.
        assert_eq!(transcript.as_slice(), &["ON", "READY", "OFF", "OFF_READY"]);

        // Occupancy: e2 cleared, e4 set.
        assert!(exec.is_idle());
        assert!(!exec.occupancy().get(sq("e2")));
        assert!(exec.occupancy().get(sq("e4")));
        assert_eq!(
            exec.position().get(),
            Some(CoordinateMapper::square_to_grid(sq("e4")))
        );

        // Sensing stays off until the external trigger, then rebaselines.
        assert!(!ctrl.sensing_enabled());
        let actions = ctrl.on_resume_sensing();
        assert_eq!(actions.as_slice(), &[BoardAction::RequestRebaseline]);
        assert!(ctrl.sensing_enabled());
    }
}
