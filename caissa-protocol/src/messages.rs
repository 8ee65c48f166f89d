//! Message grammar for the controller-to-controller serial link.
//!
//! Messages are split by direction: [`BoardMessage`] travels from the
//! board controller to the motion controller, [`MotionMessage`] the other
//! way. Each side parses only the opposite direction, so an
//! acknowledgement can never be re-read as a move - the defect this
//! grammar exists to rule out.

use heapless::String;

use crate::line::MAX_LINE_LEN;
use crate::moves::{Move, MoveFormatError};

const KW_MAGNET_ON: &str = "MAGNET_ON";
const KW_MAGNET_OFF: &str = "MAGNET_OFF";
const KW_MAGNET_READY: &str = "MAGNET_READY";
const KW_MAGNET_OFF_READY: &str = "MAGNET_OFF_READY";
const KW_REQUEST_BOARD_STATE: &str = "REQUEST_BOARD_STATE";
const KW_BOARD_STATE: &str = "BOARD_STATE:";
const KW_SENSORS_DISABLED: &str = "SENSORS_DISABLED";
const KW_RESET: &str = "RESET";
const KW_RESET_COMPLETE: &str = "MOTION_RESET_COMPLETE";
const KW_PROBE: &str = "PROBE";
const KW_READY: &str = "READY";
const KW_FAULT: &str = "FAULT:";

/// Errors produced while parsing a received line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Line matches no known message; the receiver discards it
    UnknownMessage,
    /// Line looked like a move but violated the move format
    Move(MoveFormatError),
    /// `BOARD_STATE:` payload was not 64 `0`/`1` characters
    BadBoardState,
}

/// Fault codes carried on `FAULT:` status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCode {
    /// A magnet handshake acknowledgement never arrived
    HandshakeTimeout,
    /// A limit switch never triggered during homing
    HomingFailed,
    /// The requested move could not be planned
    PlanRejected,
    /// The board-state sync reply never arrived
    SyncTimeout,
}

impl FaultCode {
    fn as_str(self) -> &'static str {
        match self {
            FaultCode::HandshakeTimeout => "HANDSHAKE_TIMEOUT",
            FaultCode::HomingFailed => "HOMING_FAILED",
            FaultCode::PlanRejected => "PLAN_REJECTED",
            FaultCode::SyncTimeout => "SYNC_TIMEOUT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "HANDSHAKE_TIMEOUT" => Some(FaultCode::HandshakeTimeout),
            "HOMING_FAILED" => Some(FaultCode::HomingFailed),
            "PLAN_REJECTED" => Some(FaultCode::PlanRejected),
            "SYNC_TIMEOUT" => Some(FaultCode::SyncTimeout),
            _ => None,
        }
    }
}

/// Messages from the board controller to the motion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardMessage {
    /// Execute this move
    Move(Move),
    /// Magnet is energized, stepping may start
    MagnetReady,
    /// Magnet is released
    MagnetOffReady,
    /// Occupancy snapshot, bit i = square index i (a1 first)
    BoardState(u64),
    /// Snapshot unavailable while sensing is disabled
    SensorsDisabled,
    /// Soft reset request
    Reset,
    /// Liveness probe
    Probe,
}

/// Messages from the motion controller to the board controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionMessage {
    /// Request: energize the magnet and acknowledge
    MagnetOn,
    /// Request: release the magnet and acknowledge
    MagnetOff,
    /// Request an occupancy snapshot
    RequestBoardState,
    /// Soft reset finished
    ResetComplete,
    /// Liveness probe reply (also sent at boot)
    Ready,
    /// Status line: a move or sync step was aborted
    Fault(FaultCode),
}

impl BoardMessage {
    /// Parse a line received by the motion controller.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        match line {
            KW_MAGNET_READY => return Ok(BoardMessage::MagnetReady),
            KW_MAGNET_OFF_READY => return Ok(BoardMessage::MagnetOffReady),
            KW_SENSORS_DISABLED => return Ok(BoardMessage::SensorsDisabled),
            KW_RESET => return Ok(BoardMessage::Reset),
            KW_PROBE => return Ok(BoardMessage::Probe),
            _ => {}
        }
        if let Some(bits) = line.strip_prefix(KW_BOARD_STATE) {
            return parse_board_state(bits).map(BoardMessage::BoardState);
        }
        // A move line is the only remaining shape. Move-shaped lines
        // with a bad format are reported as format errors so the caller
        // can count them; everything else is unknown noise.
        let b = line.as_bytes();
        if b.len() == crate::moves::MOVE_STR_LEN && b[2] == b'-' {
            return Move::parse(line)
                .map(BoardMessage::Move)
                .map_err(ParseError::Move);
        }
        Err(ParseError::UnknownMessage)
    }

    /// Render this message as a terminated line ready for the UART.
    pub fn write_line(&self) -> String<MAX_LINE_LEN> {
        let mut out = String::new();
        match self {
            BoardMessage::Move(mv) => {
                let _ = out.push_str(mv.as_string().as_str());
            }
            BoardMessage::MagnetReady => {
                let _ = out.push_str(KW_MAGNET_READY);
            }
            BoardMessage::MagnetOffReady => {
                let _ = out.push_str(KW_MAGNET_OFF_READY);
            }
            BoardMessage::BoardState(bits) => {
                let _ = out.push_str(KW_BOARD_STATE);
                for i in 0..64 {
                    let ch = if bits & (1u64 << i) != 0 { '1' } else { '0' };
                    let _ = out.push(ch);
                }
            }
            BoardMessage::SensorsDisabled => {
                let _ = out.push_str(KW_SENSORS_DISABLED);
            }
            BoardMessage::Reset => {
                let _ = out.push_str(KW_RESET);
            }
            BoardMessage::Probe => {
                let _ = out.push_str(KW_PROBE);
            }
        }
        let _ = out.push('\n');
        out
    }
}

impl MotionMessage {
    /// Parse a line received by the board controller.
    ///
    /// There is deliberately no move-shaped production here: whatever the
    /// motion controller sends, it can never decode to a [`Move`].
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        match line {
            KW_MAGNET_ON => return Ok(MotionMessage::MagnetOn),
            KW_MAGNET_OFF => return Ok(MotionMessage::MagnetOff),
            KW_REQUEST_BOARD_STATE => return Ok(MotionMessage::RequestBoardState),
            KW_RESET_COMPLETE => return Ok(MotionMessage::ResetComplete),
            KW_READY => return Ok(MotionMessage::Ready),
            _ => {}
        }
        if let Some(code) = line.strip_prefix(KW_FAULT) {
            return FaultCode::parse(code)
                .map(MotionMessage::Fault)
                .ok_or(ParseError::UnknownMessage);
        }
        Err(ParseError::UnknownMessage)
    }

    /// Render this message as a terminated line ready for the UART.
    pub fn write_line(&self) -> String<MAX_LINE_LEN> {
        let mut out = String::new();
        match self {
            MotionMessage::MagnetOn => {
                let _ = out.push_str(KW_MAGNET_ON);
            }
            MotionMessage::MagnetOff => {
                let _ = out.push_str(KW_MAGNET_OFF);
            }
            MotionMessage::RequestBoardState => {
                let _ = out.push_str(KW_REQUEST_BOARD_STATE);
            }
            MotionMessage::ResetComplete => {
                let _ = out.push_str(KW_RESET_COMPLETE);
            }
            MotionMessage::Ready => {
                let _ = out.push_str(KW_READY);
            }
            MotionMessage::Fault(code) => {
                let _ = out.push_str(KW_FAULT);
                let _ = out.push_str(code.as_str());
            }
        }
        let _ = out.push('\n');
        out
    }
}

fn parse_board_state(bits: &str) -> Result<u64, ParseError> {
    let bytes = bits.as_bytes();
    if bytes.len() != 64 {
        return Err(ParseError::BadBoardState);
    }
    let mut value = 0u64;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'1' => value |= 1u64 << i,
            b'0' => {}
            _ => return Err(ParseError::BadBoardState),
        }
    }
    Ok(value)
}
