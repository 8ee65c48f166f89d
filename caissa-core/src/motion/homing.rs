//! Limit-switch homing sequencer.
//!
//! Drives both axes toward their limit switches at a fixed polarity
//! until each triggers, then steps out through the calibrated offset
//! region to the reference square. The sequencer is pure logic: the
//! control loop feeds it switch levels and timestamps and performs the
//! step actions it returns.

use crate::config::MotionConfig;
use crate::motion::mapper::{Axis, CoordinateMapper};

/// Homing failure: a limit switch never triggered.
///
/// Fatal for the session; the startup routine retries with a fresh
/// sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingError {
    pub axis: Axis,
}

/// Sequencer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingState {
    /// Driving x toward its switch
    SeekX,
    /// Driving y toward its switch
    SeekY,
    /// Stepping out of the offset region to the reference square
    Offset,
    /// Homed; position fixed at the reference square
    Done,
    /// A switch never triggered
    Failed(HomingError),
}

/// One action for the control loop to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingAction {
    /// Step x one step toward its switch
    StepXToward,
    /// Step y one step toward its switch
    StepYToward,
    /// Step both axes one step away from the switches
    StepBothAway,
    /// A switch just triggered; no step this cycle
    Wait,
    /// Homing finished
    Complete,
}

/// Homing state machine.
#[derive(Debug, Clone)]
pub struct HomingSequencer {
    state: HomingState,
    phase_started_ms: u32,
    offset_remaining: u32,
    offset_steps: u32,
    timeout_ms: u32,
}

impl HomingSequencer {
    pub fn new(config: &MotionConfig, now_ms: u32) -> Self {
        let mapper = CoordinateMapper::new(config);
        let offset_steps = mapper.origin_offset_steps();
        Self {
            state: HomingState::SeekX,
            phase_started_ms: now_ms,
            offset_remaining: offset_steps,
            offset_steps,
            timeout_ms: config.homing_timeout_ms,
        }
    }

    pub fn state(&self) -> HomingState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == HomingState::Done
    }

    /// Advance one cycle.
    ///
    /// `x_triggered`/`y_triggered` are the current limit-switch levels.
    /// Returns the action to perform, or the homing error once a seek
    /// phase has exhausted its budget.
    pub fn advance(
        &mut self,
        x_triggered: bool,
        y_triggered: bool,
        now_ms: u32,
    ) -> Result<HomingAction, HomingError> {
        match self.state {
            HomingState::SeekX => {
                if x_triggered {
                    self.state = HomingState::SeekY;
                    self.phase_started_ms = now_ms;
                    return Ok(HomingAction::Wait);
                }
                self.check_budget(Axis::X, now_ms)?;
                Ok(HomingAction::StepXToward)
            }
            HomingState::SeekY => {
                if y_triggered {
                    self.state = HomingState::Offset;
                    self.offset_remaining = self.offset_steps;
                    return Ok(HomingAction::Wait);
                }
                self.check_budget(Axis::Y, now_ms)?;
                Ok(HomingAction::StepYToward)
            }
            HomingState::Offset => {
                if self.offset_remaining > 0 {
                    self.offset_remaining -= 1;
                    Ok(HomingAction::StepBothAway)
                } else {
                    self.state = HomingState::Done;
                    Ok(HomingAction::Complete)
                }
            }
            HomingState::Done => Ok(HomingAction::Complete),
            HomingState::Failed(e) => Err(e),
        }
    }

    fn check_budget(&mut self, axis: Axis, now_ms: u32) -> Result<(), HomingError> {
        if now_ms.wrapping_sub(self.phase_started_ms) >= self.timeout_ms {
            let error = HomingError { axis };
            self.state = HomingState::Failed(error);
            return Err(error);
        }
        Ok(())
    }
}
