//! Two-axis gantry driver.
//!
//! Generates synchronized step pulses for the two coupled steppers,
//! tracks the head position in half-square units and runs the homing
//! sequence against the limit switches. Diagonal legs interleave both
//! axes through the step interpolator so the strokes finish together.

use defmt::*;
use embassy_rp::gpio::{Input, Output};
use embassy_time::{Instant, Timer};

use caissa_core::config::MotionConfig;
use caissa_core::motion::{
    CoordinateMapper, GridPos, HomingAction, HomingError, HomingSequencer, Leg, StepInterpolator,
};

/// Step pulse high time.
const PULSE_US: u64 = 4;

/// Gantry hardware: step/dir per axis, shared enable, limit switches.
pub struct Gantry<'d> {
    step_x: Output<'d>,
    dir_x: Output<'d>,
    step_y: Output<'d>,
    dir_y: Output<'d>,
    enable: Output<'d>,
    limit_x: Input<'d>,
    limit_y: Input<'d>,
    /// Head position; meaningful once homed
    pos: GridPos,
    steps_per_half_square: u32,
    step_interval_us: u64,
}

impl<'d> Gantry<'d> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        step_x: Output<'d>,
        dir_x: Output<'d>,
        step_y: Output<'d>,
        dir_y: Output<'d>,
        enable: Output<'d>,
        limit_x: Input<'d>,
        limit_y: Input<'d>,
        config: &MotionConfig,
    ) -> Self {
        Self {
            step_x,
            dir_x,
            step_y,
            dir_y,
            enable,
            limit_x,
            limit_y,
            pos: GridPos::new(0, 0),
            steps_per_half_square: config.steps_per_square / 2,
            step_interval_us: config.step_interval_us as u64,
        }
    }

    pub fn position(&self) -> GridPos {
        self.pos
    }

    /// Drivers are enable-active-low.
    pub fn enable(&mut self) {
        self.enable.set_low();
    }

    pub fn disable(&mut self) {
        self.enable.set_high();
    }

    /// Limit switches are wired normally open to ground.
    fn limit_x_triggered(&self) -> bool {
        self.limit_x.is_low()
    }

    fn limit_y_triggered(&self) -> bool {
        self.limit_y.is_low()
    }

    /// Home both axes and park on the reference square.
    pub async fn home(&mut self, config: &MotionConfig) -> Result<(), HomingError> {
        info!("homing started");
        self.enable();

        let mut sequencer = HomingSequencer::new(config, now_ms());
        loop {
            let action = sequencer.advance(
                self.limit_x_triggered(),
                self.limit_y_triggered(),
                now_ms(),
            )?;
            match action {
                HomingAction::StepXToward => {
                    self.dir_x.set_low();
                    self.pulse(true, false).await;
                }
                HomingAction::StepYToward => {
                    self.dir_y.set_low();
                    self.pulse(false, true).await;
                }
                HomingAction::StepBothAway => {
                    self.dir_x.set_high();
                    self.dir_y.set_high();
                    self.pulse(true, true).await;
                }
                HomingAction::Wait => Timer::after_millis(1).await,
                HomingAction::Complete => {
                    self.pos = CoordinateMapper::reference_position();
                    info!("homed at reference square");
                    return Ok(());
                }
            }
        }
    }

    /// Free move (magnet off) to an absolute grid position.
    pub async fn travel_to(&mut self, target: GridPos) {
        let (dx, dy) = self.pos.delta_to(target);
        self.run(dx, dy).await;
    }

    /// Drag the engaged piece along one leg.
    pub async fn drag_leg(&mut self, leg: Leg) {
        self.run(leg.dx_half, leg.dy_half).await;
    }

    /// Execute a relative movement in half-squares.
    async fn run(&mut self, dx_half: i16, dy_half: i16) {
        let dx_steps = dx_half as i32 * self.steps_per_half_square as i32;
        let dy_steps = dy_half as i32 * self.steps_per_half_square as i32;

        let interpolator = StepInterpolator::new(dx_steps, dy_steps);
        self.dir_x
            .set_level((interpolator.sign_x() >= 0).into());
        self.dir_y
            .set_level((interpolator.sign_y() >= 0).into());

        for pulse in interpolator {
            self.pulse(pulse.step_x, pulse.step_y).await;
        }

        self.pos = self.pos.offset(dx_half, dy_half);
    }

    /// One step pulse on the selected axes simultaneously.
    async fn pulse(&mut self, x: bool, y: bool) {
        if x {
            self.step_x.set_high();
        }
        if y {
            self.step_y.set_high();
        }
        Timer::after_micros(PULSE_US).await;
        self.step_x.set_low();
        self.step_y.set_low();
        Timer::after_micros(self.step_interval_us.saturating_sub(PULSE_US)).await;
    }
}

pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}
