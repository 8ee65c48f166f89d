//! Chess-square to stepper-grid coordinate mapping.
//!
//! The gantry head moves on a half-square grid so that edge-travel paths
//! can run along square boundaries. Coordinates are measured from the
//! limit-switch corner of the board: `x` counts half-squares across the
//! files in mirrored order (the `h` file is nearest the switches),
//! `y` counts half-squares up the ranks.
//!
//! Square centers sit at odd coordinates: the center of file column `c`
//! is `2c + 1`, with `0` and `16` the outer board edges. Positions just
//! outside that range are reachable on purpose - captured pieces are
//! parked off the board.

use caissa_protocol::Square;

use crate::config::MotionConfig;

/// Gantry axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
}

/// A head position in half-square units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GridPos {
    pub x: i16,
    pub y: i16,
}

impl GridPos {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `other - self` in half-squares.
    pub fn delta_to(self, other: GridPos) -> (i16, i16) {
        (other.x - self.x, other.y - self.y)
    }

    /// Translate by a half-square delta.
    pub fn offset(self, dx: i16, dy: i16) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Last commanded head position, unknown before the first homing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardPosition {
    pos: Option<GridPos>,
}

impl BoardPosition {
    pub const fn unknown() -> Self {
        Self { pos: None }
    }

    pub fn is_homed(&self) -> bool {
        self.pos.is_some()
    }

    pub fn get(&self) -> Option<GridPos> {
        self.pos
    }

    /// Fix the position after homing or a completed move.
    pub fn set(&mut self, pos: GridPos) {
        self.pos = Some(pos);
    }

    /// Invalidate, e.g. after an aborted move of unknown extent.
    pub fn invalidate(&mut self) {
        self.pos = None;
    }
}

/// Square-to-grid and grid-to-steps conversion.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    steps_per_half_square: u32,
    approach_steps_per_half_square: u32,
    origin_offset_half_squares: u32,
}

impl CoordinateMapper {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            steps_per_half_square: config.steps_per_square / 2,
            approach_steps_per_half_square: config.approach_steps_per_square / 2,
            origin_offset_half_squares: config.origin_offset_half_squares,
        }
    }

    /// Center of a square on the half-square grid.
    ///
    /// File order is mirrored: `h` maps to column 0 next to the limit
    /// switches, `a` to column 7. Rank order is direct.
    pub fn square_to_grid(square: Square) -> GridPos {
        GridPos {
            x: 2 * (7 - square.file() as i16) + 1,
            y: 2 * square.rank() as i16 + 1,
        }
    }

    /// The canonical reference square the head parks on after homing.
    pub fn reference_position() -> GridPos {
        // h1: grid column 0, rank row 0.
        GridPos { x: 1, y: 1 }
    }

    /// Steps for a span of half-squares at the on-board pitch.
    pub fn half_squares_to_steps(&self, half_squares: i16) -> i32 {
        half_squares as i32 * self.steps_per_half_square as i32
    }

    /// Steps from the limit-switch trigger point to the reference
    /// square center, covered at the approach pitch.
    ///
    /// The region next to the switches is mechanically offset from the
    /// playing field, so it uses its own calibrated pitch. The
    /// reference center sits one half-square past the offset region.
    pub fn origin_offset_steps(&self) -> u32 {
        self.origin_offset_half_squares * self.approach_steps_per_half_square
            + self.steps_per_half_square
    }
}
