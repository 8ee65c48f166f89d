//! Coordinate mapping, path planning and step generation

mod executor;
mod homing;
mod interpolator;
mod mapper;
mod planner;

pub use executor::{Actions, MotionAction, MoveExecutor};
pub use homing::{HomingAction, HomingError, HomingSequencer, HomingState};
pub use interpolator::{StepInterpolator, StepPulse};
pub use mapper::{Axis, BoardPosition, CoordinateMapper, GridPos};
pub use planner::{classify, Leg, MoveKind, MovePlan, PathPlanner, PlanError, Route, MAX_LEGS};
