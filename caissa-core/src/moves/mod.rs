//! Lift/place move detection

mod detector;

pub use detector::{DetectorEvent, DetectorState, MoveDetector, PendingMove};
