//! Configuration type definitions
//!
//! All tunables live here with their defaults. The source hardware went
//! through several firmware revisions with slightly different debounce
//! and timing constants; these types collapse them into one set of
//! knobs so nothing is hard-coded at the call sites.

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of the room identifier sent to the game server.
pub const MAX_ROOM_ID_LEN: usize = 24;

/// Maximum length of the player-side tag.
pub const MAX_SIDE_LEN: usize = 8;

/// Sensor scan and debounce tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensingConfig {
    /// Consecutive disagreeing samples before a stable flip
    pub samples: u8,
    /// Minimum spacing between counted samples (ms)
    pub interval_ms: u32,
    /// Full-matrix scan period (ms)
    pub scan_period_ms: u32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            interval_ms: 25,
            scan_period_ms: 10,
        }
    }
}

/// How a detected move is released toward the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfirmPolicy {
    /// Forward as soon as the placement completes
    Auto,
    /// Hold until the physical confirm trigger fires
    #[default]
    Manual,
}

/// Move detection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionConfig {
    /// Lift without a matching place is discarded after this long (ms)
    pub move_timeout_ms: u32,
    /// Auto-forward or wait for the confirm trigger
    pub confirm_policy: ConfirmPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            move_timeout_ms: 10_000,
            confirm_policy: ConfirmPolicy::Manual,
        }
    }
}

/// Gantry geometry and motion timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionConfig {
    /// Stepper steps per full square, on-board pitch
    pub steps_per_square: u32,
    /// Steps per square inside the offset region next to the limit
    /// switches, before the origin cell is reached
    pub approach_steps_per_square: u32,
    /// Width of the offset region between switch trigger point and the
    /// reference square, in half-squares
    pub origin_offset_half_squares: u32,
    /// Delay between step pulses (us); sets travel speed
    pub step_interval_us: u32,
    /// Per-axis limit-switch seek budget (ms)
    pub homing_timeout_ms: u32,
    /// Magnet handshake acknowledgement budget (ms)
    pub handshake_timeout_ms: u32,
    /// Board-state sync reply budget (ms)
    pub sync_timeout_ms: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            steps_per_square: 400,
            approach_steps_per_square: 360,
            origin_offset_half_squares: 1,
            step_interval_us: 600,
            homing_timeout_ms: 15_000,
            handshake_timeout_ms: 2_000,
            sync_timeout_ms: 1_500,
        }
    }
}

/// Game-server polling identity and cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetConfig {
    /// Poll period (ms)
    pub poll_period_ms: u32,
    /// Consecutive failures before the link counts as degraded
    pub degraded_after_failures: u8,
    /// Room the physical board is joined to
    pub room_id: String<MAX_ROOM_ID_LEN>,
    /// Side the physical board plays
    pub player_side: String<MAX_SIDE_LEN>,
}

impl Default for NetConfig {
    fn default() -> Self {
        let mut room_id = String::new();
        let _ = room_id.push_str("default");
        let mut player_side = String::new();
        let _ = player_side.push_str("white");
        Self {
            poll_period_ms: 1_000,
            degraded_after_failures: 3,
            room_id,
            player_side,
        }
    }
}

/// Aggregated system configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemConfig {
    pub sensing: SensingConfig,
    pub detection: DetectionConfig,
    pub motion: MotionConfig,
    pub net: NetConfig,
}
