//! Per-square debounce with hysteresis.
//!
//! The hall sensors sit centimeters away from the stepper motors, so raw
//! reads carry electromagnetic noise. A cell's stable state flips only
//! after `samples` consecutive reads disagree with it, each counted at
//! least `interval_ms` after the previous one; a single agreeing read
//! resets the counter. Consumers observe each stable transition exactly
//! once through the per-cell changed flag.

use caissa_protocol::Square;

use crate::board::Occupancy;
use crate::config::SensingConfig;
use crate::sensing::matrix::CELL_COUNT;

/// Debounce state for one square.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorCell {
    /// Most recent raw read
    pub raw: bool,
    /// Debounced state
    pub stable: bool,
    /// Stable state before the last flip
    pub prev_stable: bool,
    /// Consecutive counted disagreeing reads
    counter: u8,
    /// Timestamp of the last counted disagreeing read (ms)
    last_sample_ms: u32,
    /// Timestamp of the last stable flip (ms)
    pub last_change_ms: u32,
    /// Set on a stable flip, cleared when the transition is consumed
    changed: bool,
}

impl SensorCell {
    const fn new(initial: bool) -> Self {
        Self {
            raw: initial,
            stable: initial,
            prev_stable: initial,
            counter: 0,
            last_sample_ms: 0,
            last_change_ms: 0,
            changed: false,
        }
    }
}

/// Direction of a stable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionKind {
    /// Occupied -> empty
    Lifted,
    /// Empty -> occupied
    Placed,
}

/// One consumed stable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub square: Square,
    pub kind: TransitionKind,
    /// When the stable state flipped (ms)
    pub at_ms: u32,
}

/// Debounce state for the whole 64-cell matrix.
#[derive(Debug, Clone)]
pub struct SensorGrid {
    cells: [SensorCell; CELL_COUNT],
    config: SensingConfig,
}

impl SensorGrid {
    /// Create a grid with every cell stable at the given snapshot.
    pub fn new(config: SensingConfig, initial: Occupancy) -> Self {
        let mut cells = [SensorCell::new(false); CELL_COUNT];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = SensorCell::new(initial.bits() & (1u64 << i) != 0);
        }
        Self { cells, config }
    }

    /// Access a cell's debounce state.
    pub fn cell(&self, square: Square) -> &SensorCell {
        &self.cells[square.index() as usize]
    }

    /// Feed one raw read for one cell.
    pub fn update(&mut self, square: Square, raw: bool, now_ms: u32) {
        let cell = &mut self.cells[square.index() as usize];
        cell.raw = raw;

        if raw == cell.stable {
            cell.counter = 0;
            return;
        }

        // Count a disagreeing read only if enough time has passed since
        // the previous counted one; back-to-back scan cycles inside the
        // interval are one sample, not several.
        if cell.counter == 0 || now_ms.wrapping_sub(cell.last_sample_ms) >= self.config.interval_ms
        {
            cell.counter += 1;
            cell.last_sample_ms = now_ms;
        }

        if cell.counter >= self.config.samples {
            cell.prev_stable = cell.stable;
            cell.stable = raw;
            cell.counter = 0;
            cell.last_change_ms = now_ms;
            cell.changed = true;
        }
    }

    /// Take the next unconsumed stable transition, if any.
    ///
    /// Each physical transition is delivered exactly once.
    pub fn take_transition(&mut self) -> Option<Transition> {
        for (i, cell) in self.cells.iter_mut().enumerate() {
            if cell.changed {
                cell.changed = false;
                let square = Square::from_index(i as u8)?;
                let kind = if cell.stable {
                    TransitionKind::Placed
                } else {
                    TransitionKind::Lifted
                };
                return Some(Transition {
                    square,
                    kind,
                    at_ms: cell.last_change_ms,
                });
            }
        }
        None
    }

    /// Establish a fresh baseline from one full raw scan.
    ///
    /// Used when sensing re-enables after motor-driven movement: the net
    /// sensor delta accumulated while disabled must not be misread as a
    /// human move, so every cell adopts the current raw level as its
    /// stable state with no pending transitions.
    pub fn rebaseline(&mut self, raw: &[bool; CELL_COUNT], now_ms: u32) {
        for (cell, &level) in self.cells.iter_mut().zip(raw.iter()) {
            cell.raw = level;
            cell.stable = level;
            cell.prev_stable = level;
            cell.counter = 0;
            cell.changed = false;
            cell.last_change_ms = now_ms;
        }
    }

    /// Debounced occupancy snapshot.
    pub fn occupancy(&self) -> Occupancy {
        let mut bits = 0u64;
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.stable {
                bits |= 1u64 << i;
            }
        }
        Occupancy::from_bits(bits)
    }
}
