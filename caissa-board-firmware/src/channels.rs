//! Inter-task communication channels
//!
//! The sensing task runs on core 1, network and serial bridge on core 0.
//! All cross-core traffic goes through these bounded channels; the
//! shared controller state sits behind a blocking mutex with short
//! critical sections.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use caissa_core::state::BoardController;
use caissa_protocol::{MotionMessage, Move, MAX_LINE_LEN};

/// Queue capacity for confirmed outbound moves (sensing -> network).
const OUTBOUND_QUEUE_SIZE: usize = 4;

/// Queue capacity for serialized TX lines.
const SERIAL_QUEUE_SIZE: usize = 8;

/// Queue capacity for motion status lines (serial RX -> sensing).
const STATUS_QUEUE_SIZE: usize = 8;

/// Confirmed physical moves awaiting relay to the game server.
pub static OUTBOUND_MOVES: Channel<CriticalSectionRawMutex, Move, OUTBOUND_QUEUE_SIZE> =
    Channel::new();

/// Lines queued for the motion-controller UART (single TX owner).
pub static SERIAL_TX: Channel<
    CriticalSectionRawMutex,
    heapless::String<MAX_LINE_LEN>,
    SERIAL_QUEUE_SIZE,
> = Channel::new();

/// Status and board-sync lines for the sensing task.
pub static STATUS_LINES: Channel<CriticalSectionRawMutex, MotionMessage, STATUS_QUEUE_SIZE> =
    Channel::new();

/// Signalled when `MOTION_RESET_COMPLETE` arrives.
pub static RESET_DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// The one shared controller-state object (sensing flag, last moves).
///
/// Both tasks access it only through these short lock-and-release
/// helpers; nothing holds the mutex across an await point.
pub static CONTROLLER: Mutex<CriticalSectionRawMutex, RefCell<BoardController>> =
    Mutex::new(RefCell::new(BoardController::new()));

/// Run a closure against the shared controller state.
pub fn with_controller<R>(f: impl FnOnce(&mut BoardController) -> R) -> R {
    CONTROLLER.lock(|cell| f(&mut cell.borrow_mut()))
}
