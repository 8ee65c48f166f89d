//! Sensing task (core 1).
//!
//! Scans the sensor matrix on a fixed period, feeds the debounce grid
//! and the move detector, answers board-state requests and owns the
//! confirm/resume trigger. Runs on its own core so network I/O can
//! never delay a scan cycle.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::{Instant, Ticker, Duration};

use caissa_core::board::Occupancy;
use caissa_core::config::SystemConfig;
use caissa_core::moves::{DetectorEvent, MoveDetector};
use caissa_core::sensing::{MuxAddress, SensorGrid, CELL_COUNT};
use caissa_core::state::BoardAction;
use caissa_core::traits::SensorMatrix;
use caissa_protocol::MotionMessage;

use crate::channels::{with_controller, OUTBOUND_MOVES, SERIAL_TX, STATUS_LINES};
use crate::matrix::MuxMatrix;

/// Sensing task - scan, debounce, detect, confirm.
#[embassy_executor::task]
pub async fn sensing_task(
    mut matrix: MuxMatrix<'static>,
    confirm: Input<'static>,
    config: SystemConfig,
) {
    info!("Sensing task started");

    let mut scan = [false; CELL_COUNT];
    scan_matrix(&mut matrix, &mut scan);
    let mut grid = SensorGrid::new(config.sensing, occupancy_of(&scan));
    let mut detector = MoveDetector::new(config.detection);

    let mut ticker = Ticker::every(Duration::from_millis(config.sensing.scan_period_ms as u64));
    let mut button_pressed = is_pressed(&confirm);

    loop {
        ticker.next().await;
        let now = Instant::now().as_millis() as u32;

        // Status and board-sync lines queued by the serial bridge.
        while let Ok(msg) = STATUS_LINES.try_receive() {
            handle_status(msg, &grid);
        }

        // Confirm trigger, falling-edge detected.
        let pressed = is_pressed(&confirm);
        let edge = pressed && !button_pressed;
        button_pressed = pressed;
        if edge {
            on_trigger(&mut matrix, &mut grid, &mut detector, &mut scan, &config, now);
        }

        if !with_controller(|c| c.sensing_enabled()) {
            continue;
        }

        // Full matrix scan.
        scan_matrix(&mut matrix, &mut scan);
        for (i, &raw) in scan.iter().enumerate() {
            if let Some(addr) = MuxAddress::from_index(i as u8) {
                if let Some(square) = caissa_protocol::Square::from_index(addr.index()) {
                    grid.update(square, raw, now);
                }
            }
        }

        // Each stable transition is observed exactly once.
        while let Some(transition) = grid.take_transition() {
            trace!("transition: {:?}", transition);
            if let Some(event) = detector.on_transition(transition, now) {
                handle_detector_event(event);
            }
        }
        if let Some(event) = detector.poll_timeout(now) {
            handle_detector_event(event);
        }
    }
}

/// The physical trigger confirms a held move, or re-enables sensing
/// after a remote move was executed.
fn on_trigger(
    matrix: &mut MuxMatrix<'static>,
    grid: &mut SensorGrid,
    detector: &mut MoveDetector,
    scan: &mut [bool; CELL_COUNT],
    config: &SystemConfig,
    now: u32,
) {
    if let Some(event) = detector.on_confirm() {
        handle_detector_event(event);
        return;
    }

    if !with_controller(|c| c.sensing_enabled()) {
        info!("resume trigger: re-enabling sensing");
        for action in with_controller(|c| c.on_resume_sensing()) {
            if action == BoardAction::RequestRebaseline {
                // Fresh scan establishes the new baseline; deltas from
                // the motor dragging must not surface as transitions.
                scan_matrix(matrix, scan);
                grid.rebaseline(scan, now);
                *detector = MoveDetector::new(config.detection);
            }
        }
    }
}

fn handle_detector_event(event: DetectorEvent) {
    match event {
        DetectorEvent::MoveReady(mv) => {
            info!("move confirmed: {:?}", mv);
            for action in with_controller(|c| c.on_detected_move(mv)) {
                if let BoardAction::PostMove(mv) = action {
                    if OUTBOUND_MOVES.try_send(mv).is_err() {
                        warn!("outbound queue full, dropping move");
                    }
                }
            }
        }
        DetectorEvent::AwaitingConfirmation(mv) => {
            info!("candidate {:?} awaiting confirmation", mv);
        }
        DetectorEvent::Cancelled(square) => {
            info!("move cancelled, piece back on {:?}", square);
        }
        DetectorEvent::TimedOut(square) => {
            warn!("pending move from {:?} timed out", square);
        }
        DetectorEvent::FormatError(e) => {
            warn!("invalid candidate dropped: {:?}", e);
        }
    }
}

fn handle_status(msg: MotionMessage, grid: &SensorGrid) {
    match msg {
        MotionMessage::RequestBoardState => {
            let reply = with_controller(|c| c.board_state_reply(grid.occupancy()));
            if SERIAL_TX.try_send(reply.write_line()).is_err() {
                warn!("serial queue full, board-state reply dropped");
            }
        }
        MotionMessage::Ready => info!("motion controller ready"),
        MotionMessage::ResetComplete => info!("motion controller reset complete"),
        MotionMessage::Fault(code) => warn!("motion fault: {:?}", code),
        MotionMessage::MagnetOn | MotionMessage::MagnetOff => {
            // Magnet requests are handled inline by the serial bridge.
        }
    }
}

fn scan_matrix(matrix: &mut MuxMatrix<'static>, scan: &mut [bool; CELL_COUNT]) {
    for (i, slot) in scan.iter_mut().enumerate() {
        if let Some(addr) = MuxAddress::from_index(i as u8) {
            *slot = matrix.read(addr);
        }
    }
}

fn occupancy_of(scan: &[bool; CELL_COUNT]) -> Occupancy {
    let mut bits = 0u64;
    for (i, &level) in scan.iter().enumerate() {
        if level {
            bits |= 1u64 << i;
        }
    }
    Occupancy::from_bits(bits)
}

/// Trigger input is active low (pull-up, button to ground).
fn is_pressed(confirm: &Input<'static>) -> bool {
    confirm.is_low()
}
