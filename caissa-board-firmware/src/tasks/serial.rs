//! Serial bridge tasks (core 0).
//!
//! The RX task parses inbound lines as [`MotionMessage`] and dispatches
//! them through the shared controller state: magnet requests drive the
//! output pin and acknowledge immediately, status and board-sync lines
//! are queued for the sensing task, anything else is discarded. Inbound
//! text can never be re-read as a move - the message grammar has no
//! move-shaped production in this direction.
//!
//! The TX task is the single owner of the UART transmit half; every
//! outbound line funnels through its queue.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};

use caissa_core::state::BoardAction;
use caissa_core::traits::MagnetPin;
use caissa_protocol::{LineReader, MotionMessage, ParseError};

use crate::channels::{with_controller, RESET_DONE, SERIAL_TX, STATUS_LINES};
use crate::magnet::Magnet;

/// Buffer size for UART receive chunks.
const RX_BUF_SIZE: usize = 64;

/// With the magnet engaged, this long without any serial traffic means
/// the handshake died mid-move; drop the magnet to a safe state.
const MAGNET_GUARD_MS: u64 = 5_000;

/// Serial RX task - parses lines from the motion controller.
#[embassy_executor::task]
pub async fn serial_rx_task(mut rx: BufferedUartRx, mut magnet: Magnet<'static>) {
    info!("Serial RX task started");

    let mut reader: LineReader = LineReader::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match with_timeout(Duration::from_millis(MAGNET_GUARD_MS), rx.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                for &byte in &buf[..n] {
                    if let Some(line) = reader.feed(byte) {
                        handle_line(line.as_str(), &mut magnet);
                    }
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!("UART read error: {:?}", e);
            }
            Err(_) => {
                // No traffic for the whole guard window. An abandoned
                // handshake must not leave the magnet energized.
                if magnet.is_engaged() {
                    warn!("handshake abandoned, magnet off");
                    magnet.set_engaged(false);
                }
            }
        }
    }
}

fn handle_line(line: &str, magnet: &mut impl MagnetPin) {
    let msg = match MotionMessage::parse_line(line) {
        Ok(msg) => msg,
        Err(ParseError::UnknownMessage) => {
            debug!("unknown serial line discarded");
            return;
        }
        Err(e) => {
            warn!("serial parse error: {:?}", e);
            return;
        }
    };

    if msg == MotionMessage::ResetComplete {
        RESET_DONE.signal(());
    }

    for action in with_controller(|c| c.on_motion_message(msg)) {
        match action {
            BoardAction::SetMagnet(engaged) => {
                magnet.set_engaged(engaged);
            }
            BoardAction::SendSerial(reply) => {
                if SERIAL_TX.try_send(reply.write_line()).is_err() {
                    warn!("serial queue full, ack dropped");
                }
            }
            BoardAction::QueueStatus(status) => {
                if STATUS_LINES.try_send(status).is_err() {
                    warn!("status queue full, line dropped");
                }
            }
            // The controller never asks the serial bridge for these.
            BoardAction::PostMove(_) | BoardAction::RequestRebaseline => {}
        }
    }
}

/// Serial TX task - single owner of the UART transmit half.
#[embassy_executor::task]
pub async fn serial_tx_task(mut tx: BufferedUartTx) {
    info!("Serial TX task started");

    loop {
        let line = SERIAL_TX.receive().await;
        if let Err(e) = tx.write_all(line.as_bytes()).await {
            warn!("UART write error: {:?}", e);
        }
    }
}
