//! Network task (core 0).
//!
//! Polls the game server on a fixed cadence and relays confirmed
//! physical moves. A lost wireless link degrades gracefully: outbound
//! relay is deferred and logged, polling is skipped, and sensing and
//! the serial bridge keep running untouched on their own tasks.

use defmt::*;
use embassy_net::Stack;
use embassy_time::{Duration, Ticker};

use caissa_core::config::NetConfig;
use caissa_core::link::LinkMonitor;
use caissa_core::state::BoardAction;
use caissa_protocol::Move;

use crate::channels::{with_controller, OUTBOUND_MOVES, SERIAL_TX};
use crate::net::{poll_server, post_move};

/// Network task - poll loop and outbound relay.
#[embassy_executor::task]
pub async fn net_task(stack: Stack<'static>, cfg: NetConfig) {
    info!("Network task started");

    let mut monitor = LinkMonitor::new(cfg.degraded_after_failures);
    // One deferred move at a time keeps relay in confirmation order.
    let mut deferred: Option<Move> = None;
    let mut ticker = Ticker::every(Duration::from_millis(cfg.poll_period_ms as u64));

    loop {
        ticker.next().await;

        if !stack.is_link_up() {
            debug!("wifi link down, poll skipped");
            continue;
        }

        // Outbound relay first, in confirmation order.
        let next = match deferred.take() {
            Some(mv) => Some(mv),
            None => OUTBOUND_MOVES.try_receive().ok(),
        };
        if let Some(mv) = next {
            match post_move(stack, &cfg, mv).await {
                Ok(()) => {
                    monitor.record_success();
                    info!("reported physical move {:?}", mv);
                }
                Err(e) => {
                    monitor.record_failure();
                    warn!("move relay failed ({:?}), deferred", e);
                    deferred = Some(mv);
                }
            }
        }

        // Poll for the opponent's move. Polling continues while the
        // link is degraded; each attempt doubles as a recovery probe.
        match poll_server(stack, &cfg).await {
            Ok(Some(mv)) => {
                monitor.record_success();
                let actions = with_controller(|c| c.on_remote_move(mv));
                if actions.is_empty() {
                    trace!("move {:?} already seen", mv);
                }
                for action in actions {
                    if let BoardAction::SendSerial(msg) = action {
                        info!("forwarding remote move {:?}", mv);
                        SERIAL_TX.send(msg.write_line()).await;
                    }
                }
            }
            Ok(None) => monitor.record_success(),
            Err(e) => {
                monitor.record_failure();
                if monitor.is_degraded() {
                    warn!(
                        "server unreachable ({:?}), {} failures so far",
                        e,
                        monitor.total_failures()
                    );
                } else {
                    debug!("poll failed: {:?}", e);
                }
            }
        }
    }
}
