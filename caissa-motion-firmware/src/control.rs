//! The cooperative control loop.
//!
//! A single task owns the gantry and the move sequencer. It suspends
//! only while waiting for a serial line or the poll tick; every
//! handshake and sync wait is bounded by the sequencer's timeouts.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker, Timer};
use heapless::Deque;

use caissa_core::config::MotionConfig;
use caissa_core::motion::{Actions, MotionAction, MoveExecutor};
use caissa_protocol::{BoardMessage, FaultCode, MotionMessage, ParseError};

use crate::gantry::{now_ms, Gantry};
use crate::{LINE_RX, TX_LINES};

/// Timeout-poll cadence while idle or waiting for acknowledgements.
const POLL_PERIOD_MS: u64 = 50;

/// Startup homing attempts before the session is declared dead.
const HOMING_ATTEMPTS: u8 = 3;

/// Control task - boot homing, then the serial-driven move loop.
#[embassy_executor::task]
pub async fn control_task(mut gantry: Gantry<'static>, config: MotionConfig) {
    info!("Control task started");

    let mut executor = MoveExecutor::new(&config);

    if !home_with_retries(&mut gantry, &config).await {
        // Fatal for the session: outputs safe, wait for the hardware
        // reset pin or a power cycle.
        gantry.disable();
        error!("homing failed, session halted");
        loop {
            Timer::after_secs(60).await;
        }
    }
    executor.set_homed();
    TX_LINES.send(MotionMessage::Ready.write_line()).await;

    let mut ticker = Ticker::every(Duration::from_millis(POLL_PERIOD_MS));

    loop {
        match select(LINE_RX.receive(), ticker.next()).await {
            Either::First(line) => {
                let now = now_ms();
                match BoardMessage::parse_line(line.as_str()) {
                    Ok(BoardMessage::Move(mv)) => {
                        info!("move requested: {:?}", mv);
                        let actions = executor.start_move(mv, now);
                        if actions.is_empty() && executor.is_idle() {
                            debug!("duplicate move suppressed");
                        }
                        run_actions(&mut gantry, &mut executor, actions).await;
                    }
                    Ok(BoardMessage::Reset) => {
                        info!("soft reset requested");
                        executor.reset();
                        if home_with_retries(&mut gantry, &config).await {
                            executor.set_homed();
                            TX_LINES
                                .send(MotionMessage::ResetComplete.write_line())
                                .await;
                        } else {
                            gantry.disable();
                            TX_LINES
                                .send(
                                    MotionMessage::Fault(FaultCode::HomingFailed).write_line(),
                                )
                                .await;
                        }
                    }
                    Ok(BoardMessage::Probe) => {
                        TX_LINES.send(MotionMessage::Ready.write_line()).await;
                    }
                    Ok(msg) => {
                        let actions = executor.on_message(&msg, now);
                        run_actions(&mut gantry, &mut executor, actions).await;
                    }
                    Err(ParseError::Move(e)) => {
                        // Malformed move: dropped silently to the sender.
                        warn!("malformed move line dropped: {:?}", e);
                    }
                    Err(_) => {
                        debug!("unknown line discarded");
                    }
                }
            }
            Either::Second(_) => {
                let actions = executor.poll(now_ms());
                run_actions(&mut gantry, &mut executor, actions).await;
            }
        }
    }
}

/// Perform sequencer actions, feeding leg completions back in.
async fn run_actions(
    gantry: &mut Gantry<'static>,
    executor: &mut MoveExecutor,
    initial: Actions,
) {
    let mut queue: Deque<MotionAction, 8> = Deque::new();
    for action in initial {
        let _ = queue.push_back(action);
    }

    while let Some(action) = queue.pop_front() {
        match action {
            MotionAction::Send(msg) => {
                TX_LINES.send(msg.write_line()).await;
            }
            MotionAction::TravelTo(target) => {
                trace!("travel to ({}, {})", target.x, target.y);
                gantry.travel_to(target).await;
                for next in executor.leg_complete(now_ms()) {
                    let _ = queue.push_back(next);
                }
            }
            MotionAction::DragLeg(leg) => {
                trace!("drag leg ({}, {})", leg.dx_half, leg.dy_half);
                gantry.drag_leg(leg).await;
                for next in executor.leg_complete(now_ms()) {
                    let _ = queue.push_back(next);
                }
            }
        }
    }
}

/// Bounded startup homing.
async fn home_with_retries(gantry: &mut Gantry<'static>, config: &MotionConfig) -> bool {
    for attempt in 1..=HOMING_ATTEMPTS {
        match gantry.home(config).await {
            Ok(()) => return true,
            Err(e) => {
                error!(
                    "homing attempt {}/{} failed on {:?} axis",
                    attempt, HOMING_ATTEMPTS, e.axis
                );
                TX_LINES
                    .send(MotionMessage::Fault(FaultCode::HomingFailed).write_line())
                    .await;
                Timer::after_secs(1).await;
            }
        }
    }
    false
}
