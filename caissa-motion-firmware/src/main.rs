//! Caissa motion controller firmware
//!
//! Runs on the RP2040 under the board, driving the two coupled gantry
//! steppers and coordinating the electromagnet with the board
//! controller over UART. One cooperative control loop owns all motion;
//! a receive task feeds it parsed-ready lines.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartRx, BufferedUartTx, Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use caissa_core::config::SystemConfig;
use caissa_protocol::{LineReader, MAX_LINE_LEN};

mod control;
mod gantry;

use crate::gantry::Gantry;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Complete lines from the board controller for the control loop.
pub static LINE_RX: Channel<CriticalSectionRawMutex, heapless::String<MAX_LINE_LEN>, 8> =
    Channel::new();

/// Outbound lines to the board controller (single TX owner).
pub static TX_LINES: Channel<CriticalSectionRawMutex, heapless::String<MAX_LINE_LEN>, 8> =
    Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Caissa motion controller starting...");

    let p = embassy_rp::init(Default::default());
    let config = SystemConfig::default();

    // Serial link to the board controller (UART0, GPIO0/1).
    let uart_config = UartConfig::default(); // 115200 baud default
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("UART initialized for board link");

    // Gantry: step/dir per axis, shared active-low enable, limit
    // switches wired to ground.
    let gantry = Gantry::new(
        Output::new(p.PIN_10, Level::Low), // x step
        Output::new(p.PIN_11, Level::Low), // x dir
        Output::new(p.PIN_12, Level::Low), // y step
        Output::new(p.PIN_13, Level::Low), // y dir
        Output::new(p.PIN_14, Level::High), // enable (disabled at boot)
        Input::new(p.PIN_16, Pull::Up), // x limit
        Input::new(p.PIN_17, Pull::Up), // y limit
        &config.motion,
    );

    spawner.spawn(uart_rx_task(rx)).unwrap();
    spawner.spawn(uart_tx_task(tx)).unwrap();
    spawner.spawn(control::control_task(gantry, config.motion)).unwrap();

    info!("All tasks spawned, firmware running");
}

/// UART RX task - accumulates bytes into lines for the control loop.
#[embassy_executor::task]
async fn uart_rx_task(mut rx: BufferedUartRx) {
    info!("UART RX task started");

    let mut reader: LineReader = LineReader::new();
    let mut buf = [0u8; 64];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                for &byte in &buf[..n] {
                    if let Some(line) = reader.feed(byte) {
                        if LINE_RX.try_send(line).is_err() {
                            warn!("line queue full, input dropped");
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}

/// UART TX task - single owner of the transmit half.
#[embassy_executor::task]
async fn uart_tx_task(mut tx: BufferedUartTx) {
    info!("UART TX task started");

    loop {
        let line = TX_LINES.receive().await;
        if let Err(e) = tx.write_all(line.as_bytes()).await {
            warn!("UART write error: {:?}", e);
        }
    }
}
