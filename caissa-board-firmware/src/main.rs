//! Caissa board controller firmware
//!
//! Runs on the Pico W embedded in the chessboard. Core 1 owns sensor
//! scanning, debounce and move detection; core 0 owns the game-server
//! client and the serial bridge to the motion controller. The two sides
//! share bounded queues and one mutex-guarded controller-state object.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{Executor, Spawner};
use embassy_net::StackResources;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::multicore::{spawn_core1, Stack as CoreStack};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::Pio;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::{with_timeout, Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};

use caissa_core::config::SystemConfig;
use caissa_protocol::BoardMessage;

mod channels;
mod magnet;
mod matrix;
mod net;
mod tasks;

use crate::channels::{RESET_DONE, SERIAL_TX};
use crate::magnet::Magnet;
use crate::matrix::MuxMatrix;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// Core 1 runs its own executor for the sensing task
static mut CORE1_STACK: CoreStack<8192> = CoreStack::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

// Wi-Fi driver state and network stack resources
static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

/// How long to wait for `MOTION_RESET_COMPLETE` before falling back to
/// the hardware reset pin.
const RESET_REPLY_MS: u64 = 3_000;

/// Width of the hardware reset pulse.
const RESET_PULSE_MS: u64 = 50;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Caissa board controller starting...");

    let p = embassy_rp::init(Default::default());
    let config = SystemConfig::default();

    // Serial link to the motion controller (UART0, GPIO0/1).
    let uart_config = UartConfig::default(); // 115200 baud default
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("UART initialized for motion link");

    // Magnet output and motion hardware-reset output.
    let magnet = Magnet::new(Output::new(p.PIN_15, Level::Low));
    let mut motion_reset = Output::new(p.PIN_14, Level::High);

    // Sensor matrix: shared 4-bit select bus plus one input per mux.
    let select = [
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_4, Level::Low),
        Output::new(p.PIN_5, Level::Low),
    ];
    let inputs = [
        Input::new(p.PIN_6, Pull::Down),
        Input::new(p.PIN_7, Pull::Down),
        Input::new(p.PIN_8, Pull::Down),
        Input::new(p.PIN_9, Pull::Down),
    ];
    let sensor_matrix = MuxMatrix::new(select, inputs);

    // Confirm/resume trigger (button to ground).
    let confirm = Input::new(p.PIN_16, Pull::Up);

    // Sensing gets its own core so network I/O can never stall a scan.
    let sensing_config = config.clone();
    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                spawner
                    .spawn(tasks::sensing_task(sensor_matrix, confirm, sensing_config))
                    .unwrap()
            });
        },
    );
    info!("Sensing executor running on core 1");

    // Pico W radio (cyw43 firmware is flashed separately).
    let fw = unsafe { core::slice::from_raw_parts(0x1014_0000 as *const u8, 230321) };
    let clm = unsafe { core::slice::from_raw_parts(0x1018_0000 as *const u8, 4752) };

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(cyw43_task(runner)).unwrap();

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    // DHCP network stack.
    let net_config = embassy_net::Config::dhcpv4(Default::default());
    let seed = 0x0ddb_1a5e_5bad_5eed_u64;
    let (stack, net_runner) = embassy_net::new(
        net_device,
        net_config,
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_stack_task(net_runner)).unwrap();

    join_wifi(&mut control).await;
    info!("Wi-Fi joined, waiting for DHCP");
    stack.wait_config_up().await;
    info!("Network up");

    // Serial bridge and network tasks on core 0.
    spawner.spawn(tasks::serial_rx_task(rx, magnet)).unwrap();
    spawner.spawn(tasks::serial_tx_task(tx)).unwrap();
    spawner.spawn(tasks::net_task(stack, config.net.clone())).unwrap();

    // Connectivity self-test, then a fresh session: soft-reset the
    // motion controller so it re-homes and reinitializes its occupancy.
    SERIAL_TX.send(BoardMessage::Probe.write_line()).await;
    reset_motion(&mut motion_reset).await;

    info!("All tasks spawned, firmware running");

    loop {
        Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, embassy_rp::peripherals::DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_stack_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Join the configured network, retrying until it succeeds.
async fn join_wifi(control: &mut cyw43::Control<'static>) {
    loop {
        match control
            .join(net::WIFI_SSID, cyw43::JoinOptions::new(net::WIFI_PSK.as_bytes()))
            .await
        {
            Ok(()) => return,
            Err(e) => {
                warn!("wifi join failed (status {}), retrying", e.status);
                Timer::after_secs(2).await;
            }
        }
    }
}

/// Soft reset handshake with a hardware-pin fallback.
async fn reset_motion(reset_pin: &mut Output<'static>) {
    RESET_DONE.reset();
    SERIAL_TX.send(BoardMessage::Reset.write_line()).await;

    match with_timeout(Duration::from_millis(RESET_REPLY_MS), RESET_DONE.wait()).await {
        Ok(()) => info!("motion controller reset acknowledged"),
        Err(_) => {
            warn!("no reset reply, pulsing hardware reset");
            reset_pin.set_low();
            Timer::after_millis(RESET_PULSE_MS).await;
            reset_pin.set_high();
        }
    }
}
