//! Eddystone-URL observer — Embassy firmware
//!
//! Passively scans BLE advertisements, decodes Eddystone-URL beacons, and
//! prints the deduplicated URI list over serial every few seconds.
//!
//! The BLE runner's event handler only copies raw advertisements into a
//! channel. A single observer task owns all pipeline state and interleaves
//! advertisement handling with the library's task queue (periodic rotation
//! and chunked draining).

#![no_std]
#![no_main]

extern crate alloc;

use esp_backtrace as _;

esp_bootloader_esp_idf::esp_app_desc!();

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::timer::timg::TimerGroup;
use static_cell::{ConstStaticCell, StaticCell};

use trouble_host::prelude::*;

use eddystone_observer::config::{
    ADV_CHANNEL_DEPTH, DRAIN_CHUNK_SIZE, NR_URI_BUFFERS, ROTATE_DELAY_MS, SCAN_INTERVAL_MS,
    SCAN_WINDOW_MS, URI_BUFFER_SIZE, URI_BUFFER_THRESHOLD,
};
use eddystone_observer::drain::Sink;
use eddystone_observer::frame::RawAdvertisement;
use eddystone_observer::report::{self, DeviceMessage, MAX_MSG_LEN, VERSION};
use eddystone_observer::sched::TaskQueue;
use eddystone_observer::{board, Error, UriObserver};

// ── Channel type aliases ──────────────────────────────────────────────

type AdvChannel = Channel<CriticalSectionRawMutex, RawAdvertisement, ADV_CHANNEL_DEPTH>;

/// Raw advertisements from the BLE runner to the observer task
static ADV_CHANNEL: AdvChannel = Channel::new();

// ── BLE scan event handler ────────────────────────────────────────────

/// EventHandler for BLE advertisement reports from trouble-host.
///
/// Copies each report into the advertisement channel. Called synchronously
/// from the runner — must not block, so a full channel drops the report.
struct ScanEventHandler;

impl EventHandler for ScanEventHandler {
    fn on_adv_reports(&self, mut it: LeAdvReportsIter<'_>) {
        while let Some(Ok(report)) = it.next() {
            match RawAdvertisement::copy_from(report.data, report.rssi) {
                Some(adv) => {
                    let _ = ADV_CHANNEL.try_send(adv);
                }
                None => log::debug!("Dropping {}-byte advertisement", report.data.len()),
            }
        }
    }
}

// ── Output sink ───────────────────────────────────────────────────────

/// Drained URI text goes straight to the serial console.
struct SerialSink;

impl Sink for SerialSink {
    fn emit(&mut self, chunk: &str) {
        esp_println::print!("{}", chunk);
    }
}

fn halt(e: Error) -> ! {
    panic!("{}", e)
}

fn log_status(observer: &UriObserver) {
    let uptime = (Instant::now().as_millis() / 1000) as u32;
    let msg = DeviceMessage::status(observer, uptime);
    let mut buf = [0u8; MAX_MSG_LEN];
    if let Some(len) = report::serialize_message(&msg, &mut buf) {
        if let Ok(s) = core::str::from_utf8(&buf[..len]) {
            log::info!("{}", s.trim_end());
        }
    }
}

/// Observer task — sole owner of the buffer pool.
///
/// Pending advertisements are handled first, then at most one scheduled task
/// runs before yielding, so a long drain never starves the channel.
#[embassy_executor::task]
async fn observer_task(observer: &'static mut UriObserver) {
    log::info!("Observer task started");

    let adv_rx = ADV_CHANNEL.receiver();
    let mut queue = TaskQueue::new();
    let mut sink = SerialSink;

    queue.advance_to(Instant::now().as_millis());
    observer.start(&mut queue);

    loop {
        while let Ok(adv) = adv_rx.try_receive() {
            if let Err(e) = observer.on_advertisement(&adv.data, adv.rssi, &mut queue) {
                halt(e);
            }
        }

        queue.advance_to(Instant::now().as_millis());
        if let Some(task) = queue.pop() {
            let drained = observer.stats().buffers_drained;
            if let Err(e) = observer.run(task, &mut queue, &mut sink) {
                halt(e);
            }
            if observer.stats().buffers_drained != drained {
                log_status(observer);
            }
            embassy_futures::yield_now().await;
            continue;
        }

        let deadline = queue
            .next_deadline()
            .map(Instant::from_millis)
            .unwrap_or(Instant::MAX);

        if let Either::First(adv) = select(adv_rx.receive(), Timer::at(deadline)).await {
            if let Err(e) = observer.on_advertisement(&adv.data, adv.rssi, &mut queue) {
                halt(e);
            }
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────

#[esp_rtos::main]
async fn main(spawner: embassy_executor::Spawner) {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // BLE controller needs a heap; the URI pool itself is static.
    esp_alloc::heap_allocator!(size: 64 * 1024);

    // Start the RTOS — requires timer + software interrupt
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    log::info!(
        "Eddystone observer v{} starting on {} ({})",
        VERSION,
        board::BOARD_NAME,
        board::CHIP
    );
    log::info!(
        "URI pool: {} x {} chars, flush margin {}, drain chunk {}, rotation every {} ms",
        NR_URI_BUFFERS,
        URI_BUFFER_SIZE,
        URI_BUFFER_THRESHOLD,
        DRAIN_CHUNK_SIZE,
        ROTATE_DELAY_MS,
    );

    static OBSERVER: ConstStaticCell<UriObserver> =
        ConstStaticCell::new(UriObserver::new(URI_BUFFER_THRESHOLD, ROTATE_DELAY_MS));
    let observer = OBSERVER.take();
    spawner.spawn(observer_task(observer)).unwrap();

    // ── BLE radio initialization ───────────────────────────────────────

    let connector =
        esp_radio::ble::controller::BleConnector::new(peripherals.BT, Default::default())
            .expect("BLE connector init failed");

    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    static HOST_RESOURCES: StaticCell<HostResources<DefaultPacketPool, 1, 2>> = StaticCell::new();
    let resources = HOST_RESOURCES.init(HostResources::new());

    let address = Address::random([0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xab]);

    let stack = trouble_host::new(controller, resources).set_random_address(address);
    let Host {
        central,
        mut runner,
        ..
    } = stack.build();

    log::info!("BLE radio initialized");

    let scan_handler = ScanEventHandler;

    // ── BLE orchestration ──────────────────────────────────────────────
    //
    //   1. BLE stack runner (drives HCI, delivers scan reports to handler)
    //   2. BLE scanner (starts a passive scan, keeps the session alive)

    let _ = embassy_futures::join::join(
        async {
            loop {
                if let Err(e) = runner.run_with_handler(&scan_handler).await {
                    log::error!("BLE runner error: {:?}", e);
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        },
        async {
            let mut scanner = trouble_host::scan::Scanner::new(central);
            let config = ScanConfig {
                active: false,
                interval: Duration::from_millis(SCAN_INTERVAL_MS),
                window: Duration::from_millis(SCAN_WINDOW_MS),
                ..Default::default()
            };

            let _session = match scanner.scan(&config).await {
                Ok(session) => session,
                Err(e) => {
                    log::error!("BLE scan failed to start: {:?}", e);
                    return;
                }
            };

            log::info!(
                "BLE scan started (passive, interval {} ms, window {} ms)",
                SCAN_INTERVAL_MS,
                SCAN_WINDOW_MS
            );
            // Session stays alive as long as _session exists.
            // Reports flow through ScanEventHandler on the runner.
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        },
    )
    .await;
}
