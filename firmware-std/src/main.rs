//! Eddystone-URL observer — ESP-IDF std firmware
//!
//! Thread-based harness around the same library as the Embassy firmware:
//! NimBLE (via esp32-nimble) scans passively on the main thread and hands raw
//! advertisements to an observer thread over a bounded `std::sync::mpsc`
//! channel. The observer thread owns all pipeline state and drives the
//! library's task queue with `recv_timeout`.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use eddystone_observer::config::{
    ADV_CHANNEL_DEPTH, DRAIN_CHUNK_SIZE, NR_URI_BUFFERS, ROTATE_DELAY_MS, SCAN_INTERVAL_MS,
    SCAN_WINDOW_MS, URI_BUFFER_SIZE, URI_BUFFER_THRESHOLD,
};
use eddystone_observer::drain::Sink;
use eddystone_observer::frame::RawAdvertisement;
use eddystone_observer::report::{self, DeviceMessage, MAX_MSG_LEN, VERSION};
use eddystone_observer::sched::TaskQueue;
use eddystone_observer::{board, Error, UriObserver};

use esp32_nimble::{BLEDevice, BLEScan};
use esp_idf_svc::hal::task::block_on;

/// Pipeline state lives in .bss; the observer thread holds the lock for its
/// whole lifetime.
static OBSERVER: Mutex<UriObserver> =
    Mutex::new(UriObserver::new(URI_BUFFER_THRESHOLD, ROTATE_DELAY_MS));

/// Length of one NimBLE scan round in milliseconds.
const SCAN_ROUND_MS: i32 = 5000;

/// Drained URI text goes to the console UART via stdout.
struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&mut self, chunk: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(chunk.as_bytes());
        let _ = out.flush();
    }
}

fn halt(e: Error) -> ! {
    log::error!("{}", e);
    panic!("{}", e)
}

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    let boot = Instant::now();

    log::info!(
        "Eddystone observer v{} starting on {} ({}, std)",
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

    let (adv_tx, adv_rx) = mpsc::sync_channel::<RawAdvertisement>(ADV_CHANNEL_DEPTH);

    thread::Builder::new()
        .name("observer".into())
        .stack_size(8192)
        .spawn(move || observer_thread(adv_rx, boot))?;
    log::info!("Observer thread spawned");

    ble_scan_loop(adv_tx)
}

// ── Observer thread ──────────────────────────────────────────────────

fn observer_thread(adv_rx: Receiver<RawAdvertisement>, boot: Instant) {
    let mut observer = match OBSERVER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut queue = TaskQueue::new();
    let mut sink = StdoutSink;
    let now_ms = || boot.elapsed().as_millis() as u64;

    queue.advance_to(now_ms());
    observer.start(&mut queue);
    log::info!("Observer thread started");

    loop {
        while let Ok(adv) = adv_rx.try_recv() {
            if let Err(e) = observer.on_advertisement(&adv.data, adv.rssi, &mut queue) {
                halt(e);
            }
        }

        queue.advance_to(now_ms());
        if let Some(task) = queue.pop() {
            let drained = observer.stats().buffers_drained;
            if let Err(e) = observer.run(task, &mut queue, &mut sink) {
                halt(e);
            }
            if observer.stats().buffers_drained != drained {
                log_status(&observer, boot);
            }
            thread::yield_now();
            continue;
        }

        let timeout = queue
            .next_deadline()
            .map(|due| Duration::from_millis(due.saturating_sub(now_ms())))
            .unwrap_or(Duration::from_secs(60));

        match adv_rx.recv_timeout(timeout) {
            Ok(adv) => {
                if let Err(e) = observer.on_advertisement(&adv.data, adv.rssi, &mut queue) {
                    halt(e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Advertisement channel closed, observer stopping");
                return;
            }
        }
    }
}

fn log_status(observer: &UriObserver, boot: Instant) {
    let uptime = boot.elapsed().as_secs() as u32;
    let msg = DeviceMessage::status(observer, uptime);
    let mut buf = [0u8; MAX_MSG_LEN];
    if let Some(len) = report::serialize_message(&msg, &mut buf) {
        if let Ok(s) = std::str::from_utf8(&buf[..len]) {
            log::info!("{}", s.trim_end());
        }
    }
}

// ── BLE (NimBLE) scan loop — runs on main thread ─────────────────────

fn ble_scan_loop(adv_tx: SyncSender<RawAdvertisement>) -> ! {
    let ble_device = BLEDevice::take();
    let mut scan = BLEScan::new();
    scan.active_scan(false)
        .interval(SCAN_INTERVAL_MS as u16)
        .window(SCAN_WINDOW_MS as u16);

    log::info!(
        "BLE scan started (passive, interval {} ms, window {} ms)",
        SCAN_INTERVAL_MS,
        SCAN_WINDOW_MS
    );

    loop {
        let result = block_on(scan.start(ble_device, SCAN_ROUND_MS, |device, data| {
            match RawAdvertisement::copy_from(data.payload(), device.rssi()) {
                Some(adv) => {
                    let _ = adv_tx.try_send(adv);
                }
                None => log::debug!("Dropping {}-byte advertisement", data.payload().len()),
            }
            None::<()> // Continue scanning
        }));

        if let Err(e) = result {
            log::error!("BLE scan error: {:?}", e);
            thread::sleep(Duration::from_secs(1));
        }
    }
}
