//! Eddystone-URL observer library — passive BLE beacon decoding.
//!
//! Decodes Eddystone-URL frames out of raw advertisement payloads, keeps the
//! resulting URIs in a small pool of rotating text buffers (deduplicated per
//! buffer), and drains full buffers to an output sink a chunk at a time.
//! Everything here is `no_std`, allocation-free, and testable on the host
//! with `cargo test`. The firmware binaries (Embassy in `src/main.rs`,
//! ESP-IDF in `firmware-std/`) only supply advertisements, a clock, and a
//! sink.
//!
//! Pipeline: [`frame`] → [`decoder`] → [`pool`], with [`observer`] tying them
//! to the [`drain`] state machine and the [`sched`] task queue.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod config;
pub mod decoder;
pub mod drain;
pub mod error;
pub mod frame;
pub mod observer;
pub mod pool;
pub mod report;
pub mod sched;
pub mod tables;

pub use error::{EncodingError, Error};
pub use observer::{Observer, ObserverStats, Sighting, UriObserver};
