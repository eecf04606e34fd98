/// NDJSON status line for the diagnostic log.
///
/// Uses `serde-json-core` into a fixed buffer; no allocation.
use serde::Serialize;

use crate::board;
use crate::observer::{Observer, ObserverStats};

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized status line
pub const MAX_MSG_LEN: usize = 512;

/// Messages written to the diagnostic log
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Pipeline status, logged after each drained buffer
    #[serde(rename = "status")]
    Status {
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
        /// Uptime in seconds
        uptime: u32,
        /// Current fill buffer index
        fill: usize,
        /// Current print buffer index
        print: usize,
        stats: &'a ObserverStats,
    },
}

impl<'a> DeviceMessage<'a> {
    /// Status snapshot of a running observer.
    pub fn status<const N: usize, const CAP: usize, const CHUNK: usize>(
        observer: &'a Observer<N, CAP, CHUNK>,
        uptime: u32,
    ) -> Self {
        DeviceMessage::Status {
            board: board::BOARD_NAME,
            version: VERSION,
            uptime,
            fill: observer.pool().fill_index(),
            print: observer.pool().print_index(),
            stats: observer.stats(),
        }
    }
}

/// Serialize a DeviceMessage to JSON bytes followed by a newline.
/// Returns the number of bytes written, or None if it does not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(msg, buf).ok()?;
    if len < buf.len() {
        buf[len] = b'\n';
        Some(len + 1)
    } else {
        Some(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_json(stats: &ObserverStats) -> String {
        let msg = DeviceMessage::Status {
            board: "test_board",
            version: VERSION,
            uptime: 120,
            fill: 2,
            print: 1,
            stats,
        };
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serialize_message(&msg, &mut buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap().into()
    }

    #[test]
    fn serialize_status_message() {
        let stats = ObserverStats {
            adverts: 40,
            url_frames: 12,
            stored: 9,
            duplicates: 3,
            ..Default::default()
        };
        let json = status_json(&stats);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""board":"test_board""#));
        assert!(json.contains(r#""fill":2"#));
        assert!(json.contains(r#""print":1"#));
        assert!(json.contains(r#""adverts":40"#));
        assert!(json.contains(r#""duplicates":3"#));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn worst_case_status_fits() {
        let stats = ObserverStats {
            adverts: u32::MAX,
            url_frames: u32::MAX,
            stored: u32::MAX,
            duplicates: u32::MAX,
            malformed: u32::MAX,
            encoding_errors: u32::MAX,
            rotations: u32::MAX,
            capacity_rotations: u32::MAX,
            buffers_drained: u32::MAX,
        };
        let msg = DeviceMessage::Status {
            board: "m5stickc_plus2",
            version: "999.999.999",
            uptime: u32::MAX,
            fill: usize::MAX,
            print: usize::MAX,
            stats: &stats,
        };
        let mut buf = [0u8; MAX_MSG_LEN];
        assert!(serialize_message(&msg, &mut buf).is_some());
    }

    #[test]
    fn too_small_buffer_fails() {
        let stats = ObserverStats::default();
        let msg = DeviceMessage::Status {
            board: "b",
            version: VERSION,
            uptime: 0,
            fill: 0,
            print: 0,
            stats: &stats,
        };
        let mut buf = [0u8; 16];
        assert!(serialize_message(&msg, &mut buf).is_none());
    }

    #[test]
    fn status_snapshot_of_observer() {
        let observer = crate::UriObserver::default();
        let msg = DeviceMessage::status(&observer, 7);
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serialize_message(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""uptime":7"#));
        assert!(json.contains(board::BOARD_NAME));
        assert!(json.contains(r#""rotations":0"#));
    }

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
