//! Build-time configuration.
//!
//! None of these are negotiable at runtime; the firmware binaries and the
//! library's type aliases read them directly.

/// Characters per URI text buffer.
pub const URI_BUFFER_SIZE: usize = 0x1000;

/// Safety margin: rotate once fewer than this many characters remain free.
pub const URI_BUFFER_THRESHOLD: usize = 0x80;

/// Number of URI text buffers in the rotating pool.
pub const NR_URI_BUFFERS: usize = 4;

/// Characters emitted to the sink per drain step.
pub const DRAIN_CHUNK_SIZE: usize = 0x20;

/// Delay between a finished drain and the next periodic rotation.
pub const ROTATE_DELAY_MS: u32 = 5000;

/// BLE scan interval in milliseconds (passive scan).
pub const SCAN_INTERVAL_MS: u64 = 1800;

/// BLE scan window in milliseconds.
pub const SCAN_WINDOW_MS: u64 = 1500;

/// Depth of the radio → observer advertisement channel.
pub const ADV_CHANNEL_DEPTH: usize = 16;
