/// Board identification.
///
/// Selected at compile time via the `board-*` feature flags; only used to
/// label the boot banner and the status line.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const BOARD_NAME: &str = "xiao_esp32s3";
    pub const CHIP: &str = "ESP32-S3";
}

#[cfg(all(feature = "board-m5stickc", not(feature = "board-xiao")))]
mod hw {
    pub const BOARD_NAME: &str = "m5stickc_plus2";
    pub const CHIP: &str = "ESP32";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
    pub const CHIP: &str = "host";
}

pub use hw::*;
