//! Error types for the decode → accumulate → drain pipeline.
//!
//! Everything except [`Error::PoolExhausted`] is scoped to a single
//! advertisement and is recovered by the observer.

use core::fmt;

/// Why a URL payload could not be expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    /// Payload has no scheme byte.
    EmptyPayload,
    /// Scheme byte is outside the prefix table.
    UnknownScheme(u8),
    /// Expansion does not fit the decoded URI capacity.
    Overflow,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::EmptyPayload => f.write_str("URL scheme was not encoded (empty payload)"),
            EncodingError::UnknownScheme(code) => {
                write!(f, "URL scheme was not encoded (scheme byte 0x{code:02X})")
            }
            EncodingError::Overflow => f.write_str("decoded URI exceeds capacity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An AD record runs past the end of the payload, or a URL frame carries
    /// more than the Eddystone maximum.
    MalformedAdvertisement {
        /// Offset of the offending record's length byte.
        offset: usize,
        /// Bytes the record claims (after the length byte).
        claimed: usize,
        /// Bytes actually left in the payload (after the length byte).
        available: usize,
    },
    Encoding(EncodingError),
    /// Advancing the fill index would land on the buffer still being printed.
    PoolExhausted { fill: usize, print: usize },
}

impl Error {
    /// Only pool exhaustion is unrecoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::PoolExhausted { .. })
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Error::Encoding(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedAdvertisement {
                offset,
                claimed,
                available,
            } => write!(
                f,
                "malformed advertisement: record at offset {offset} claims {claimed} bytes, {available} available"
            ),
            Error::Encoding(e) => write!(f, "{e}"),
            Error::PoolExhausted { fill, print } => write!(
                f,
                "buffer pool exhausted: fill index {fill} collides with print index {print}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pool_exhaustion_is_fatal() {
        assert!(Error::PoolExhausted { fill: 1, print: 1 }.is_fatal());
        assert!(!Error::Encoding(EncodingError::EmptyPayload).is_fatal());
        assert!(!Error::MalformedAdvertisement {
            offset: 0,
            claimed: 255,
            available: 9
        }
        .is_fatal());
    }

    #[test]
    fn pool_exhausted_names_both_indices() {
        let msg = Error::PoolExhausted { fill: 2, print: 2 }.to_string();
        assert!(msg.contains("fill index 2"));
        assert!(msg.contains("print index 2"));
    }

    #[test]
    fn encoding_error_display() {
        let msg = Error::from(EncodingError::UnknownScheme(0x05)).to_string();
        assert!(msg.contains("0x05"));
    }
}
