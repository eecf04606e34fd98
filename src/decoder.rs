//! Eddystone-URL expansion.
//!
//! Turns the encoded URL bytes of a [`UrlFrame`](crate::frame::UrlFrame)
//! into `<scheme><body> : <rssi>\n`. Pure: no state, no logging.

use core::fmt::Write;

use heapless::String;

use crate::error::EncodingError;
use crate::frame::URL_MAX_LEN;
use crate::tables::{self, MAX_PREFIX_LEN, MAX_SUFFIX_LEN};

/// Longest RSSI annotation: " : -128\n".
pub const ANNOTATION_MAX_LEN: usize = 8;

/// Worst-case expansion of a maximum-length URL frame (122), rounded up.
pub const DECODED_URI_CAPACITY: usize = 128;

const _: () = assert!(
    MAX_PREFIX_LEN + (URL_MAX_LEN - 1) * MAX_SUFFIX_LEN + ANNOTATION_MAX_LEN
        <= DECODED_URI_CAPACITY
);

/// A decoded URI line, annotation included.
pub type DecodedUri = String<DECODED_URI_CAPACITY>;

/// Expand an encoded URL and append the signal strength annotation.
///
/// Body bytes below 14 expand through the suffix table; every other byte is
/// taken as a literal character.
pub fn decode_url(encoded: &[u8], rssi: i8) -> Result<DecodedUri, EncodingError> {
    let (&scheme, body) = encoded.split_first().ok_or(EncodingError::EmptyPayload)?;
    let prefix = tables::prefix(scheme).ok_or(EncodingError::UnknownScheme(scheme))?;

    let mut uri = DecodedUri::new();
    uri.push_str(prefix).map_err(|_| EncodingError::Overflow)?;

    for &byte in body {
        let pushed = match tables::suffix(byte) {
            Some(suffix) => uri.push_str(suffix),
            None => uri.push(char::from(byte)),
        };
        pushed.map_err(|_| EncodingError::Overflow)?;
    }

    writeln!(uri, " : {rssi}").map_err(|_| EncodingError::Overflow)?;
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_example_dot_com() {
        let encoded = [0x00, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x07];
        let uri = decode_url(&encoded, -67).unwrap();
        assert_eq!(uri.as_str(), "http://www.example.com : -67\n");
    }

    #[test]
    fn decodes_every_scheme() {
        for (code, prefix) in tables::PREFIXES.iter().enumerate() {
            let uri = decode_url(&[code as u8, b'x'], -40).unwrap();
            assert!(uri.starts_with(prefix), "{uri} should start with {prefix}");
        }
    }

    #[test]
    fn expands_suffixes_mid_url() {
        let encoded = [0x03, b'g', b'o', b'o', 0x00, b'x', b'y', b'z'];
        let uri = decode_url(&encoded, 0).unwrap();
        assert_eq!(uri.as_str(), "https://goo.com/xyz : 0\n");
    }

    #[test]
    fn urn_uuid_scheme() {
        let uri = decode_url(&[0x04, b'a', b'b', b'c'], 4).unwrap();
        assert_eq!(uri.as_str(), "urn:uuid:abc : 4\n");
    }

    #[test]
    fn scheme_only() {
        let uri = decode_url(&[0x02], -100).unwrap();
        assert_eq!(uri.as_str(), "http:// : -100\n");
    }

    #[test]
    fn empty_payload_fails() {
        assert_eq!(decode_url(&[], -50), Err(EncodingError::EmptyPayload));
    }

    #[test]
    fn unknown_scheme_fails() {
        for scheme in [5u8, 14, b'h', 0xFF] {
            assert_eq!(
                decode_url(&[scheme, b'a', 0x07], -50),
                Err(EncodingError::UnknownScheme(scheme))
            );
        }
    }

    #[test]
    fn worst_case_frame_fits() {
        // "https://www." + 17 × ".info/" + " : -128\n"
        let mut encoded = [0x04u8; URL_MAX_LEN];
        encoded[0] = 0x01;
        let uri = decode_url(&encoded, i8::MIN).unwrap();
        assert_eq!(uri.len(), 12 + 17 * 6 + 8);
        assert!(uri.ends_with(".info/ : -128\n"));
    }

    #[test]
    fn oversized_input_overflows_instead_of_truncating() {
        let mut encoded = [0x04u8; 40];
        encoded[0] = 0x01;
        assert_eq!(decode_url(&encoded, -1), Err(EncodingError::Overflow));
    }

    #[test]
    fn high_bytes_are_literal_characters() {
        let uri = decode_url(&[0x02, b'a', 0xE9], -1).unwrap();
        assert_eq!(uri.as_str(), "http://a\u{e9} : -1\n");
    }
}
