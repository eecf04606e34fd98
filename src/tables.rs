//! Eddystone-URL expansion tables.
//!
//! The first byte of an encoded URL selects a scheme prefix; every following
//! byte below [`SUFFIXES`]`.len()` expands to a common domain/path suffix.

/// URL scheme prefixes, indexed by the first encoded byte.
pub static PREFIXES: [&str; 5] = [
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "urn:uuid:",
];

/// Domain/path suffixes, indexed by any body byte below 14.
pub static SUFFIXES: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", // with trailing slash
    ".com", ".org", ".edu", ".net", ".info", ".biz", ".gov",
];

/// Longest entry in [`PREFIXES`] ("https://www.").
pub const MAX_PREFIX_LEN: usize = 12;

/// Longest entry in [`SUFFIXES`] (".info/").
pub const MAX_SUFFIX_LEN: usize = 6;

/// Look up the scheme prefix for `code`.
#[inline]
pub fn prefix(code: u8) -> Option<&'static str> {
    PREFIXES.get(code as usize).copied()
}

/// Look up the expansion for a body byte, `None` when it is a literal.
#[inline]
pub fn suffix(code: u8) -> Option<&'static str> {
    SUFFIXES.get(code as usize).copied()
}
