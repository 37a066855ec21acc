//! Content hashing.
//!
//! Change detection compares canonical text directly, so hashing is only
//! needed where a short stable token has to stand in for a larger input:
//! digest-minted identities and whatever fingerprinting a host wants to do
//! over rendered markup.

use std::fmt::Write as _;

use compact_str::CompactString;
use xxhash_rust::xxh3::xxh3_64;

/// 64-bit xxHash3 of raw bytes.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// 64-bit xxHash3 of a string.
#[inline]
pub fn hash_str(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Hash rendered as 16 lowercase hex characters.
pub fn to_hex(hash: u64) -> CompactString {
    let mut hex = CompactString::default();
    let _ = write!(hex, "{hash:016x}");
    hex
}

/// Hex fingerprint of a string in one step.
pub fn content_hash(text: &str) -> CompactString {
    to_hex(hash_str(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_hash() {
        assert_eq!(hash_str("markup"), hash_str("markup"));
        assert_eq!(hash_str("markup"), hash_bytes(b"markup"));
    }

    #[test]
    fn test_different_input_different_hash() {
        assert_ne!(hash_str("<p>a</p>"), hash_str("<p>b</p>"));
    }

    #[test]
    fn test_hex_form() {
        let hex = content_hash("template content");
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
