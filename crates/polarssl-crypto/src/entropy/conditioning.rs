//! SHA-256 conditioning of raw noise (NIST SP 800-90B §3.1.5.1.1).
//!
//! `output = SHA-256(0x01 || be32(output_bits) || raw)`

use sha2::{Digest, Sha256};

/// Conditioned block size in bytes.
pub const CONDITIONED_LEN: usize = 32;

/// Extra input entropy demanded on top of the output size.
const SECURITY_MARGIN_BITS: usize = 64;

/// Condition one block of raw noise.
pub fn condition(raw: &[u8]) -> [u8; CONDITIONED_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(((CONDITIONED_LEN * 8) as u32).to_be_bytes());
    hasher.update(raw);
    hasher.finalize().into()
}

/// Raw bytes needed from a source rated at `min_entropy_per_byte` bits so
/// that one conditioned block carries full entropy.
///
/// Returns `None` for a source that claims no entropy at all.
pub fn raw_bytes_needed(min_entropy_per_byte: u32) -> Option<usize> {
    if min_entropy_per_byte == 0 {
        return None;
    }
    let bits = CONDITIONED_LEN * 8 + SECURITY_MARGIN_BITS;
    Some(bits.div_ceil(min_entropy_per_byte.min(8) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_matches_reference_construction() {
        let raw = b"raw noise sample";
        let mut expected = Sha256::new();
        expected.update([0x01, 0x00, 0x00, 0x01, 0x00]);
        expected.update(raw);
        let expected: [u8; 32] = expected.finalize().into();
        assert_eq!(condition(raw), expected);
    }

    #[test]
    fn test_condition_is_input_sensitive() {
        assert_ne!(condition(b"a"), condition(b"b"));
        assert_eq!(condition(b"a"), condition(b"a"));
    }

    #[test]
    fn test_raw_bytes_needed() {
        assert_eq!(raw_bytes_needed(8), Some(40));
        assert_eq!(raw_bytes_needed(1), Some(320));
        assert_eq!(raw_bytes_needed(5), Some(64));
        // ratings above 8 bits per byte are clamped
        assert_eq!(raw_bytes_needed(12), Some(40));
        assert_eq!(raw_bytes_needed(0), None);
    }
}
