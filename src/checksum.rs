//! Weak CRC-32 as used by LVM2's metadata-area header and metadata text
//! checksums.
//!
//! This is the byte-reflected CRC-32 (the same polynomial as IEEE 802.3),
//! but with a caller-supplied initial value and no final XOR -- the value
//! LVM2 stores is the raw running register, compared directly. Built on
//! the `crc` crate's table/update functions the same way
//! agrover-melvin's `util::crc32_calc` and tasleson-melvin's
//! `util::crc32_calc` compute this exact checksum.

use crc::crc32;

/// The `crc` crate's `make_table` takes the polynomial, not a seed --
/// this is the reflected IEEE 802.3 polynomial, same as LVM2 uses.
const POLY: u32 = 0xEDB8_8320;

/// Computes the weak CRC-32 of `data`, seeded with `initial`.
///
/// The metadata-area header checksum seeds with `0xF597A6CF` and covers
/// bytes `[4, 512)` of the header. A stored checksum of zero means "not
/// present" and callers should skip verification rather than calling this.
///
/// `crc::crc32::update` follows the usual zlib convention of
/// complementing its running register on entry and exit; LVM2's weak
/// CRC has no such complementing, so the initial value and the result
/// are inverted here to cancel it back out -- the same trick
/// agrover-melvin/tasleson-melvin use for this checksum.
pub fn weak_crc32(data: &[u8], initial: u32) -> u32 {
    let table = crc32::make_table(POLY);
    !crc32::update(!initial, &table, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_vector() {
        // Plain CRC-32 (seed 0, standard IEEE reflected polynomial) of "123456789"
        // is the well known check value 0xCBF43926.
        assert_eq!(weak_crc32(b"123456789", 0), 0xCBF4_3926);
    }

    #[test]
    fn seed_changes_result() {
        let a = weak_crc32(b"hello world", 0);
        let b = weak_crc32(b"hello world", 0xF597_A6CF);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(weak_crc32(b"", 0xF597_A6CF), 0xF597_A6CF);
    }
}
