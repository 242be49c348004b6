// src/checksum.rs

//! CRC-32 checksum engine
//!
//! ISO-HDLC / PKZIP CRC-32 using the reflected polynomial `0xEDB88320`.
//! The lookup table is a compile-time constant, so every archive writer and
//! reader in the process shares the same read-only table without any
//! initialization step.

/// Reflected CRC-32 polynomial used by ZIP containers
pub const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Byte-indexed lookup table, built once at compile time
static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        let mut value = index as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ CRC32_POLYNOMIAL
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[index] = value;
        index += 1;
    }
    table
}

#[inline]
fn step(register: u32, byte: u8) -> u32 {
    CRC32_TABLE[((register ^ byte as u32) & 0xFF) as usize] ^ (register >> 8)
}

/// Compute the CRC-32 of a byte slice
///
/// # Example
/// ```
/// assert_eq!(walletpass::checksum::crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC-32 over the same table as [`crc32`]
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    register: u32,
}

impl Crc32 {
    /// Start a new checksum (register preset to all ones)
    pub const fn new() -> Self {
        Self {
            register: 0xFFFF_FFFF,
        }
    }

    /// Feed more bytes into the checksum
    pub fn update(&mut self, data: &[u8]) {
        self.register = data.iter().fold(self.register, |reg, &byte| step(reg, byte));
    }

    /// Return the checksum of everything fed so far
    pub const fn finalize(self) -> u32 {
        !self.register
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(crc32(b"a"), 0xE8B7_BE43);
        assert_eq!(
            crc32(b"The quick brown fox jumps over the lazy dog"),
            0x414F_A339
        );
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC32_TABLE[0], 0);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"pass.json manifest.json signature";
        let mut hasher = Crc32::new();
        for chunk in data.chunks(5) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), crc32(data));
    }

    #[test]
    fn test_matches_reference_implementation() {
        let mut payload = Vec::with_capacity(4096);
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..4096 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            payload.push((seed >> 16) as u8);
        }

        for len in [0usize, 1, 3, 17, 255, 256, 1000, 4096] {
            let slice = &payload[..len];
            assert_eq!(crc32(slice), crc32fast::hash(slice), "length {}", len);
        }
    }
}
