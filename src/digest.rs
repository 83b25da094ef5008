//! Hashing helpers used to derive stable, short identifiers (a [`NamedMutex`]
//! semaphore path, a cache key) from arbitrary byte strings.
//!
//! [`NamedMutex`]: crate::ipc::NamedMutex

use sha2::{Digest, Sha256};

/// Lower-hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

/// Lower-hex encoding, equivalent to `{:02x}` over every byte.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xedb8_8320 } else { crc >> 1 };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Streaming CRC-32 (IEEE 802.3 polynomial), mirroring the `Crc32` digest
/// found alongside the crate's other small non-cryptographic hashes: an
/// accumulator that starts all-ones and is complemented on [`Crc32::get`].
#[derive(Debug, Clone)]
pub struct Crc32 {
    hash: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32 { hash: !0 }
    }

    pub fn add(&mut self, data: &[u8]) {
        for &byte in data {
            let idx = ((self.hash ^ byte as u32) & 0xff) as usize;
            self.hash = (self.hash >> 8) ^ CRC32_TABLE[idx];
        }
    }

    pub fn clear(&mut self) {
        self.hash = !0;
    }

    pub fn get(&self) -> u32 {
        !self.hash
    }
}

/// One-shot convenience wrapper around [`Crc32`].
pub fn crc32(data: &[u8]) -> u32 {
    let mut h = Crc32::new();
    h.add(data);
    h.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_of_known_string() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn sha256_is_stable() {
        let a = sha256_hex(b"waitcore");
        let b = sha256_hex(b"waitcore");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
