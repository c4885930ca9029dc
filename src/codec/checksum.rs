//! Checksums for block trailers and file footers

use crc32fast::Hasher;

/// 64-bit XOR fold over little-endian words; the short tail is zero padded.
/// Used as the per-block trailer.
pub fn xor64(bytes: &[u8]) -> u64 {
    let mut acc = 0u64;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        acc ^= u64::from_le_bytes(chunk.try_into().unwrap());
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut word = [0u8; 8];
        word[..tail.len()].copy_from_slice(tail);
        acc ^= u64::from_le_bytes(word);
    }
    acc
}

/// File-level checksum stored in the 64-bit footer/trailer fields.
///
/// Algorithm: crc32fast (CRC32) widened to u64.
pub fn crc64(bytes: &[u8]) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize() as u64
}
