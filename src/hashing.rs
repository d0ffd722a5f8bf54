//! Deterministic content hashing
//!
//! FNV-1a is used everywhere a stable, portable fingerprint is needed: cache
//! keys, project content hashes, and snapshot file hashes. The hash must be
//! identical across runs and platforms, so no randomized hasher is used here.

/// 64-bit FNV-1a over raw bytes
pub fn fnv1a_bytes(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// 64-bit FNV-1a over a string
pub fn fnv1a_hash(input: &str) -> u64 {
    fnv1a_bytes(input.as_bytes())
}

/// Hex form used for cache file names and solution partition directories
pub fn hash_hex(input: &str) -> String {
    format!("{:016x}", fnv1a_hash(input))
}
