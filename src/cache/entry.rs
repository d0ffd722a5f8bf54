//! Cache entry framing
//!
//! Every persisted entry is a single file: a fixed magic, a little-endian
//! header length, a JSON header, then the gzip-compressed JSON payload. The
//! header carries the schema version, the logical key, timestamps, sizes,
//! and an FNV-1a integrity stamp over the compressed bytes. Readers validate
//! the header before touching the payload; any mismatch is treated as a miss
//! and the entry is deleted by the store.

use std::io::{Read, Write};

use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::hashing::fnv1a_bytes;

/// Bump to invalidate every cache at once
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// File magic for cache entries
pub const CACHE_MAGIC: &[u8; 4] = b"TMC1";

/// Default deflate level for payloads
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Framed header preceding every compressed payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryHeader {
    pub schema_version: u32,

    /// Logical key as given by the caller (not the hashed file name)
    pub key: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    pub uncompressed_len: u64,
    pub compressed_len: u64,

    /// FNV-1a over the compressed payload bytes, hex-encoded
    pub stamp: String,
}

impl CacheEntryHeader {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Encode a value into the framed on-disk representation
pub fn encode_entry<T: Serialize>(
    key: &str,
    value: &T,
    ttl: Duration,
    compression_level: u32,
) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value).map_err(|e| EngineError::CacheIntegrity {
        key: format!("{} (encode: {})", key, e),
    })?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(compression_level));
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let now = Utc::now();
    let header = CacheEntryHeader {
        schema_version: CACHE_SCHEMA_VERSION,
        key: key.to_string(),
        created_at: now,
        expires_at: now + ttl,
        uncompressed_len: json.len() as u64,
        compressed_len: compressed.len() as u64,
        stamp: format!("{:016x}", fnv1a_bytes(&compressed)),
    };
    let header_json = serde_json::to_vec(&header).map_err(|e| EngineError::CacheIntegrity {
        key: format!("{} (header: {})", key, e),
    })?;

    let mut out = Vec::with_capacity(8 + header_json.len() + compressed.len());
    out.extend_from_slice(CACHE_MAGIC);
    out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_json);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Read just the header of an encoded entry
pub fn decode_header(bytes: &[u8]) -> Result<(CacheEntryHeader, usize)> {
    if bytes.len() < 8 || &bytes[..4] != CACHE_MAGIC {
        return Err(EngineError::CacheIntegrity {
            key: "bad magic".to_string(),
        });
    }
    let header_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let payload_start = 8 + header_len;
    if bytes.len() < payload_start {
        return Err(EngineError::CacheIntegrity {
            key: "truncated header".to_string(),
        });
    }
    let header: CacheEntryHeader =
        serde_json::from_slice(&bytes[8..payload_start]).map_err(|_| {
            EngineError::CacheIntegrity {
                key: "undecodable header".to_string(),
            }
        })?;
    if header.schema_version != CACHE_SCHEMA_VERSION {
        return Err(EngineError::CacheIntegrity {
            key: header.key.clone(),
        });
    }
    Ok((header, payload_start))
}

/// Decode and validate a full entry
pub fn decode_entry<T: DeserializeOwned>(bytes: &[u8]) -> Result<(CacheEntryHeader, T)> {
    let (header, payload_start) = decode_header(bytes)?;
    let compressed = &bytes[payload_start..];

    if compressed.len() as u64 != header.compressed_len {
        return Err(EngineError::CacheIntegrity {
            key: header.key.clone(),
        });
    }
    let stamp = format!("{:016x}", fnv1a_bytes(compressed));
    if stamp != header.stamp {
        return Err(EngineError::CacheIntegrity {
            key: header.key.clone(),
        });
    }

    let mut decoder = GzDecoder::new(compressed);
    let mut json = Vec::with_capacity(header.uncompressed_len as usize);
    decoder
        .read_to_end(&mut json)
        .map_err(|_| EngineError::CacheIntegrity {
            key: header.key.clone(),
        })?;
    let value = serde_json::from_slice(&json).map_err(|_| EngineError::CacheIntegrity {
        key: header.key.clone(),
    })?;
    Ok((header, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<u32>,
    }

    fn sample() -> Sample {
        Sample {
            name: "calc".to_string(),
            values: (0..100).collect(),
        }
    }

    #[test]
    fn test_round_trip() {
        let bytes =
            encode_entry("k1", &sample(), Duration::days(7), DEFAULT_COMPRESSION_LEVEL).unwrap();
        let (header, value): (_, Sample) = decode_entry(&bytes).unwrap();
        assert_eq!(value, sample());
        assert_eq!(header.key, "k1");
        assert!(header.compressed_len <= header.uncompressed_len);
        assert!(!header.is_expired(Utc::now()));
    }

    #[test]
    fn test_corrupt_payload_fails_stamp() {
        let mut bytes =
            encode_entry("k1", &sample(), Duration::days(7), DEFAULT_COMPRESSION_LEVEL).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode_entry::<Sample>(&bytes).unwrap_err();
        assert!(matches!(err, EngineError::CacheIntegrity { .. }));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes =
            encode_entry("k1", &sample(), Duration::days(7), DEFAULT_COMPRESSION_LEVEL).unwrap();
        bytes[0] = b'X';
        assert!(decode_entry::<Sample>(&bytes).is_err());
    }

    #[test]
    fn test_expiry() {
        let bytes =
            encode_entry("k1", &sample(), Duration::seconds(-1), DEFAULT_COMPRESSION_LEVEL)
                .unwrap();
        let (header, _): (_, Sample) = decode_entry(&bytes).unwrap();
        assert!(header.is_expired(Utc::now()));
    }
}
