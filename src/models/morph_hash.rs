//! Fixed-width locality-sensitive fingerprint.
//!
//! Bits are stored MSB-first: bit 0 is the top bit of the first word and the
//! first hex digit after `0x`. Every hash carries the scheme version that
//! produced it; distances across versions are refused.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;

pub const HASH_BITS: usize = 256;
const WORDS: usize = HASH_BITS / 64;

/// Version of the hash scheme: grid, features, group weights and basis seed.
/// Bump whenever any of them changes.
pub const HASH_SCHEME_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Hash must be 0x followed by {expected} hex digits, got {found} characters")]
    Length { expected: usize, found: usize },

    #[error("Invalid hex digit in hash: {0}")]
    Digit(String),
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MorphHashRepr", into = "MorphHashRepr")]
pub struct MorphHash {
    words: [u64; WORDS],
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct MorphHashRepr {
    version: u32,
    hex: String,
}

impl MorphHash {
    pub fn from_words(words: [u64; WORDS], version: u32) -> Self {
        Self { words, version }
    }

    /// Build from a bit sequence; missing trailing bits are zero.
    pub fn from_bits(bits: &[bool], version: u32) -> Self {
        let mut words = [0u64; WORDS];
        for (i, _) in bits.iter().take(HASH_BITS).enumerate().filter(|(_, b)| **b) {
            words[i / 64] |= 1u64 << (63 - i % 64);
        }
        Self { words, version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn words(&self) -> &[u64; WORDS] {
        &self.words
    }

    pub fn bit(&self, index: usize) -> bool {
        index < HASH_BITS && self.words[index / 64] >> (63 - index % 64) & 1 == 1
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(2 + HASH_BITS / 4);
        out.push_str("0x");
        for word in &self.words {
            out.push_str(&format!("{word:016x}"));
        }
        out
    }

    pub fn from_hex(hex: &str, version: u32) -> Result<Self, HashParseError> {
        let digits = hex.strip_prefix("0x").unwrap_or(hex);
        if digits.len() != HASH_BITS / 4 {
            return Err(HashParseError::Length {
                expected: HASH_BITS / 4,
                found: digits.len(),
            });
        }
        // from_str_radix alone would accept a leading '+'
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashParseError::Digit(digits.to_string()));
        }
        let mut words = [0u64; WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            let chunk = digits
                .get(i * 16..(i + 1) * 16)
                .ok_or_else(|| HashParseError::Digit(digits.to_string()))?;
            *word = u64::from_str_radix(chunk, 16)
                .map_err(|_| HashParseError::Digit(chunk.to_string()))?;
        }
        Ok(Self { words, version })
    }

    /// Number of differing bits. Hashes from different scheme versions are
    /// never comparable.
    pub fn hamming(&self, other: &MorphHash) -> Result<u32, EngineError> {
        if self.version != other.version {
            return Err(EngineError::VersionMismatch {
                expected: self.version,
                found: other.version,
            });
        }
        Ok(self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }
}

impl fmt::Debug for MorphHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MorphHash(v{}, {})", self.version, self.to_hex())
    }
}

impl fmt::Display for MorphHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<MorphHash> for MorphHashRepr {
    fn from(hash: MorphHash) -> Self {
        Self {
            version: hash.version,
            hex: hash.to_hex(),
        }
    }
}

impl TryFrom<MorphHashRepr> for MorphHash {
    type Error = HashParseError;

    fn try_from(repr: MorphHashRepr) -> Result<Self, Self::Error> {
        MorphHash::from_hex(&repr.hex, repr.version)
    }
}
