// Consensus-critical. Changes require a protocol upgrade + tests.
//! Canonical primitive types shared by the retargeting and proof-of-work code.

use crate::constants::HASH32_LEN;
use core::fmt;
use core::str::FromStr;

/// Block timestamp in seconds since the Unix epoch, as set by the producer.
///
/// Not guaranteed to be monotonic across a chain.
pub type Timestamp = u64;

/// Difficulty the next block's hash must beat. Zero is never a valid value.
pub type Difficulty = u64;

/// Running sum of per-block difficulty up to and including a block.
pub type CumulativeDifficulty = u64;

/// Errors related to parsing core protocol types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Hex string had an unexpected byte length.
    #[error("invalid hex length: expected {expected} bytes, got {got} bytes")]
    InvalidHexLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        got: usize,
    },

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Fixed-size 32-byte hash, read as a 256-bit little-endian integer for PoW.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash32(pub [u8; HASH32_LEN]);

impl Hash32 {
    /// Returns an all-zero hash.
    pub const fn zero() -> Self {
        Self([0u8; HASH32_LEN])
    }

    /// Returns the underlying byte array.
    pub const fn as_bytes(&self) -> &[u8; HASH32_LEN] {
        &self.0
    }

    /// The four 64-bit limbs of the hash, least significant first.
    ///
    /// Each limb is decoded little-endian, independent of host byte order.
    pub fn limbs_le(&self) -> [u64; 4] {
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(self.0.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(word);
        }
        limbs
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Hash32 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH32_LEN {
            return Err(CoreError::InvalidHexLength {
                expected: HASH32_LEN,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; HASH32_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}
