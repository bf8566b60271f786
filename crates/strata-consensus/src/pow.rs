// Consensus-critical. Changes require a protocol upgrade + tests.
//! Proof-of-work target check.
//!
//! A hash `h` (256-bit little-endian integer) satisfies difficulty `d` iff
//!     h * d < 2^256
//! The product is built limb by limb from four 64x64 multiplications and
//! two carry chains, never materializing a 320-bit value.

use crate::error::ConsensusError;
use crate::wide::{carry_add, carry_add_with_carry, DefaultMul, WideMul};
use strata_core::{Difficulty, Hash32};

/// True iff `hash * difficulty` fits in 256 bits.
///
/// Runs once per mining attempt; keep it allocation- and log-free.
#[inline]
pub fn check_hash(hash: &Hash32, difficulty: Difficulty) -> bool {
    check_hash_with::<DefaultMul>(hash, difficulty)
}

/// [`check_hash`] with an explicit multiply strategy.
#[inline]
pub fn check_hash_with<M: WideMul>(hash: &Hash32, difficulty: Difficulty) -> bool {
    let limbs = hash.limbs_le();

    // Most random hashes fail here, so test the top limb first.
    let (top, high) = M::mul_wide(limbs[3], difficulty);
    if high != 0 {
        return false;
    }

    let (_, cur) = M::mul_wide(limbs[0], difficulty);
    let (low, high) = M::mul_wide(limbs[1], difficulty);
    let mut carry = carry_add(cur, low);
    let cur = high;
    let (low, high) = M::mul_wide(limbs[2], difficulty);
    carry = carry_add_with_carry(cur, low, carry);
    carry = carry_add_with_carry(high, top, carry);
    !carry
}

/// Validate a block hash against the difficulty required for its height.
pub fn validate_pow(hash: &Hash32, difficulty: Difficulty) -> Result<(), ConsensusError> {
    if difficulty == 0 {
        return Err(ConsensusError::ZeroDifficulty);
    }
    if !check_hash(hash, difficulty) {
        return Err(ConsensusError::InsufficientPoW);
    }
    Ok(())
}
