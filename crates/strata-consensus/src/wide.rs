// Consensus-critical. Changes require a protocol upgrade + tests.
//! 64x64 -> 128-bit multiplication and carry primitives.
//!
//! Two interchangeable multiply strategies exist: [`NativeMul`] uses the
//! compiler's double-width product, [`PortableMul`] assembles the product from
//! four 32x32 partial products. [`DefaultMul`] picks one from the target's
//! word size; both must agree bit for bit on every input.

/// A strategy for the exact 128-bit product of two `u64`s.
pub trait WideMul {
    /// Human-readable strategy name.
    const NAME: &'static str;

    /// Returns `(low, high)` halves of `a * b`.
    fn mul_wide(a: u64, b: u64) -> (u64, u64);
}

/// Native double-width multiply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMul;

impl WideMul for NativeMul {
    const NAME: &'static str = "native";

    #[inline]
    fn mul_wide(a: u64, b: u64) -> (u64, u64) {
        let product = u128::from(a) * u128::from(b);
        (product as u64, (product >> 64) as u64)
    }
}

/// Four-way 32-bit decomposition for targets without a cheap 128-bit product.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableMul;

impl WideMul for PortableMul {
    const NAME: &'static str = "portable";

    #[inline]
    fn mul_wide(a: u64, b: u64) -> (u64, u64) {
        const MASK: u64 = 0xffff_ffff;

        let a_lo = a & MASK;
        let a_hi = a >> 32;
        let b_lo = b & MASK;
        let b_hi = b >> 32;

        // None of these sums can exceed 64 bits: (2^32-1)^2 + (2^32-1) < 2^64.
        let ll = a_lo * b_lo;
        let hl = a_hi * b_lo + (ll >> 32);
        let lh = a_lo * b_hi;
        let hh = a_hi * b_hi + (lh >> 32);

        let mid = (hl & MASK) + (lh & MASK);
        let low = (mid << 32) | (ll & MASK);

        let upper = (hl >> 32) + (hh & MASK) + (mid >> 32);
        let high = (upper & MASK) | (((hh >> 32) + (upper >> 32)) << 32);

        (low, high)
    }
}

/// Strategy used by [`multiply`] on this target.
#[cfg(target_pointer_width = "64")]
pub type DefaultMul = NativeMul;

/// Strategy used by [`multiply`] on this target.
#[cfg(not(target_pointer_width = "64"))]
pub type DefaultMul = PortableMul;

/// Exact 128-bit product of `a` and `b` as `(low, high)`.
#[inline]
pub fn multiply(a: u64, b: u64) -> (u64, u64) {
    DefaultMul::mul_wide(a, b)
}

/// True iff `a + b` overflows 64 bits.
#[inline]
pub fn carry_add(a: u64, b: u64) -> bool {
    a.overflowing_add(b).1
}

/// True iff `a + b + carry_in` overflows 64 bits.
#[inline]
pub fn carry_add_with_carry(a: u64, b: u64, carry_in: bool) -> bool {
    let (sum, first) = a.overflowing_add(b);
    let (_, second) = sum.overflowing_add(u64::from(carry_in));
    first || second
}
