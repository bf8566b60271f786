// Consensus-critical. Changes require a protocol upgrade + tests.
//! Protocol-wide constants for Strata.
//!
//! The window sizes, cut count, target interval and future-time-limit below
//! are only *defaults*: retargeting code reads them from a
//! [`DifficultyParams`](crate::DifficultyParams) value so that several
//! networks can coexist in one process. The fixed algorithm constants at the
//! bottom of this file are part of the algorithms themselves.

/// Length in bytes of a 32-byte hash.
pub const HASH32_LEN: usize = 32;

/// Block time target in seconds (mainnet).
pub const DIFFICULTY_TARGET_SECS: u64 = 120;

/// Block time target in seconds (testnet).
pub const TESTNET_DIFFICULTY_TARGET_SECS: u64 = 60;

/// Classic averager window, in blocks, before consensus version 6.
pub const DIFFICULTY_WINDOW: usize = 720;

/// Timestamps cut from each end of the sorted classic window.
pub const DIFFICULTY_CUT: usize = 60;

/// Classic averager window, in blocks, from consensus version 6.
pub const DIFFICULTY_WINDOW_V6_OLD: usize = 735;

/// First consensus version that uses [`DIFFICULTY_WINDOW_V6_OLD`].
pub const CLASSIC_V6_WINDOW_FROM_VERSION: u8 = 6;

/// LWMA1 and LWMA2 window (N = 60 for T = 120).
pub const DIFFICULTY_WINDOW_V6: usize = 60;

/// LWMA3 window.
pub const DIFFICULTY_WINDOW_V9: usize = 60;

/// Maximum allowed clock skew of a block timestamp (FTL = 3 * T).
pub const BLOCK_FUTURE_TIME_LIMIT_V6: u64 = 3 * DIFFICULTY_TARGET_SECS;

/// First consensus version retargeting with LWMA1.
pub const LWMA1_FROM_VERSION: u8 = 7;

/// First consensus version retargeting with LWMA2.
pub const LWMA2_FROM_VERSION: u8 = 8;

/// First consensus version retargeting with LWMA3.
pub const LWMA3_FROM_VERSION: u8 = 9;

/// Hard upper bound on any configured difficulty window.
///
/// Keeps every retargeting loop bounded regardless of network parameters.
pub const MAX_DIFFICULTY_WINDOW: usize = 1024;

/// LWMA1 gives away blocks at difficulty 1 while fewer samples than this exist.
pub const LWMA1_BOOTSTRAP_SAMPLES: usize = 6;

/// Difficulty returned by LWMA1 during bootstrap.
pub const LWMA1_BOOTSTRAP_DIFFICULTY: u64 = 1;

/// LWMA2 returns [`LWMA_STARTUP_DIFFICULTY`] at or below this many samples.
pub const LWMA2_STARTUP_SAMPLES: usize = 6;

/// LWMA3 returns [`LWMA_STARTUP_DIFFICULTY`] at or below this many samples.
pub const LWMA3_STARTUP_SAMPLES: usize = 10;

/// Startup guess for LWMA2/LWMA3 (deliberately low).
pub const LWMA_STARTUP_DIFFICULTY: u64 = 100;

/// Difficulty returned by the classic averager with fewer than two timestamps.
pub const CLASSIC_BOOTSTRAP_DIFFICULTY: u64 = 1;
