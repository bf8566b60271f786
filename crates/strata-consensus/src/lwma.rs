// Consensus-critical. Changes require a protocol upgrade + tests.
//! Linearly Weighted Moving Average retargeting, three generations.
//!
//! - LWMA1 ([`next_difficulty_v2`]): harmonic mean of difficulties over a
//!   weighted average solve time, computed in `f64`.
//! - LWMA2 ([`next_difficulty_v3`]): integer-only, per-block clamp to
//!   67%..150% of the previous difficulty plus a fast-block stabilizer.
//! - LWMA3 ([`next_difficulty_v9`]): LWMA2 over timestamps forced strictly
//!   increasing, with a softer stabilizer.
//!
//! All inputs are ordered oldest -> newest. Solve time `i` is
//! `timestamps[i] - timestamps[i - 1]` and gets weight `i`, so the newest
//! block counts the most.

use crate::error::ConsensusError;
use crate::window::DifficultyWindow;
use strata_core::{
    CumulativeDifficulty, Difficulty, DifficultyParams, Timestamp, LWMA1_BOOTSTRAP_DIFFICULTY,
    LWMA1_BOOTSTRAP_SAMPLES, LWMA2_STARTUP_SAMPLES, LWMA3_STARTUP_SAMPLES,
    LWMA_STARTUP_DIFFICULTY,
};
use tracing::{debug, trace, warn};

/// Empirical correction bringing the LWMA1 average solve time to target.
const LWMA1_ADJUST: f64 = 0.998;

/// 2^64 as `f64`; anything at or above it does not fit a `u64`.
const U64_LIMIT_F64: f64 = 18_446_744_073_709_551_616.0;

/// LWMA2 fast-block floor, percent of the previous difficulty.
const LWMA2_STABILIZER_PCT: i128 = 110;

/// LWMA3 fast-block floor, percent of the previous difficulty.
const LWMA3_STABILIZER_PCT: i128 = 108;

/// Next difficulty with LWMA1.
///
/// The first [`LWMA1_BOOTSTRAP_SAMPLES`] - 1 blocks are given away at
/// difficulty 1. Solve times are clamped to `[-7T, 7T]`.
///
/// Uses IEEE-754 binary64 arithmetic in a fixed operation order with no
/// fused multiply-add, so results are reproducible on conforming targets.
///
/// # Panics
///
/// If the two sequences differ in length or cumulative difficulty decreases.
pub fn next_difficulty_v2(
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
    target_seconds: u64,
    params: &DifficultyParams,
) -> Result<Difficulty, ConsensusError> {
    let mut window = DifficultyWindow::new(timestamps, cumulative_difficulties);
    window.keep_recent(params.lwma1_window() + 1);

    let samples = window.len();
    if samples < LWMA1_BOOTSTRAP_SAMPLES {
        debug!(samples, "lwma1: bootstrap difficulty");
        return Ok(LWMA1_BOOTSTRAP_DIFFICULTY);
    }
    // Trimmed to N + 1 above; a filling window shrinks N.
    let n = samples - 1;

    let t = i128::from(target_seconds);
    let k = (n * (n + 1) / 2) as f64;

    let mut lwma = 0.0f64;
    let mut sum_inverse_d = 0.0f64;
    for i in 1..=n {
        let solve_time = window.solve_time(i).clamp(-7 * t, 7 * t);
        lwma += (solve_time * i as i128) as f64 / k;
        sum_inverse_d += 1.0 / window.block_difficulty(i) as f64;
    }

    // Keep LWMA sane if something unforeseen happens.
    let lwma_floor = t / 20;
    if (lwma.round() as i128) < lwma_floor {
        lwma = lwma_floor as f64;
    }

    let harmonic_mean_d = n as f64 / sum_inverse_d * LWMA1_ADJUST;
    let next = harmonic_mean_d * target_seconds as f64 / lwma;
    trace!(n, lwma, harmonic_mean_d, next, "lwma1: window summary");

    if !next.is_finite() || next >= U64_LIMIT_F64 {
        warn!(next, "lwma1: difficulty overflow");
        return Err(ConsensusError::DifficultyOverflow);
    }
    // Truncates toward zero; negative values saturate to zero.
    checked_difficulty("lwma1", next as i128)
}

/// Next difficulty with LWMA2.
///
/// Solve times are clamped to `[-FTL, 6T]`; `T` is `target_seconds` and FTL
/// comes from the params. Returns [`LWMA_STARTUP_DIFFICULTY`] while
/// [`LWMA2_STARTUP_SAMPLES`] or fewer samples exist.
///
/// # Panics
///
/// If the two sequences differ in length or cumulative difficulty decreases.
pub fn next_difficulty_v3(
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
    target_seconds: u64,
    params: &DifficultyParams,
) -> Result<Difficulty, ConsensusError> {
    let mut window = DifficultyWindow::new(timestamps, cumulative_difficulties);
    window.keep_recent(params.lwma2_window());

    let samples = window.len();
    if samples <= LWMA2_STARTUP_SAMPLES {
        debug!(samples, "lwma2: startup difficulty");
        return Ok(LWMA_STARTUP_DIFFICULTY);
    }
    let n = samples - 1;

    let t = i128::from(target_seconds);
    let ftl = i128::from(params.future_time_limit_secs());
    let sums = weigh(n, |i| window.solve_time(i).clamp(-ftl, 6 * t));

    clamp_to_previous("lwma2", &window, n, t, sums, LWMA2_STABILIZER_PCT)
}

/// Next difficulty with LWMA3.
///
/// Timestamps that do not exceed their predecessor are replaced by
/// predecessor + 1 before use, so every solve time is at least one second.
/// Solve times are capped at `6T` with `T` from the params. Returns
/// [`LWMA_STARTUP_DIFFICULTY`] while [`LWMA3_STARTUP_SAMPLES`] or fewer samples
/// exist.
///
/// # Panics
///
/// If the two sequences differ in length or cumulative difficulty decreases.
pub fn next_difficulty_v9(
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
    params: &DifficultyParams,
) -> Result<Difficulty, ConsensusError> {
    let mut window = DifficultyWindow::new(timestamps, cumulative_difficulties);
    window.keep_recent(params.lwma3_window() + 1);

    let samples = window.len();
    if samples <= LWMA3_STARTUP_SAMPLES {
        debug!(samples, "lwma3: startup difficulty");
        return Ok(LWMA_STARTUP_DIFFICULTY);
    }
    let n = samples - 1;

    let t = i128::from(params.target_secs());
    let timestamps = window.timestamps();
    let mut previous = i128::from(timestamps[0]);
    let sums = weigh(n, |i| {
        let current = i128::from(timestamps[i]).max(previous + 1);
        let solve_time = (current - previous).min(6 * t);
        previous = current;
        solve_time
    });

    clamp_to_previous("lwma3", &window, n, t, sums, LWMA3_STABILIZER_PCT)
}

/// Linearly weighted solve-time sum and the sum of the newest three.
#[derive(Debug, Clone, Copy)]
struct WeightedSums {
    weighted: i128,
    last_three: i128,
}

fn weigh(n: usize, mut solve_time: impl FnMut(usize) -> i128) -> WeightedSums {
    let mut sums = WeightedSums {
        weighted: 0,
        last_three: 0,
    };
    for i in 1..=n {
        let st = solve_time(i);
        sums.weighted += st * i as i128;
        if i + 3 > n {
            sums.last_three += st;
        }
    }
    sums
}

/// Shared LWMA2/LWMA3 tail: raw estimate, 67%..150% clamp, stabilizer.
fn clamp_to_previous(
    algorithm: &'static str,
    window: &DifficultyWindow,
    n: usize,
    t: i128,
    sums: WeightedSums,
    stabilizer_pct: i128,
) -> Result<Difficulty, ConsensusError> {
    let total_work = i128::from(window.work_between(0, n));
    let prev_d = i128::from(window.block_difficulty(n));
    // A negative sum yields a negative estimate that the clamps below absorb.
    // Zero has no quotient; treat it as the smallest positive sum.
    let weighted = if sums.weighted == 0 { 1 } else { sums.weighted };

    let raw = total_work
        .checked_mul(t)
        .and_then(|v| v.checked_mul(n as i128 + 1))
        .and_then(|v| v.checked_mul(99))
        .and_then(|v| v.checked_div(200 * weighted));
    let Some(raw) = raw else {
        warn!(algorithm, total_work, "difficulty overflow");
        return Err(ConsensusError::DifficultyOverflow);
    };

    let lower = prev_d * 67 / 100;
    let upper = prev_d * 150 / 100;
    let mut next = raw.min(upper).max(lower);

    // Blocks arriving suspiciously fast: do not let difficulty lag.
    if sums.last_three < 8 * t / 10 {
        next = next.max(prev_d * stabilizer_pct / 100);
    }
    trace!(
        algorithm,
        n,
        weighted = sums.weighted,
        last_three = sums.last_three,
        raw,
        prev_d,
        next,
        "window summary"
    );

    checked_difficulty(algorithm, next)
}

fn checked_difficulty(algorithm: &'static str, next: i128) -> Result<Difficulty, ConsensusError> {
    if next <= 0 {
        warn!(algorithm, next, "zero difficulty");
        return Err(ConsensusError::ZeroDifficulty);
    }
    Difficulty::try_from(next).map_err(|_| {
        warn!(algorithm, next, "difficulty overflow");
        ConsensusError::DifficultyOverflow
    })
}
