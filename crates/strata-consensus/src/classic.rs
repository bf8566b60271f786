// Consensus-critical. Changes require a protocol upgrade + tests.
//! Classic windowed-average retargeting (consensus versions before LWMA).
//!
//! The timestamps are sorted and trimmed of outliers at both ends; the same
//! cut positions are then used to index the *unsorted* cumulative
//! difficulties. That asymmetry is part of consensus and must not be
//! "repaired" by sorting the pairs together.

use crate::error::ConsensusError;
use crate::wide::{carry_add, multiply};
use crate::window::DifficultyWindow;
use strata_core::{
    ClassicWindow, CumulativeDifficulty, Difficulty, DifficultyParams, Timestamp,
    CLASSIC_BOOTSTRAP_DIFFICULTY,
};
use tracing::{debug, trace, warn};

/// Next difficulty from the classic windowed average.
///
/// The window size depends on `version` (see [`DifficultyParams::classic_window`]).
/// Returns [`ConsensusError::DifficultyOverflow`] when
/// `total_work * target_seconds` does not fit in 64 bits.
///
/// # Panics
///
/// If the two sequences differ in length or cumulative difficulty decreases.
pub fn next_difficulty(
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
    target_seconds: u64,
    version: u8,
    params: &DifficultyParams,
) -> Result<Difficulty, ConsensusError> {
    let classic = params.classic_window(version);
    let mut window = DifficultyWindow::new(timestamps, cumulative_difficulties);
    window.keep_recent(classic.size);

    let length = window.len();
    if length < 2 {
        debug!(length, "classic: bootstrap difficulty");
        return Ok(CLASSIC_BOOTSTRAP_DIFFICULTY);
    }

    let (mut timestamps, cumulative_difficulties) = window.into_parts();
    timestamps.sort_unstable();

    let (cut_begin, cut_end) = cut_bounds(length, classic);
    debug_assert!(cut_begin + 2 <= cut_end && cut_end <= length);

    let time_span = (timestamps[cut_end - 1] - timestamps[cut_begin]).max(1);
    let total_work = cumulative_difficulties[cut_end - 1] - cumulative_difficulties[cut_begin];
    trace!(cut_begin, cut_end, time_span, total_work, "classic: window summary");

    let (low, high) = multiply(total_work, target_seconds);
    if high != 0 || carry_add(low, time_span - 1) {
        warn!(total_work, target_seconds, time_span, "classic: difficulty overflow");
        return Err(ConsensusError::DifficultyOverflow);
    }

    let difficulty = (low + time_span - 1) / time_span;
    if difficulty == 0 {
        warn!(total_work, "classic: zero difficulty");
        return Err(ConsensusError::ZeroDifficulty);
    }
    Ok(difficulty)
}

/// Half-open range of sorted positions kept after cutting outliers.
fn cut_bounds(length: usize, classic: ClassicWindow) -> (usize, usize) {
    let kept = classic.kept();
    if length <= kept {
        (0, length)
    } else {
        let cut_begin = (length - kept + 1) / 2;
        (cut_begin, cut_begin + kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ParamsConfig;

    fn params_with(window: usize, cut: usize) -> DifficultyParams {
        DifficultyParams::try_from(ParamsConfig {
            classic_window: window,
            classic_window_v6: window,
            classic_cut: cut,
            ..ParamsConfig::default()
        })
        .expect("valid params")
    }

    #[test]
    fn fewer_than_two_timestamps_bootstrap() {
        let params = DifficultyParams::mainnet();
        assert_eq!(next_difficulty(vec![], vec![], 120, 1, &params), Ok(1));
        assert_eq!(next_difficulty(vec![5], vec![9], 120, 1, &params), Ok(1));
    }

    #[test]
    fn six_blocks_without_cut() {
        let params = params_with(8, 1);
        let timestamps = vec![0, 600, 1200, 1800, 2400, 3000];
        let cumulative = vec![0, 100, 200, 300, 400, 500];
        // ceil(500 * 600 / 3000)
        assert_eq!(next_difficulty(timestamps, cumulative, 600, 1, &params), Ok(100));
    }

    #[test]
    fn rounds_up() {
        let params = params_with(8, 1);
        // ceil(10 * 100 / 3) = 334
        assert_eq!(next_difficulty(vec![0, 3], vec![0, 10], 100, 1, &params), Ok(334));
    }

    #[test]
    fn equal_timestamps_use_unit_span() {
        let params = DifficultyParams::mainnet();
        assert_eq!(
            next_difficulty(vec![50, 50, 50], vec![0, 4, 8], 120, 1, &params),
            Ok(8 * 120)
        );
    }

    #[test]
    fn product_overflow_is_an_error() {
        let params = DifficultyParams::mainnet();
        let result = next_difficulty(vec![0, 1], vec![0, u64::MAX], 2, 1, &params);
        assert_eq!(result, Err(ConsensusError::DifficultyOverflow));

        let result = next_difficulty(vec![0, 1], vec![0, 1u64 << 62], 4, 1, &params);
        assert_eq!(result, Err(ConsensusError::DifficultyOverflow));
    }

    #[test]
    fn rounding_overflow_is_an_error() {
        let params = DifficultyParams::mainnet();
        // low = u64::MAX, time_span - 1 = 1 wraps.
        let result = next_difficulty(vec![0, 2], vec![0, u64::MAX], 1, 1, &params);
        assert_eq!(result, Err(ConsensusError::DifficultyOverflow));
    }

    #[test]
    fn sorted_cut_positions_index_unsorted_cumulative_difficulty() {
        let params = params_with(8, 1);
        let timestamps = vec![700, 0, 100, 200, 300, 400, 500, 600];
        let cumulative = vec![0, 100, 110, 120, 130, 140, 150, 1000];
        // 8 samples, 6 kept: positions 1..7.
        // span = sorted[6] - sorted[1] = 500, work = cumulative[6] - cumulative[1] = 50.
        assert_eq!(next_difficulty(timestamps, cumulative, 100, 1, &params), Ok(10));
    }

    #[test]
    fn full_window_cuts_outliers() {
        let params = DifficultyParams::mainnet();
        let len = params.classic_window(1).size;
        let timestamps: Vec<u64> = (0..len as u64).map(|i| i * 120).collect();
        let cumulative: Vec<u64> = (0..len as u64).map(|i| i * 1000).collect();
        assert_eq!(next_difficulty(timestamps, cumulative, 120, 1, &params), Ok(1000));
    }

    #[test]
    fn outliers_are_cut_from_both_ends() {
        let params = params_with(8, 1);
        // Wild first/last timestamps fall outside the kept range once sorted.
        let timestamps = vec![0, 1000, 1100, 1200, 1300, 1400, 1500, 99_999];
        let cumulative = vec![0, 10, 20, 30, 40, 50, 60, 70];
        // span = 1500 - 1000, work = 60 - 10
        assert_eq!(next_difficulty(timestamps, cumulative, 500, 1, &params), Ok(50));
    }

    #[test]
    fn trims_to_most_recent_window() {
        let params = params_with(4, 1);
        let timestamps = vec![0, 10, 1000, 1100, 1200, 1300];
        let cumulative = vec![0, 99_999, 100_000, 100_010, 100_020, 100_030];
        // Kept: last 4, with 2 kept after the cut: positions 1..3.
        // span = 1200 - 1100, work = 100_020 - 100_010
        assert_eq!(next_difficulty(timestamps, cumulative, 100, 1, &params), Ok(10));
    }

    #[test]
    fn cut_bounds_center_the_kept_range() {
        let classic = ClassicWindow { size: 720, cut: 60 };
        assert_eq!(cut_bounds(600, classic), (0, 600));
        assert_eq!(cut_bounds(601, classic), (1, 601));
        assert_eq!(cut_bounds(720, classic), (60, 660));
    }
}
