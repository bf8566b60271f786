// Consensus-critical. Changes require a protocol upgrade + tests.
//! Trailing chain history consumed by the retargeting algorithms.

use strata_core::{CumulativeDifficulty, Difficulty, Timestamp};

/// Index-aligned timestamps and cumulative difficulties, oldest first.
///
/// Construction enforces the caller's side of the contract: both sequences
/// have the same length and cumulative difficulty never decreases. A
/// violation is a bug in window construction upstream, so it panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyWindow {
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
}

impl DifficultyWindow {
    /// Build a window from owned sequences.
    ///
    /// # Panics
    ///
    /// If the lengths differ or a cumulative difficulty is lower than its
    /// predecessor.
    pub fn new(
        timestamps: Vec<Timestamp>,
        cumulative_difficulties: Vec<CumulativeDifficulty>,
    ) -> Self {
        assert_eq!(
            timestamps.len(),
            cumulative_difficulties.len(),
            "difficulty window: timestamp and cumulative difficulty counts differ"
        );
        assert!(
            cumulative_difficulties.windows(2).all(|w| w[0] <= w[1]),
            "difficulty window: cumulative difficulty decreased"
        );
        Self {
            timestamps,
            cumulative_difficulties,
        }
    }

    /// Number of blocks in the window.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True if the window holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Drop everything but the most recent `n` blocks.
    pub fn keep_recent(&mut self, n: usize) {
        let excess = self.len().saturating_sub(n);
        if excess > 0 {
            self.timestamps.drain(..excess);
            self.cumulative_difficulties.drain(..excess);
        }
    }

    /// Timestamps, oldest first.
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Cumulative difficulties, oldest first.
    pub fn cumulative_difficulties(&self) -> &[CumulativeDifficulty] {
        &self.cumulative_difficulties
    }

    /// Signed solve time of block `i` (`timestamps[i] - timestamps[i - 1]`).
    pub fn solve_time(&self, i: usize) -> i128 {
        i128::from(self.timestamps[i]) - i128::from(self.timestamps[i - 1])
    }

    /// Own difficulty of block `i`.
    pub fn block_difficulty(&self, i: usize) -> Difficulty {
        self.cumulative_difficulties[i] - self.cumulative_difficulties[i - 1]
    }

    /// Work accumulated between blocks `from` and `to` (exclusive of `from`).
    pub fn work_between(&self, from: usize, to: usize) -> Difficulty {
        self.cumulative_difficulties[to] - self.cumulative_difficulties[from]
    }

    /// Split back into the owned sequences.
    pub fn into_parts(self) -> (Vec<Timestamp>, Vec<CumulativeDifficulty>) {
        (self.timestamps, self.cumulative_difficulties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_recent_trims_the_front() {
        let mut window = DifficultyWindow::new(vec![10, 20, 30, 40], vec![1, 3, 6, 10]);
        window.keep_recent(2);
        assert_eq!(window.timestamps(), &[30, 40]);
        assert_eq!(window.cumulative_difficulties(), &[6, 10]);

        window.keep_recent(5);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn accessors() {
        let window = DifficultyWindow::new(vec![100, 90, 250], vec![0, 7, 20]);
        assert_eq!(window.solve_time(1), -10);
        assert_eq!(window.solve_time(2), 160);
        assert_eq!(window.block_difficulty(2), 13);
        assert_eq!(window.work_between(0, 2), 20);
    }

    #[test]
    #[should_panic(expected = "counts differ")]
    fn mismatched_lengths_panic() {
        let _ = DifficultyWindow::new(vec![1, 2, 3], vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "decreased")]
    fn decreasing_cumulative_difficulty_panics() {
        let _ = DifficultyWindow::new(vec![1, 2, 3], vec![5, 4, 6]);
    }
}
