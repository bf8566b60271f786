// Consensus-critical. Changes require a protocol upgrade + tests.
//! Consensus-version dispatch over the retargeting generations.

use crate::error::ConsensusError;
use crate::{classic, lwma};
use std::fmt;
use std::str::FromStr;
use strata_core::{CumulativeDifficulty, Difficulty, DifficultyParams, ForkSchedule, Timestamp};
use thiserror::Error;
use tracing::debug;

/// A retargeting generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetargetAlgorithm {
    /// Sorted, outlier-cut windowed average.
    Classic,
    /// Floating-point LWMA.
    Lwma1,
    /// Integer LWMA with per-block clamps.
    Lwma2,
    /// LWMA2 over forced-monotonic timestamps.
    Lwma3,
}

/// Name passed to [`RetargetAlgorithm::from_str`] matched no algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown retarget algorithm `{0}` (expected classic, lwma1, lwma2 or lwma3)")]
pub struct UnknownAlgorithm(pub String);

impl RetargetAlgorithm {
    /// Algorithm active at consensus `version` under `schedule`.
    pub fn for_version(version: u8, schedule: &ForkSchedule) -> Self {
        if version >= schedule.lwma3_from {
            Self::Lwma3
        } else if version >= schedule.lwma2_from {
            Self::Lwma2
        } else if version >= schedule.lwma1_from {
            Self::Lwma1
        } else {
            Self::Classic
        }
    }

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Lwma1 => "lwma1",
            Self::Lwma2 => "lwma2",
            Self::Lwma3 => "lwma3",
        }
    }

    /// Trailing blocks this algorithm reads; older entries are ignored.
    ///
    /// `version` only matters for [`RetargetAlgorithm::Classic`], whose window
    /// grows at `schedule.classic_v6_from`.
    pub fn required_history(self, version: u8, params: &DifficultyParams) -> usize {
        match self {
            Self::Classic => params.classic_window(version).size,
            Self::Lwma1 => params.lwma1_window() + 1,
            Self::Lwma2 => params.lwma2_window(),
            Self::Lwma3 => params.lwma3_window() + 1,
        }
    }

    /// Run this algorithm with the network's target interval.
    pub fn next_difficulty(
        self,
        timestamps: Vec<Timestamp>,
        cumulative_difficulties: Vec<CumulativeDifficulty>,
        version: u8,
        params: &DifficultyParams,
    ) -> Result<Difficulty, ConsensusError> {
        let target = params.target_secs();
        match self {
            Self::Classic => {
                classic::next_difficulty(timestamps, cumulative_difficulties, target, version, params)
            }
            Self::Lwma1 => lwma::next_difficulty_v2(timestamps, cumulative_difficulties, target, params),
            Self::Lwma2 => lwma::next_difficulty_v3(timestamps, cumulative_difficulties, target, params),
            Self::Lwma3 => lwma::next_difficulty_v9(timestamps, cumulative_difficulties, params),
        }
    }
}

impl fmt::Display for RetargetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetargetAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "lwma1" => Ok(Self::Lwma1),
            "lwma2" => Ok(Self::Lwma2),
            "lwma3" => Ok(Self::Lwma3),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Blocks of history the caller must supply for a block at `version`.
pub fn required_history(version: u8, params: &DifficultyParams) -> usize {
    RetargetAlgorithm::for_version(version, &params.schedule()).required_history(version, params)
}

/// Next difficulty for a block built under consensus `version`.
///
/// # Panics
///
/// If the two sequences differ in length or cumulative difficulty decreases.
pub fn next_difficulty_for_version(
    version: u8,
    timestamps: Vec<Timestamp>,
    cumulative_difficulties: Vec<CumulativeDifficulty>,
    params: &DifficultyParams,
) -> Result<Difficulty, ConsensusError> {
    let algorithm = RetargetAlgorithm::for_version(version, &params.schedule());
    debug!(version, %algorithm, samples = timestamps.len(), "retarget");
    algorithm.next_difficulty(timestamps, cumulative_difficulties, version, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(len: usize, solve_time: u64, d: u64) -> (Vec<u64>, Vec<u64>) {
        let ts = (0..len as u64).map(|i| 1_000 + i * solve_time).collect();
        let cd = (0..len as u64).map(|i| i * d).collect();
        (ts, cd)
    }

    #[test]
    fn default_schedule_selects_by_version() {
        let schedule = ForkSchedule::default();
        assert_eq!(RetargetAlgorithm::for_version(0, &schedule), RetargetAlgorithm::Classic);
        assert_eq!(RetargetAlgorithm::for_version(6, &schedule), RetargetAlgorithm::Classic);
        assert_eq!(RetargetAlgorithm::for_version(7, &schedule), RetargetAlgorithm::Lwma1);
        assert_eq!(RetargetAlgorithm::for_version(8, &schedule), RetargetAlgorithm::Lwma2);
        assert_eq!(RetargetAlgorithm::for_version(9, &schedule), RetargetAlgorithm::Lwma3);
        assert_eq!(RetargetAlgorithm::for_version(u8::MAX, &schedule), RetargetAlgorithm::Lwma3);
    }

    #[test]
    fn collapsed_schedule_skips_generations() {
        let schedule = ForkSchedule {
            classic_v6_from: 2,
            lwma1_from: 2,
            lwma2_from: 2,
            lwma3_from: 4,
        };
        assert_eq!(RetargetAlgorithm::for_version(1, &schedule), RetargetAlgorithm::Classic);
        assert_eq!(RetargetAlgorithm::for_version(3, &schedule), RetargetAlgorithm::Lwma2);
        assert_eq!(RetargetAlgorithm::for_version(4, &schedule), RetargetAlgorithm::Lwma3);
    }

    #[test]
    fn history_requirements() {
        let params = DifficultyParams::mainnet();
        assert_eq!(required_history(1, &params), 720);
        assert_eq!(required_history(6, &params), 735);
        assert_eq!(required_history(7, &params), 61);
        assert_eq!(required_history(8, &params), 60);
        assert_eq!(required_history(9, &params), 61);
    }

    #[test]
    fn names_round_trip() {
        for algorithm in [
            RetargetAlgorithm::Classic,
            RetargetAlgorithm::Lwma1,
            RetargetAlgorithm::Lwma2,
            RetargetAlgorithm::Lwma3,
        ] {
            assert_eq!(algorithm.as_str().parse(), Ok(algorithm));
        }
        assert_eq!("LWMA2".parse(), Ok(RetargetAlgorithm::Lwma2));
        assert_eq!(
            "lwma4".parse::<RetargetAlgorithm>(),
            Err(UnknownAlgorithm("lwma4".to_string()))
        );
    }

    #[test]
    fn dispatch_matches_direct_calls() {
        let params = DifficultyParams::mainnet();
        let (ts, cd) = steady(80, 120, 10_000);

        assert_eq!(
            next_difficulty_for_version(1, ts.clone(), cd.clone(), &params),
            classic::next_difficulty(ts.clone(), cd.clone(), 120, 1, &params)
        );
        assert_eq!(
            next_difficulty_for_version(7, ts.clone(), cd.clone(), &params),
            lwma::next_difficulty_v2(ts.clone(), cd.clone(), 120, &params)
        );
        assert_eq!(
            next_difficulty_for_version(8, ts.clone(), cd.clone(), &params),
            lwma::next_difficulty_v3(ts.clone(), cd.clone(), 120, &params)
        );
        assert_eq!(
            next_difficulty_for_version(9, ts.clone(), cd.clone(), &params),
            lwma::next_difficulty_v9(ts, cd, &params)
        );
    }

    #[test]
    fn dispatch_uses_network_target() {
        let testnet = DifficultyParams::testnet();
        let (ts, cd) = steady(61, 60, 10_000);
        // On target for a 60 s network.
        assert_eq!(next_difficulty_for_version(9, ts, cd, &testnet), Ok(9900));
    }
}
