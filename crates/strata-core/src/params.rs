// Consensus-critical. Changes require a protocol upgrade + tests.
//! Network difficulty parameters.
//!
//! [`ParamsConfig`] is the loose, serde-facing shape (every field defaulted,
//! loadable from TOML). [`DifficultyParams`] is the validated, immutable value
//! handed to every retargeting call; it can only be built through
//! [`TryFrom<ParamsConfig>`], so holding one proves the window/cut bounds hold.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or loading [`DifficultyParams`].
#[derive(Debug, Error)]
pub enum ParamsError {
    /// The target block interval was zero.
    #[error("target block interval must be non-zero")]
    ZeroTargetInterval,

    /// The target block interval exceeds [`MAX_TARGET_SECS`].
    #[error("target block interval of {secs}s exceeds {max}s")]
    TargetIntervalTooLarge {
        /// Configured interval.
        secs: u64,
        /// Largest accepted interval.
        max: u64,
    },

    /// The future-time-limit was zero.
    #[error("future time limit must be non-zero")]
    ZeroFutureTimeLimit,

    /// A window size fell outside what its algorithm supports.
    #[error("{name} window of {size} blocks is outside {min}..={max}")]
    WindowOutOfRange {
        /// Which window was rejected.
        name: &'static str,
        /// Configured size.
        size: usize,
        /// Smallest accepted size.
        min: usize,
        /// Largest accepted size.
        max: usize,
    },

    /// Cutting `2 * cut` outliers would leave fewer than two timestamps.
    #[error("classic cut of {cut} leaves fewer than 2 of {window} timestamps")]
    CutTooLarge {
        /// Configured cut per side.
        cut: usize,
        /// Window the cut applies to.
        window: usize,
    },

    /// Fork versions were not non-decreasing.
    #[error("fork schedule must be non-decreasing: {0:?}")]
    UnorderedSchedule(ForkSchedule),

    /// Unknown network preset name.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// TOML could not be parsed into a [`ParamsConfig`].
    #[error("invalid params toml: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Upper bound on a configured target block interval (one day).
pub const MAX_TARGET_SECS: u64 = 86_400;

/// A classic averager window and the outliers cut from each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicWindow {
    /// Number of trailing blocks considered.
    pub size: usize,
    /// Timestamps dropped from each end after sorting.
    pub cut: usize,
}

impl ClassicWindow {
    /// Length of the window once both cuts are removed.
    pub const fn kept(&self) -> usize {
        self.size - 2 * self.cut
    }
}

/// Consensus versions at which each retargeting generation activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForkSchedule {
    /// First version using the larger classic window.
    pub classic_v6_from: u8,
    /// First version using LWMA1.
    pub lwma1_from: u8,
    /// First version using LWMA2.
    pub lwma2_from: u8,
    /// First version using LWMA3.
    pub lwma3_from: u8,
}

impl Default for ForkSchedule {
    fn default() -> Self {
        Self {
            classic_v6_from: CLASSIC_V6_WINDOW_FROM_VERSION,
            lwma1_from: LWMA1_FROM_VERSION,
            lwma2_from: LWMA2_FROM_VERSION,
            lwma3_from: LWMA3_FROM_VERSION,
        }
    }
}

impl ForkSchedule {
    fn is_ordered(&self) -> bool {
        self.classic_v6_from <= self.lwma1_from
            && self.lwma1_from <= self.lwma2_from
            && self.lwma2_from <= self.lwma3_from
    }
}

/// Raw difficulty parameters as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamsConfig {
    /// Network label, informational only.
    pub network: String,
    /// Target block interval in seconds (T).
    pub target_secs: u64,
    /// Classic window before `schedule.classic_v6_from`.
    pub classic_window: usize,
    /// Classic window from `schedule.classic_v6_from`.
    pub classic_window_v6: usize,
    /// Outliers cut from each end of the sorted classic window.
    pub classic_cut: usize,
    /// LWMA1 window (N).
    pub lwma1_window: usize,
    /// LWMA2 window (N + 1 samples).
    pub lwma2_window: usize,
    /// LWMA3 window (N).
    pub lwma3_window: usize,
    /// Future-time-limit in seconds, the LWMA2 negative solve-time clamp.
    pub future_time_limit_secs: u64,
    /// Fork versions.
    pub schedule: ForkSchedule,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            target_secs: DIFFICULTY_TARGET_SECS,
            classic_window: DIFFICULTY_WINDOW,
            classic_window_v6: DIFFICULTY_WINDOW_V6_OLD,
            classic_cut: DIFFICULTY_CUT,
            lwma1_window: DIFFICULTY_WINDOW_V6,
            lwma2_window: DIFFICULTY_WINDOW_V6,
            lwma3_window: DIFFICULTY_WINDOW_V9,
            future_time_limit_secs: BLOCK_FUTURE_TIME_LIMIT_V6,
            schedule: ForkSchedule::default(),
        }
    }
}

/// Validated, immutable difficulty parameters for one network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ParamsConfig")]
pub struct DifficultyParams {
    network: String,
    target_secs: u64,
    classic: ClassicWindow,
    classic_v6: ClassicWindow,
    lwma1_window: usize,
    lwma2_window: usize,
    lwma3_window: usize,
    future_time_limit_secs: u64,
    schedule: ForkSchedule,
}

impl DifficultyParams {
    /// Mainnet parameters (T = 120 s).
    pub fn mainnet() -> Self {
        Self::from_valid(ParamsConfig::default())
    }

    /// Testnet parameters (T = 60 s, FTL = 3 * T).
    pub fn testnet() -> Self {
        Self::from_valid(ParamsConfig {
            network: "testnet".to_string(),
            target_secs: TESTNET_DIFFICULTY_TARGET_SECS,
            future_time_limit_secs: 3 * TESTNET_DIFFICULTY_TARGET_SECS,
            ..ParamsConfig::default()
        })
    }

    /// Look up a preset by network name.
    pub fn for_network(network: &str) -> Result<Self, ParamsError> {
        match network {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" => Ok(Self::testnet()),
            other => Err(ParamsError::UnknownNetwork(other.to_string())),
        }
    }

    /// Parse and validate parameters from TOML. Missing keys take mainnet defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ParamsError> {
        let config: ParamsConfig = toml::from_str(s)?;
        Self::try_from(config)
    }

    // Presets are compile-time values checked by the tests below.
    fn from_valid(config: ParamsConfig) -> Self {
        let classic = ClassicWindow {
            size: config.classic_window,
            cut: config.classic_cut,
        };
        let classic_v6 = ClassicWindow {
            size: config.classic_window_v6,
            cut: config.classic_cut,
        };
        Self {
            network: config.network,
            target_secs: config.target_secs,
            classic,
            classic_v6,
            lwma1_window: config.lwma1_window,
            lwma2_window: config.lwma2_window,
            lwma3_window: config.lwma3_window,
            future_time_limit_secs: config.future_time_limit_secs,
            schedule: config.schedule,
        }
    }

    /// Network label.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Target block interval in seconds (T).
    pub fn target_secs(&self) -> u64 {
        self.target_secs
    }

    /// Classic window for a consensus version.
    pub fn classic_window(&self, version: u8) -> ClassicWindow {
        if version >= self.schedule.classic_v6_from {
            self.classic_v6
        } else {
            self.classic
        }
    }

    /// LWMA1 window (N).
    pub fn lwma1_window(&self) -> usize {
        self.lwma1_window
    }

    /// LWMA2 window (N + 1 samples).
    pub fn lwma2_window(&self) -> usize {
        self.lwma2_window
    }

    /// LWMA3 window (N).
    pub fn lwma3_window(&self) -> usize {
        self.lwma3_window
    }

    /// Future-time-limit in seconds.
    pub fn future_time_limit_secs(&self) -> u64 {
        self.future_time_limit_secs
    }

    /// Fork versions.
    pub fn schedule(&self) -> ForkSchedule {
        self.schedule
    }
}

fn check_window(name: &'static str, size: usize, min: usize) -> Result<(), ParamsError> {
    if size < min || size > MAX_DIFFICULTY_WINDOW {
        return Err(ParamsError::WindowOutOfRange {
            name,
            size,
            min,
            max: MAX_DIFFICULTY_WINDOW,
        });
    }
    Ok(())
}

fn check_cut(cut: usize, window: usize) -> Result<(), ParamsError> {
    let fits = cut.checked_mul(2).is_some_and(|both| both <= window - 2);
    if !fits {
        return Err(ParamsError::CutTooLarge { cut, window });
    }
    Ok(())
}

impl TryFrom<ParamsConfig> for DifficultyParams {
    type Error = ParamsError;

    fn try_from(config: ParamsConfig) -> Result<Self, Self::Error> {
        if config.target_secs == 0 {
            return Err(ParamsError::ZeroTargetInterval);
        }
        if config.target_secs > MAX_TARGET_SECS {
            return Err(ParamsError::TargetIntervalTooLarge {
                secs: config.target_secs,
                max: MAX_TARGET_SECS,
            });
        }
        if config.future_time_limit_secs == 0 {
            return Err(ParamsError::ZeroFutureTimeLimit);
        }

        check_window("classic", config.classic_window, 2)?;
        check_window("classic v6", config.classic_window_v6, 2)?;
        check_cut(config.classic_cut, config.classic_window)?;
        check_cut(config.classic_cut, config.classic_window_v6)?;

        // Each LWMA window must outlast its bootstrap rule.
        check_window("lwma1", config.lwma1_window, LWMA1_BOOTSTRAP_SAMPLES - 1)?;
        check_window("lwma2", config.lwma2_window, LWMA2_STARTUP_SAMPLES + 1)?;
        check_window("lwma3", config.lwma3_window, LWMA3_STARTUP_SAMPLES)?;

        if !config.schedule.is_ordered() {
            return Err(ParamsError::UnorderedSchedule(config.schedule));
        }

        Ok(Self::from_valid(config))
    }
}

impl From<&DifficultyParams> for ParamsConfig {
    fn from(params: &DifficultyParams) -> Self {
        Self {
            network: params.network.clone(),
            target_secs: params.target_secs,
            classic_window: params.classic.size,
            classic_window_v6: params.classic_v6.size,
            classic_cut: params.classic.cut,
            lwma1_window: params.lwma1_window,
            lwma2_window: params.lwma2_window,
            lwma3_window: params.lwma3_window,
            future_time_limit_secs: params.future_time_limit_secs,
            schedule: params.schedule,
        }
    }
}
