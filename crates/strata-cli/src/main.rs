#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use strata_consensus::{validate_pow, RetargetAlgorithm};
use strata_core::{DifficultyParams, Hash32, ParamsConfig, LWMA3_FROM_VERSION};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata difficulty tooling")]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the next difficulty from a JSON window file.
    Next {
        /// File with `timestamps` and `cumulative_difficulties` arrays, oldest first.
        #[arg(long)]
        window: PathBuf,
        /// Consensus version selecting the algorithm through the fork schedule.
        #[arg(long = "version", conflicts_with = "algorithm")]
        consensus_version: Option<u8>,
        /// Run this algorithm directly (classic, lwma1, lwma2, lwma3).
        #[arg(long)]
        algorithm: Option<RetargetAlgorithm>,
        #[command(flatten)]
        params: ParamsArgs,
    },
    /// Check a little-endian hex hash against a difficulty.
    CheckHash {
        #[arg(long)]
        hash: Hash32,
        #[arg(long)]
        difficulty: u64,
    },
    /// Print network parameters as TOML.
    Params {
        #[command(flatten)]
        params: ParamsArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ParamsArgs {
    /// TOML parameter file; unset keys fall back to mainnet.
    #[arg(long = "params", conflicts_with = "network")]
    params_file: Option<PathBuf>,
    /// Built-in preset.
    #[arg(long, default_value = "mainnet")]
    network: String,
}

impl ParamsArgs {
    fn load(&self) -> Result<DifficultyParams> {
        match &self.params_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                DifficultyParams::from_toml_str(&text)
                    .with_context(|| format!("loading params from {}", path.display()))
            }
            None => Ok(DifficultyParams::for_network(&self.network)?),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowFile {
    timestamps: Vec<u64>,
    cumulative_difficulties: Vec<u64>,
}

fn read_window(path: &Path) -> Result<WindowFile> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let window: WindowFile =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    // The library treats these as caller bugs and panics; reject them here.
    if window.timestamps.len() != window.cumulative_difficulties.len() {
        bail!(
            "window has {} timestamps but {} cumulative difficulties",
            window.timestamps.len(),
            window.cumulative_difficulties.len()
        );
    }
    if let Some(i) = window
        .cumulative_difficulties
        .windows(2)
        .position(|w| w[1] < w[0])
    {
        bail!("cumulative difficulty decreases at index {}", i + 1);
    }
    Ok(window)
}

fn next(
    window: &Path,
    consensus_version: Option<u8>,
    algorithm: Option<RetargetAlgorithm>,
    params: &DifficultyParams,
) -> Result<()> {
    let WindowFile {
        timestamps,
        cumulative_difficulties,
    } = read_window(window)?;

    let (algorithm, version) = match (algorithm, consensus_version) {
        (Some(algorithm), _) => (algorithm, 1),
        (None, Some(version)) => (
            RetargetAlgorithm::for_version(version, &params.schedule()),
            version,
        ),
        (None, None) => (RetargetAlgorithm::Lwma3, LWMA3_FROM_VERSION),
    };

    let needed = algorithm.required_history(version, params);
    if timestamps.len() < needed {
        warn!(have = timestamps.len(), needed, "window shorter than the algorithm's history");
    }
    info!(%algorithm, version, network = params.network(), samples = timestamps.len(), "computing next difficulty");

    let difficulty = algorithm.next_difficulty(timestamps, cumulative_difficulties, version, params)?;
    println!("{difficulty}");
    Ok(())
}

fn check_hash(hash: &Hash32, difficulty: u64) -> Result<()> {
    debug!(%hash, difficulty, "checking hash");
    validate_pow(hash, difficulty)?;
    println!("ok: {hash} meets difficulty {difficulty}");
    Ok(())
}

fn print_params(params: &DifficultyParams) -> Result<()> {
    let text = toml::to_string(&ParamsConfig::from(params)).context("encoding params")?;
    print!("{text}");
    Ok(())
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Next {
            window,
            consensus_version,
            algorithm,
            params,
        } => next(&window, consensus_version, algorithm, &params.load()?),
        Commands::CheckHash { hash, difficulty } => check_hash(&hash, difficulty),
        Commands::Params { params } => print_params(&params.load()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_next_with_version() {
        let cli = Cli::try_parse_from(["strata", "next", "--window", "w.json", "--version", "8"])
            .expect("parse");
        match cli.command {
            Commands::Next {
                consensus_version,
                algorithm,
                params,
                ..
            } => {
                assert_eq!(consensus_version, Some(8));
                assert_eq!(algorithm, None);
                assert_eq!(params.network, "mainnet");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn version_and_algorithm_conflict() {
        let result = Cli::try_parse_from([
            "strata", "next", "--window", "w.json", "--version", "8", "--algorithm", "lwma1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let result =
            Cli::try_parse_from(["strata", "next", "--window", "w.json", "--algorithm", "lwma7"]);
        assert!(result.is_err());
    }

    #[test]
    fn check_hash_parses_hex() {
        let hex = format!("0x{}", "00".repeat(32));
        let cli = Cli::try_parse_from(["strata", "check-hash", "--hash", &hex, "--difficulty", "5"])
            .expect("parse");
        match cli.command {
            Commands::CheckHash { hash, difficulty } => {
                assert_eq!(hash, Hash32::zero());
                assert_eq!(difficulty, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn params_preset_round_trips_through_toml() {
        let params = DifficultyParams::testnet();
        let text = toml::to_string(&ParamsConfig::from(&params)).expect("encode");
        assert_eq!(DifficultyParams::from_toml_str(&text).expect("decode"), params);
    }

    #[test]
    fn window_file_validation() {
        let dir = std::env::temp_dir().join(format!("strata-cli-test-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");

        let good = dir.join("good.json");
        fs::write(&good, r#"{"timestamps":[1,2,3],"cumulative_difficulties":[0,5,9]}"#)
            .expect("write");
        let window = read_window(&good).expect("valid window");
        assert_eq!(window.timestamps, vec![1, 2, 3]);

        let uneven = dir.join("uneven.json");
        fs::write(&uneven, r#"{"timestamps":[1,2],"cumulative_difficulties":[0]}"#).expect("write");
        assert!(read_window(&uneven).is_err());

        let decreasing = dir.join("decreasing.json");
        fs::write(&decreasing, r#"{"timestamps":[1,2],"cumulative_difficulties":[5,4]}"#)
            .expect("write");
        let err = read_window(&decreasing).expect_err("decreasing rejected");
        assert!(err.to_string().contains("index 1"));

        let _ = fs::remove_dir_all(&dir);
    }
}
