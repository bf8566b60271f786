#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Strata proof-of-work consensus rules.
//!
//! This crate is responsible for:
//! - next-difficulty retargeting (classic average, LWMA1, LWMA2, LWMA3)
//! - selecting the retargeting generation by consensus version
//! - checking a block hash against a difficulty target
//!
//! Every function is pure and deterministic. It intentionally does **not**
//! fetch chain history, validate timestamps, or store anything.

pub mod classic;
pub mod error;
pub mod lwma;
pub mod pow;
pub mod retarget;
pub mod wide;
pub mod window;

pub use error::*;
pub use lwma::{next_difficulty_v2, next_difficulty_v3, next_difficulty_v9};
pub use pow::*;
pub use retarget::*;
pub use window::DifficultyWindow;
