#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Strata core: primitive types, consensus constants and network difficulty
//! parameters shared by the consensus crate and tooling.

pub mod constants;
pub mod params;
pub mod types;

pub use constants::*;
pub use params::*;
pub use types::*;
