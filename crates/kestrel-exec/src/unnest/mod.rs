//! Unnest: expanding a repeated column into one output row per inner value.
//!
//! The [`Unnest`] kernel does the range transfers; [`UnnestExec`] wraps it
//! in the outcome protocol. Neither tracks which outer row is active: both
//! read it from a [`LateralContract`] owned by the lateral join.

mod config;
mod exec;
mod kernel;
mod lateral;

pub use config::UnnestConfig;
pub use exec::UnnestExec;
pub use kernel::Unnest;
pub use lateral::{LateralContract, LateralCursor};
