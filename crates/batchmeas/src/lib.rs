//! Command-line front end for `batchmeas_core`.

pub mod cli;
pub mod commands;
pub mod config;
mod logging;

pub use logging::{LogTarget, init_logging};
