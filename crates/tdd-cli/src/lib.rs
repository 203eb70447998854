//! Total daily dose CLI library.
//!
//! This crate provides the CLI interface for the TDD calculator.

mod cli;
pub mod commands;
mod config;
pub mod rounding;

pub use cli::{Cli, Commands};
pub use config::Config;
