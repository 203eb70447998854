//! CLI subcommand implementations.

pub mod calculate;
pub mod daily;
pub mod sufficiency;
pub mod util;
