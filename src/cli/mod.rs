//! CLI command implementations

pub mod capture;
pub mod error;

pub use capture::{CaptureSummary, Cli, Commands};
pub use error::CliError;
