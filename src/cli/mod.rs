//! CLI layer for ragline.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the knowledge store, managing knowledge bases, serving the
//! chat API and sending one-off chat requests.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, KbCommands, ProviderCommands};
