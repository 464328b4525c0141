//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Database location used when `--db-path` is not given.
pub const DEFAULT_DB_PATH: &str = ".ragline/ragline.db";

/// ragline: retrieval-augmented chat and tool-calling over NDJSON.
///
/// Serves a chat endpoint that answers from a knowledge base or lets the
/// model call tools, streaming results as newline-delimited JSON.
#[derive(Parser, Debug)]
#[command(name = "ragline")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the knowledge-store database file.
    ///
    /// Defaults to `.ragline/ragline.db` in the current directory.
    #[arg(short, long, env = "RAGLINE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the knowledge-store database.
    ///
    /// Creates the database file and schema if they don't exist.
    #[command(after_help = r#"Examples:
  ragline init                    # Initialize in current directory
  ragline init --force            # Re-initialize (destroys existing data)
  ragline --db-path ./kb.db init  # Initialize with custom path
"#)]
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Run the HTTP chat server.
    #[command(after_help = r#"Examples:
  ragline serve                          # 127.0.0.1:8080
  ragline serve --host 0.0.0.0 -p 3000   # Listen on all interfaces

Endpoints:
  POST /api/chat   JSON body, or NDJSON stream when "stream": true
  GET  /health     Liveness probe
"#)]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1", env = "RAGLINE_HOST")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, default_value_t = 8080, env = "RAGLINE_PORT")]
        port: u16,
    },

    /// Knowledge-base management.
    #[command(subcommand)]
    Kb(KbCommands),

    /// Embedding-provider management.
    #[command(subcommand)]
    Provider(ProviderCommands),

    /// Write the default prompt templates for editing.
    ///
    /// Existing files are left untouched.
    InitPrompts {
        /// Target directory (defaults to `~/.config/ragline/prompts`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Send one message and print the reply.
    ///
    /// Prints a JSON body, or NDJSON events with `--stream`.
    #[command(after_help = r#"Examples:
  ragline chat "What is 6 / 3?" --stream          # Tool-calling branch
  ragline chat "How do I file expenses?" --kb 1   # Grounded in knowledge base 1
  ragline chat "hi" --family ollama -m llama3.1   # Local model
"#)]
    Chat {
        /// The user message.
        message: String,

        /// Knowledge base to ground the answer in.
        #[arg(short, long)]
        kb: Option<i64>,

        /// Chat model identifier.
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: String,

        /// Model family (openai, ollama).
        #[arg(long, default_value = "openai")]
        family: String,

        /// Stream NDJSON events instead of one JSON body.
        #[arg(long)]
        stream: bool,
    },
}

/// Knowledge-base subcommands.
#[derive(Subcommand, Debug)]
pub enum KbCommands {
    /// Create a knowledge base bound to an embedding provider.
    Create {
        /// Unique knowledge-base name.
        name: String,

        /// Embedding provider id (see `provider list`).
        #[arg(long)]
        provider: i64,
    },

    /// List knowledge bases.
    List,
}

/// Embedding-provider subcommands.
#[derive(Subcommand, Debug)]
pub enum ProviderCommands {
    /// Register an embedding provider.
    Add {
        /// Display name.
        name: String,

        /// Embedding model identifier.
        #[arg(long)]
        model: String,

        /// OpenAI-compatible endpoint (defaults to the OpenAI API).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// List embedding providers.
    List,
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}
