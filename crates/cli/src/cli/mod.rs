pub mod call;
pub mod catalog;
pub mod config;
pub mod ping;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use eb_domain::config::Config;

/// Drive a running editor host from the command line.
#[derive(Debug, Parser)]
#[command(name = "editor-bridge", version, about)]
pub struct Cli {
    /// Log at info level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Invoke one tool by name without activating its category.
    Call {
        /// Tool name, e.g. create_ui_button.
        tool: String,
        /// Parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the known tools by category.
    Catalog {
        /// Only this category.
        #[arg(long)]
        category: Option<String>,
        /// Print JSON including parameter schemas.
        #[arg(long)]
        json: bool,
    },
    /// Connect and handshake with the host, then disconnect.
    Ping,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `EB_CONFIG` (or `editor-bridge.toml`) with
/// environment overrides applied.
pub fn load_config() -> anyhow::Result<(Config, PathBuf)> {
    eb_domain::config::load_config().context("loading configuration")
}

/// [`load_config`], refusing configs with errors.  Used by commands that
/// talk to the host.
pub fn load_valid_config() -> anyhow::Result<(Config, PathBuf)> {
    let (config, path) = load_config()?;
    if !config.is_valid() {
        anyhow::bail!(
            "{} has errors, run `editor-bridge config validate`",
            path.display()
        );
    }
    Ok((config, path))
}
