//! CLI module for Scout
//!
//! Provides command-line interface parsing for the scout-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scout - Research Pipeline Server
///
/// Answers questions by searching the web, reading the best pages and
/// streaming an LLM-written report, or generates small web projects.
#[derive(Parser, Debug)]
#[command(
    name = "scout-server",
    version,
    about = "Scout - Research Pipeline Server",
    long_about = "Answers questions by searching the web, reading the best pages and streaming\n\
                  an LLM-written report, or generates small static web projects.\n\n\
                  Run without arguments to start the server, or use 'ask' to run one query.",
    after_help = "EXAMPLES:\n    \
                  scout-server                               # Start the server (reads scout.toml)\n    \
                  scout-server ask \"what is tokio?\"          # Stream one research run\n    \
                  scout-server ask --pipeline generation \"a todo app\"\n    \
                  scout-server ask --json \"rust 2024\"        # Raw JSON events, one per line\n    \
                  scout-server config --validate             # Check the configuration file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "scout.toml", global = true, env = "SCOUT_CONFIG")]
    pub config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (the default)
    Serve,

    /// Run one query and stream its events to the terminal
    Ask {
        /// The question or project description
        query: String,

        /// Session identifier reported in the events
        #[arg(short, long)]
        session: Option<String>,

        /// Force a pipeline (research or generation)
        #[arg(short, long)]
        pipeline: Option<String>,

        /// Print raw JSON events, one per line
        #[arg(long)]
        json: bool,
    },

    /// Show configuration information
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["scout-server"]).unwrap();
        assert_eq!(cli.command(), Commands::Serve);
        assert_eq!(cli.config, PathBuf::from("scout.toml"));
    }

    #[test]
    fn test_ask_flags() {
        let cli = Cli::try_parse_from([
            "scout-server",
            "--no-color",
            "ask",
            "--pipeline",
            "generation",
            "--json",
            "a landing page",
        ])
        .unwrap();

        assert!(cli.no_color);
        assert_eq!(
            cli.command(),
            Commands::Ask {
                query: "a landing page".to_string(),
                session: None,
                pipeline: Some("generation".to_string()),
                json: true,
            }
        );
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["scout-server", "config", "--validate", "-c", "other.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.command(), Commands::Config { validate: true });
    }
}
