//! CLI command definitions

use clap::Subcommand;
use std::path::PathBuf;

/// Top-level CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a collection and report test results
    Run {
        /// Path to the collection file (YAML or JSON)
        collection: PathBuf,

        /// Global variables as NAME=VALUE (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict the number of test assertions without running anything
    Count {
        /// Path to the collection file (YAML or JSON)
        collection: PathBuf,
    },

    /// Plugin discovery, resolution and installation
    #[command(subcommand)]
    Plugins(PluginCommands),
}

/// Plugin management subcommands
#[derive(Debug, Subcommand)]
pub enum PluginCommands {
    /// List plugins discovered across all sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which plugin wins each capability a collection needs
    Resolve {
        /// Path to the collection file (YAML or JSON)
        collection: PathBuf,
    },

    /// Install packages for capabilities no discovered plugin satisfies
    Install {
        /// Path to the collection file (YAML or JSON)
        collection: PathBuf,
    },
}
