//! stmgr - Entity lifecycle queries
//!
//! One-shot commands answering state transition questions about the entities
//! of a catalog file.

mod commands;
mod config;
mod loader;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stmgr")]
#[command(about = "Query entity lifecycles: next states, allowed actions, required fields")]
#[command(version)]
struct Cli {
    /// Catalog file (YAML or JSON)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an entity's definition supports state management
    Supported {
        /// Entity ID
        entity: String,
    },

    /// Compute the state an operation leads to
    NextState {
        /// Entity ID
        entity: String,

        /// Current state (defaults to the entity's stored state)
        #[arg(short, long)]
        state: Option<String>,

        /// Operation to perform
        #[arg(short, long)]
        operation: Option<String>,
    },

    /// List the fields required before an operation may be performed
    RequiredFields {
        /// Entity ID
        entity: String,

        /// Current state (defaults to the entity's stored state)
        #[arg(short, long)]
        state: Option<String>,

        /// Operation to perform
        #[arg(short, long)]
        operation: String,
    },

    /// Show the save-disabling expression of a transition
    RequiredFieldsExpression {
        /// Entity ID
        entity: String,

        /// Current state (defaults to the entity's stored state)
        #[arg(short, long)]
        state: Option<String>,

        /// Operation to perform
        #[arg(short, long)]
        operation: String,
    },

    /// List the operations allowed from a state
    AllowedOperations {
        /// Entity ID
        entity: String,

        /// Current state (defaults to the entity's stored state)
        #[arg(short, long)]
        state: Option<String>,
    },

    /// List the actions an entity may invoke
    AllowedActions {
        /// Entity ID
        entity: String,

        /// Current state (defaults to the entity's stored state)
        #[arg(short, long)]
        state: Option<String>,

        /// Only consider these action IDs
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,
    },

    /// List every state reachable through the entity's model
    AllowedStates {
        /// Entity ID
        entity: String,
    },

    /// List the action groups of an entity's model
    ActionGroups {
        /// Entity ID
        entity: String,
    },

    /// List the actions declared for an entity
    Actions {
        /// Entity ID
        entity: String,

        /// Only these action IDs
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Validate the catalog
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return Err(e.into());
        }
    };

    // Command-line flags override file and environment
    if let Some(path) = cli.catalog {
        config.catalog.path = Some(path);
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if cli.no_color {
        config.output.color = false;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if !config.output.color {
        colored::control::set_override(false);
    }

    let Some(path) = config.catalog.path.clone() else {
        eprintln!(
            "{}: no catalog given (use --catalog or STMGR_CATALOG)",
            "Error".red()
        );
        std::process::exit(2);
    };

    let catalog = match loader::load_catalog(&path) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    let ctx = commands::Context::new(catalog, &config);
    match commands::execute(&ctx, cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
