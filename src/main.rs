//! # Pantry Match CLI (`pantry`)
//!
//! Finds meals for the ingredients on hand, caching every answer locally.
//!
//! ## Usage
//!
//! ```bash
//! pantry --config ./config/pantry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pantry init` | Create the SQLite database and run schema migrations |
//! | `pantry find <ING>...` | Rank meals for the ingredients and write an HTML page |
//! | `pantry cached list` | List cached queries |
//! | `pantry cached show <ING>...` | Print a cached result |
//! | `pantry cached forget <ING>...` | Delete a cached result |
//!
//! ## Examples
//!
//! ```bash
//! # Writes output/eggs_pasta_tomatoes.html
//! pantry find eggs pasta tomatoes
//!
//! # Excludes potatoes in addition to the configured defaults
//! pantry find carrot chicken onion --exclude potatoes
//!
//! # Recompute a cached query
//! pantry find carrot chicken onion --exclude potatoes --refresh
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use pantry_match::find::FindOptions;
use pantry_match::{cached, config, find, migrate};

/// Pantry Match CLI: meals from the ingredients you already have.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pantry.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pantry",
    about = "Pantry Match — find meals you can cook with what you have",
    version,
    long_about = "Pantry Match ranks recipes by how few ingredients you are missing, \
    highlights the lowest-carbohydrate and highest-protein options, and caches every \
    answer locally so repeat queries never touch the network."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pantry.toml")]
    config: PathBuf,

    /// Log debug details to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// Running it multiple times is safe.
    Init,

    /// Find meals for a set of ingredients.
    ///
    /// Serves the answer from the local cache when the same query was seen
    /// before; otherwise asks the recipe provider and caches the result.
    /// Writes `{output.dir}/{ingredients}.html`.
    Find {
        /// Ingredients you have (e.g. `eggs pasta "sour cream"`).
        #[arg(required = true)]
        ingredients: Vec<String>,

        /// Ingredient to avoid. May be repeated.
        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        /// Do not add the configured default exclusions.
        #[arg(long)]
        no_default_exclusions: bool,

        /// Ignore any cached result and ask the provider again.
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or prune the local cache.
    Cached {
        #[command(subcommand)]
        action: CachedAction,
    },
}

#[derive(Subcommand)]
enum CachedAction {
    /// List cached queries, newest first.
    List,

    /// Print the cached result for a query.
    Show {
        #[arg(required = true)]
        ingredients: Vec<String>,

        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        #[arg(long)]
        no_default_exclusions: bool,

        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete the cached result for a query.
    Forget {
        #[arg(required = true)]
        ingredients: Vec<String>,

        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        #[arg(long)]
        no_default_exclusions: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pantry_match=debug,warn")
        } else {
            EnvFilter::new("pantry_match=warn,warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Find {
            ingredients,
            exclude,
            no_default_exclusions,
            refresh,
        } => {
            let options = FindOptions {
                override_exclusions: no_default_exclusions,
                refresh,
            };
            find::run_find(&cfg, &ingredients, &exclude, options).await?;
        }
        Commands::Cached { action } => match action {
            CachedAction::List => {
                cached::run_list(&cfg).await?;
            }
            CachedAction::Show {
                ingredients,
                exclude,
                no_default_exclusions,
                json,
            } => {
                cached::run_show(&cfg, &ingredients, &exclude, no_default_exclusions, json).await?;
            }
            CachedAction::Forget {
                ingredients,
                exclude,
                no_default_exclusions,
            } => {
                cached::run_forget(&cfg, &ingredients, &exclude, no_default_exclusions).await?;
            }
        },
    }

    Ok(())
}
