//! Loadstone CLI
//!
//! Unified command-line interface for:
//! - Replaying a downloaded JSON API archive into a graph store (`load`)
//! - Seeding stub nodes from a live API's listings (`seed`)
//! - Printing type definitions inferred from loaded data (`typedef`)

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod load;
mod seed;
mod typedef;

#[derive(Parser)]
#[command(name = "loadstone")]
#[command(
    author,
    version,
    about = "Bulk-load JSON API archives into a graph store"
)]
struct Cli {
    /// Graph store HTTP endpoint.
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    store: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a downloaded API archive into the store.
    ///
    /// Expects the layout `<data>/<prefix>/<type>/<name>/index.json`. Every
    /// document becomes one commit-now mutation; URL cross-references
    /// converge on a single node per URL, even across forward references.
    Load(load::LoadArgs),

    /// Seed `{url, name, type}` stub nodes from a live API's listings.
    ///
    /// Upserts are conditional on the URL not existing yet, so re-running
    /// is harmless.
    Seed(seed::SeedArgs),

    /// Print `type { field: type }` definitions for the loaded data.
    ///
    /// Combines the store's schema predicates with a per-type probe of
    /// which predicates actually occur.
    Typedef,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Load(args) => load::run(&cli.store, args),
        Commands::Seed(args) => seed::run(&cli.store, args),
        Commands::Typedef => typedef::run(&cli.store),
    }
}
