//! Ownership engine command line interface
//!
//! Loads a JSON array of ownership records and prints graphs, portfolios,
//! metrics and anomaly findings as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Parse a single ownership path
//! ownership_cli path "Group [100%] -> Holdco [60%] -> Plant"
//!
//! # Upward graph and ultimate owners of an asset
//! ownership_cli --records records.json graph G100000000001
//!
//! # Portfolio and metrics of an entity
//! ownership_cli --records records.json portfolio E100000000001
//! ownership_cli --records records.json metrics E100000000001
//!
//! # Anomaly findings for an asset
//! ownership_cli --records records.json anomalies G100000000001
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use ownership_engine::{
    parse_path, EngineConfig, IdentityResolver, InMemoryRelation, OwnershipEngine,
};

#[derive(Parser)]
#[command(name = "ownership_cli")]
#[command(version)]
#[command(about = "Inspect ownership graphs, portfolios and concentration metrics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON array of ownership records
    #[arg(long, short, global = true, env = "OWNERSHIP_RECORDS")]
    records: Option<PathBuf>,

    /// YAML engine configuration
    #[arg(long, short, global = true, env = "OWNERSHIP_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the traversal depth cap
    #[arg(long, global = true)]
    max_depth: Option<u32>,

    /// Compact JSON instead of pretty-printed
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an ownership path string into segments
    Path {
        /// e.g. "Parent [50%] -> Child [unknown %] -> Plant"
        path: String,
    },

    /// Classify an identifier string
    Classify { id: String },

    /// Upward ownership graph and ultimate owners of an asset
    Graph {
        asset_id: String,

        /// Build from ownership path strings instead of walking the relation
        #[arg(long)]
        from_paths: bool,
    },

    /// Portfolio of an entity
    Portfolio { entity_id: String },

    /// Anomaly findings for an asset
    Anomalies { asset_id: String },

    /// Concentration metrics for an entity portfolio, or an asset with --asset
    Metrics {
        id: String,

        /// Treat the id as an asset and report ownership metrics
        #[arg(long)]
        asset: bool,
    },

    /// Most frequent co-investing owner pairs across assets
    CoInvestment {
        asset_ids: Vec<String>,

        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref()).context("Failed to load engine config")?;
    if let Some(max_depth) = cli.max_depth {
        config.traversal.max_depth = max_depth;
    }

    match &cli.command {
        Commands::Path { path } => print(&parse_path(path), cli.compact),
        Commands::Classify { id } => {
            let resolver = IdentityResolver::new(config.identity.clone());
            print(&resolver.classify(id), cli.compact)
        }
        command => {
            let records = cli
                .records
                .as_deref()
                .context("--records (or OWNERSHIP_RECORDS) is required for this command")?;
            let engine = load_engine(records, config)?;
            run_query(&engine, command, cli.compact).await
        }
    }
}

fn load_engine(records: &Path, config: EngineConfig) -> Result<OwnershipEngine<InMemoryRelation>> {
    let resolver = IdentityResolver::new(config.identity.clone());
    let relation = InMemoryRelation::from_json_file(records, &resolver)
        .with_context(|| format!("Failed to load records from {}", records.display()))?;
    tracing::info!(records = relation.len(), "Loaded ownership records");
    OwnershipEngine::new(Arc::new(relation), config).context("Invalid engine config")
}

async fn run_query(
    engine: &OwnershipEngine<InMemoryRelation>,
    command: &Commands,
    compact: bool,
) -> Result<()> {
    match command {
        Commands::Graph {
            asset_id,
            from_paths: true,
        } => {
            let graph = engine.asset_graph_from_paths(asset_id).await?;
            print(&graph, compact)
        }
        Commands::Graph { asset_id, .. } => {
            let result = engine.asset_graph(asset_id).await;
            let owners = ownership_engine::ultimate_owners(&result);
            print(
                &json!({ "traversal": result, "ultimate_owners": owners }),
                compact,
            )
        }
        Commands::Portfolio { entity_id } => print(&engine.entity_portfolio(entity_id).await, compact),
        Commands::Anomalies { asset_id } => print(&engine.asset_anomalies(asset_id).await?, compact),
        Commands::Metrics { id, asset: true } => {
            print(&engine.asset_ownership_metrics(id).await?, compact)
        }
        Commands::Metrics { id, .. } => print(&engine.portfolio_metrics(id).await, compact),
        Commands::CoInvestment { asset_ids, top } => {
            print(&engine.co_investment(asset_ids, *top).await?, compact)
        }
        Commands::Path { .. } | Commands::Classify { .. } => Ok(()),
    }
}

fn print<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}
