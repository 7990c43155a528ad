//! Ownership Engine - ownership graphs and concentration analytics
//!
//! Turns energy-infrastructure ownership records into graphs, portfolios and
//! concentration metrics for presentation layers.
//!
//! ## Pipeline
//! Records -> PathParser / RelationTraversal -> GraphBuilder / PortfolioAggregator
//! -> analytics -> plain data (`ownership-types`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ownership_engine::{EngineConfig, IdentityResolver, InMemoryRelation, OwnershipEngine};
//!
//! # async fn run() -> ownership_engine::error::Result<()> {
//! let config = EngineConfig::load(None)?;
//! let resolver = IdentityResolver::new(config.identity.clone());
//! let relation = InMemoryRelation::from_json_file("records.json", &resolver)?;
//! let engine = OwnershipEngine::new(Arc::new(relation), config)?;
//!
//! let portfolio = engine.entity_portfolio("E100000000001").await;
//! let findings = engine.asset_anomalies("G100000000001").await?;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration (YAML + defaults)
pub mod config;

// Ownership path strings
pub mod path;

// Stable identities for names without canonical keys
pub mod identity;

// Graph assembly from path strings
pub mod graph;

// Relation access and walks
pub mod relation;
pub mod traversal;

// Portfolio attribution and rollups
pub mod portfolio;

// Concentration metrics and anomaly rules
pub mod analytics;

// Query facade
pub mod engine;

pub use config::{AnalyticsConfig, EngineConfig, IdentityConfig, TraversalConfig};
pub use engine::OwnershipEngine;
pub use error::{ConfigError, EngineError, RelationError};
pub use graph::{build_asset_graph, GraphBuilder};
pub use identity::IdentityResolver;
pub use path::{is_chain, parse_path, parse_segment};
pub use portfolio::PortfolioAggregator;
pub use relation::{CachedRelation, InMemoryRelation, OwnershipRelation};
pub use traversal::{ultimate_owners, Direction, RelationTraversal, TraversalResult, UltimateOwner};

// Boundary types
pub use ownership_types;
