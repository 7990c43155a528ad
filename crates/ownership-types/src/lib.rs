//! Ownership Types - shared data model for the ownership engine.
//!
//! Everything the engine accepts or returns is a plain serde type defined here,
//! so presentation layers can depend on this crate without pulling in the
//! traversal or analytics machinery.
//!
//! - `OwnershipRecord` - one immutable row of the ownership relation
//! - `Segment` - one parsed token of an ownership path string
//! - `GraphNode` / `GraphEdge` / `OwnershipGraph` - ownership graph projection
//! - `Portfolio` / `AssetHolding` / `PortfolioRollup` - downstream holdings view
//! - `AnomalyFinding` / `Severity` - advisory findings
//! - `IdentifierRef` - classified identifier strings

pub mod anomaly;
pub mod graph;
pub mod identifier;
pub mod portfolio;
pub mod record;

pub use anomaly::{sort_by_severity, AnomalyFinding, Severity};
pub use graph::{AssetAttributes, GraphEdge, GraphNode, NodeId, NodeKind, OwnershipGraph, Segment};
pub use identifier::IdentifierRef;
pub use portfolio::{AssetHolding, Portfolio, PortfolioRollup, RollupBucket};
pub use record::OwnershipRecord;
