//! Portfolio view over a downward traversal

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{GraphNode, NodeId};

/// An asset as held within a portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub id: NodeId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    /// Share held by the immediate owner
    pub share_percent: Option<f64>,
}

/// Count and capacity for one rollup key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RollupBucket {
    pub count: usize,
    pub capacity: f64,
}

impl RollupBucket {
    pub fn add(&mut self, capacity: Option<f64>) {
        self.count += 1;
        self.capacity += capacity.filter(|c| c.is_finite()).unwrap_or(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioRollup {
    pub asset_count: usize,
    pub total_capacity: f64,
    pub by_status: BTreeMap<String, RollupBucket>,
    pub by_country: BTreeMap<String, RollupBucket>,
    pub by_category: BTreeMap<String, RollupBucket>,
}

/// Holdings of one root entity, each asset attributed to exactly one immediate owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub root: GraphNode,
    pub directly_owned: Vec<AssetHolding>,
    /// Immediate owner entity id -> assets it holds
    pub subsidiaries: BTreeMap<NodeId, Vec<AssetHolding>>,
    /// Share on the edge into each subsidiary (from the root when direct)
    pub edge_shares: BTreeMap<NodeId, Option<f64>>,
    /// Entity id -> display name
    pub entity_map: BTreeMap<NodeId, String>,
    pub rollup: PortfolioRollup,
}

impl Portfolio {
    pub fn empty(root: GraphNode) -> Self {
        Self {
            root,
            directly_owned: Vec::new(),
            subsidiaries: BTreeMap::new(),
            edge_shares: BTreeMap::new(),
            entity_map: BTreeMap::new(),
            rollup: PortfolioRollup::default(),
        }
    }

    /// All holdings: direct first, then by subsidiary id
    pub fn assets(&self) -> impl Iterator<Item = &AssetHolding> {
        self.directly_owned
            .iter()
            .chain(self.subsidiaries.values().flatten())
    }

    pub fn asset_count(&self) -> usize {
        self.directly_owned.len() + self.subsidiaries.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_count() == 0
    }
}
