//! Ownership graph types
//!
//! These types define the graph projection handed to presentation layers.
//! Nodes carry enough to build links and labels without re-querying.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node identifier: a canonical database key or a derived identity
pub type NodeId = String;

/// One token of a parsed ownership path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    /// `None` = explicitly unknown, distinct from `Some(0.0)`
    pub percentage: Option<f64>,
}

impl Segment {
    pub fn new(name: impl Into<String>, percentage: Option<f64>) -> Self {
        Self {
            name: name.into(),
            percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Entity,
    Asset,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Asset => "asset",
        }
    }
}

/// Descriptive fields of an asset, as recorded on relation rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssetAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
}

impl AssetAttributes {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.category.is_none()
            && self.country.is_none()
            && self.capacity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub display_name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AssetAttributes>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, display_name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            attributes: None,
        }
    }

    pub fn entity(id: impl Into<NodeId>, display_name: impl Into<String>) -> Self {
        Self::new(id, display_name, NodeKind::Entity)
    }

    pub fn asset(id: impl Into<NodeId>, display_name: impl Into<String>) -> Self {
        Self::new(id, display_name, NodeKind::Asset)
    }

    pub fn with_attributes(mut self, attributes: Option<AssetAttributes>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn is_asset(&self) -> bool {
        self.kind == NodeKind::Asset
    }
}

/// Directed ownership edge: `source` owns `share_percent` of `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub share_percent: Option<f64>,
    /// Distance from the query root; 0 = directly linked to it
    pub depth: u32,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        share_percent: Option<f64>,
        depth: u32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            share_percent,
            depth,
        }
    }
}

/// Graph built for one target asset or entity. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OwnershipGraph {
    pub root: NodeId,
    pub nodes: BTreeMap<NodeId, GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl OwnershipGraph {
    pub fn empty(root: impl Into<NodeId>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// No edges means nothing to show; the root alone is not a graph
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.edges.iter().map(|e| e.depth).max()
    }

    pub fn edges_into<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }
}
