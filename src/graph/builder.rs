//! Graph builder for one target asset
//!
//! Consumes the ownership path strings of every record that ends at the asset
//! and merges them into a single deduplicated graph. Paths are collected first
//! and processed in `build()`, so identity choices do not depend on the order
//! records were added in.

use std::collections::HashMap;

use ownership_types::{GraphEdge, GraphNode, NodeId, OwnershipGraph, OwnershipRecord, Segment};

use crate::identity::IdentityResolver;
use crate::path::{is_chain, parse_path};

#[derive(Debug, Clone)]
enum PendingPath {
    /// Full chain string ending at the target
    Chain(String),
    /// Record without a usable chain: single owner -> target link
    Direct {
        owner_name: String,
        share_percent: Option<f64>,
    },
}

pub struct GraphBuilder<'a> {
    resolver: &'a IdentityResolver,
    target_id: NodeId,
    target_name: String,
    /// Display name -> canonical id supplied by records
    known_ids: HashMap<String, NodeId>,
    pending: Vec<PendingPath>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        resolver: &'a IdentityResolver,
        target_id: impl Into<NodeId>,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            target_id: target_id.into(),
            target_name: target_name.into().trim().to_string(),
            known_ids: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Map a display name to a canonical id for this build
    pub fn with_known_identity(mut self, name: &str, id: impl Into<NodeId>) -> Self {
        self.register_identity(name, id.into());
        self
    }

    pub fn add_path(&mut self, path: &str) -> &mut Self {
        self.pending.push(PendingPath::Chain(path.to_string()));
        self
    }

    pub fn add_record(&mut self, record: &OwnershipRecord) -> &mut Self {
        if let Some(owner_id) = record.owner_key() {
            self.register_identity(&record.owner_name, owner_id.to_string());
        }

        match record.ownership_path.as_deref() {
            Some(path) if is_chain(path) => {
                self.pending.push(PendingPath::Chain(path.to_string()));
            }
            _ if !record.owner_name.trim().is_empty() => {
                self.pending.push(PendingPath::Direct {
                    owner_name: record.owner_name.trim().to_string(),
                    share_percent: record.share_percent,
                });
            }
            _ => {
                tracing::warn!(
                    subject_id = %record.subject_id,
                    "Record has neither an ownership path nor an owner name, skipping"
                );
            }
        }
        self
    }

    pub fn add_records<'r>(&mut self, records: impl IntoIterator<Item = &'r OwnershipRecord>) -> &mut Self {
        for record in records {
            self.add_record(record);
        }
        self
    }

    pub fn build(&self) -> OwnershipGraph {
        let mut state = BuildState {
            graph: OwnershipGraph::empty(self.target_id.clone()),
            edge_index: HashMap::new(),
        };
        state.graph.nodes.insert(
            self.target_id.clone(),
            GraphNode::asset(self.target_id.clone(), self.target_name.clone()),
        );

        for pending in &self.pending {
            match pending {
                PendingPath::Chain(path) => self.merge_chain(&mut state, path),
                PendingPath::Direct {
                    owner_name,
                    share_percent,
                } => {
                    let owner_id = self.node_for(&mut state.graph, owner_name);
                    state.merge_edge(owner_id, self.target_id.clone(), *share_percent, 0);
                }
            }
        }

        tracing::debug!(
            target_id = %self.target_id,
            nodes = state.graph.nodes.len(),
            edges = state.graph.edges.len(),
            "Built ownership graph from paths"
        );
        state.graph
    }

    fn merge_chain(&self, state: &mut BuildState, path: &str) {
        let segments = parse_path(path);
        if segments.len() < 2 {
            tracing::debug!(path = %path, "Single-segment ownership path, skipping");
            return;
        }
        if segments.iter().any(|s| s.name.is_empty()) {
            tracing::warn!(path = %path, "Ownership path has an empty segment, skipping");
            return;
        }

        let ids: Vec<NodeId> = segments
            .iter()
            .map(|segment| self.node_for(&mut state.graph, &segment.name))
            .collect();

        // The pair ending at the subject is depth 0
        let deepest = segments.len() - 2;
        for (i, pair) in ids.windows(2).enumerate() {
            let Segment { percentage, .. } = &segments[i];
            state.merge_edge(pair[0].clone(), pair[1].clone(), *percentage, (deepest - i) as u32);
        }
    }

    /// Resolve a segment name and make sure its node exists
    fn node_for(&self, graph: &mut OwnershipGraph, name: &str) -> NodeId {
        if name == self.target_name {
            return self.target_id.clone();
        }
        let id = match self.known_ids.get(name) {
            Some(id) => id.clone(),
            None => self.resolver.derive(name),
        };
        graph
            .nodes
            .entry(id.clone())
            .or_insert_with(|| GraphNode::new(id.clone(), name, self.resolver.kind_of(&id)));
        id
    }

    fn register_identity(&mut self, name: &str, id: NodeId) {
        let name = name.trim();
        if name.is_empty() || name == self.target_name {
            return;
        }
        match self.known_ids.get_mut(name) {
            Some(existing) if *existing != id => {
                tracing::warn!(
                    name = %name,
                    kept = %existing.as_str().min(id.as_str()),
                    dropped = %existing.as_str().max(id.as_str()),
                    "Owner name maps to conflicting ids, keeping the smallest"
                );
                if id < *existing {
                    *existing = id;
                }
            }
            Some(_) => {}
            None => {
                self.known_ids.insert(name.to_string(), id);
            }
        }
    }
}

struct BuildState {
    graph: OwnershipGraph,
    edge_index: HashMap<(NodeId, NodeId), usize>,
}

impl BuildState {
    /// Last known share wins, an unknown share never replaces a known one,
    /// and the shallowest depth is kept. Relation walks merge the same way.
    fn merge_edge(&mut self, source: NodeId, target: NodeId, share: Option<f64>, depth: u32) {
        if source == target {
            tracing::debug!(node = %source, "Self-referencing ownership step, skipping");
            return;
        }
        match self.edge_index.get(&(source.clone(), target.clone())) {
            Some(&idx) => {
                let edge = &mut self.graph.edges[idx];
                if share.is_some() {
                    edge.share_percent = share;
                }
                edge.depth = edge.depth.min(depth);
            }
            None => {
                self.edge_index
                    .insert((source.clone(), target.clone()), self.graph.edges.len());
                self.graph
                    .edges
                    .push(GraphEdge::new(source, target, share, depth));
            }
        }
    }
}

/// Build the graph for one asset from its records
pub fn build_asset_graph<'r>(
    resolver: &IdentityResolver,
    target_id: &str,
    target_name: &str,
    records: impl IntoIterator<Item = &'r OwnershipRecord>,
) -> OwnershipGraph {
    let mut builder = GraphBuilder::new(resolver, target_id, target_name);
    builder.add_records(records);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ownership_types::NodeKind;

    const ASSET_ID: &str = "G100000000001";

    fn edge<'g>(graph: &'g OwnershipGraph, source: &str, target: &str) -> &'g GraphEdge {
        graph
            .edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .expect("edge present")
    }

    #[test]
    fn test_shared_parent_paths_merge() {
        let resolver = IdentityResolver::default();
        let mut builder = GraphBuilder::new(&resolver, ASSET_ID, "Asset");
        builder
            .add_path("Parent [50%] -> Asset [100%]")
            .add_path("Parent [50%] -> Other [25%] -> Asset [100%]");
        let graph = builder.build();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 3);

        let parent = resolver.derive("Parent");
        let other = resolver.derive("Other");
        assert_eq!(edge(&graph, &other, ASSET_ID).depth, 0);
        assert_eq!(edge(&graph, &parent, &other).depth, 1);
        assert_eq!(edge(&graph, &parent, ASSET_ID).depth, 0);
        assert_eq!(edge(&graph, &other, ASSET_ID).share_percent, Some(25.0));
        assert_eq!(graph.node(ASSET_ID).unwrap().kind, NodeKind::Asset);
        assert_eq!(graph.node(&parent).unwrap().kind, NodeKind::Entity);
    }

    #[test]
    fn test_order_does_not_change_node_and_edge_sets() {
        let resolver = IdentityResolver::default();
        let paths = [
            "Top [60%] -> Mid [80%] -> Asset",
            "Top [40%] -> Asset",
            "Side [unknown %] -> Mid [20%] -> Asset",
        ];

        let mut forward = GraphBuilder::new(&resolver, ASSET_ID, "Asset");
        for p in paths {
            forward.add_path(p);
        }
        let mut backward = GraphBuilder::new(&resolver, ASSET_ID, "Asset");
        for p in paths.iter().rev() {
            backward.add_path(p);
        }

        let (a, b) = (forward.build(), backward.build());
        assert_eq!(a.nodes, b.nodes);
        let pairs = |g: &OwnershipGraph| {
            let mut v: Vec<_> = g
                .edges
                .iter()
                .map(|e| (e.source.clone(), e.target.clone(), e.depth))
                .collect();
            v.sort();
            v
        };
        assert_eq!(pairs(&a), pairs(&b));
    }

    #[test]
    fn test_duplicate_edge_last_known_share_wins() {
        let resolver = IdentityResolver::default();
        let mut builder = GraphBuilder::new(&resolver, ASSET_ID, "Asset");
        builder
            .add_path("Owner [30%] -> Asset")
            .add_path("Owner [35%] -> Asset")
            .add_path("Owner [unknown %] -> Asset");
        let graph = builder.build();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].share_percent, Some(35.0));
    }

    #[test]
    fn test_record_owner_id_used_for_matching_name() {
        let resolver = IdentityResolver::default();
        let records = vec![
            OwnershipRecord::new(ASSET_ID, "Asset", "Holdco")
                .with_owner_id("E100000000009")
                .with_share(100.0)
                .with_path("Group [100%] -> Holdco [100%] -> Asset"),
        ];
        let graph = build_asset_graph(&resolver, ASSET_ID, "Asset", &records);
        assert!(graph.nodes.contains_key("E100000000009"));
        assert_eq!(edge(&graph, "E100000000009", ASSET_ID).depth, 0);
    }

    #[test]
    fn test_conflicting_owner_ids_resolve_to_smallest() {
        let resolver = IdentityResolver::default();
        let first = OwnershipRecord::new(ASSET_ID, "Asset", "Holdco")
            .with_owner_id("E100000000009")
            .with_share(60.0);
        let second = OwnershipRecord::new(ASSET_ID, "Asset", "Holdco")
            .with_owner_id("E100000000003")
            .with_path("Group [100%] -> Holdco [60%] -> Asset");

        let forward = build_asset_graph(&resolver, ASSET_ID, "Asset", [&first, &second]);
        let reverse = build_asset_graph(&resolver, ASSET_ID, "Asset", [&second, &first]);

        assert!(forward.nodes.contains_key("E100000000003"));
        assert!(!forward.nodes.contains_key("E100000000009"));
        assert_eq!(forward.nodes, reverse.nodes);
        assert_eq!(edge(&forward, "E100000000003", ASSET_ID).share_percent, Some(60.0));
        assert_eq!(
            edge(&reverse, &resolver.derive("Group"), "E100000000003").depth,
            1
        );
    }

    #[test]
    fn test_record_without_chain_falls_back_to_direct_edge() {
        let resolver = IdentityResolver::default();
        let records = vec![
            OwnershipRecord::new(ASSET_ID, "Asset", "Solo Owner").with_share(70.0),
            OwnershipRecord::new(ASSET_ID, "Asset", "Other").with_path("Other [30%]"),
        ];
        let graph = build_asset_graph(&resolver, ASSET_ID, "Asset", &records);
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| e.target == ASSET_ID && e.depth == 0));
    }

    #[test]
    fn test_malformed_paths_skipped() {
        let resolver = IdentityResolver::default();
        let mut builder = GraphBuilder::new(&resolver, ASSET_ID, "Asset");
        builder
            .add_path("Lonely [10%]")
            .add_path("A [10%] ->  -> Asset")
            .add_path("Asset -> Asset");
        let graph = builder.build();
        assert!(graph.is_empty());
        assert_eq!(graph.nodes.len(), 1);
    }
}
