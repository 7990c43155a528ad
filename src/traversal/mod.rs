//! Relation traversal
//!
//! Walks the live ownership relation upward (asset → owners → ultimate
//! parents) or downward (entity → holdings → assets), one hop at a time.
//!
//! ## Guarantees
//!
//! - Cycle safety: a node is expanded once, at the first hop that reaches it.
//!   Branches meeting at a shared ancestor collapse into that one expansion,
//!   so work grows with the number of rows rather than the number of paths.
//!   An edge back to a node that already reaches the current one closes a
//!   cycle; the closing edge is recorded and nothing is scheduled past it.
//! - Depth cap: `TraversalConfig::max_depth` bounds long acyclic chains. When
//!   hit, the walk stops with `truncated = true`.
//! - Partial results: a failed fetch ends the affected branches only. A
//!   cancellation signal, checked between hops, ends the walk early.
//!
//! Fetches within a hop run concurrently; results are merged on the calling
//! task so no mutable state is shared between branches.

pub mod chains;

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::join_all;
use ownership_types::{GraphEdge, GraphNode, NodeId, NodeKind, OwnershipGraph, OwnershipRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::TraversalConfig;
use crate::error::RelationError;
use crate::identity::IdentityResolver;
use crate::relation::OwnershipRelation;

pub use chains::{ultimate_owners, UltimateOwner};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Asset toward its owners
    Up,
    /// Entity toward its holdings
    Down,
}

/// Everything discovered by one walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub root: NodeId,
    pub direction: Direction,
    pub nodes: BTreeMap<NodeId, GraphNode>,
    /// Edges point owner → owned; depth is the hop at which they were found
    pub edges: Vec<GraphEdge>,
    /// Stopped at the depth cap with branches left unexpanded
    pub truncated: bool,
    pub cancelled: bool,
    /// Lookups that failed; their branches were ended
    pub failed_fetches: usize,
    /// Edges that closed a cycle
    pub cycles_detected: usize,
}

impl TraversalResult {
    fn new(root: &str, direction: Direction) -> Self {
        Self {
            root: root.to_string(),
            direction,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            truncated: false,
            cancelled: false,
            failed_fetches: 0,
            cycles_detected: 0,
        }
    }

    /// Nothing linked to the root
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn max_depth_reached(&self) -> Option<u32> {
        self.edges.iter().map(|e| e.depth).max()
    }

    pub fn root_node(&self) -> Option<&GraphNode> {
        self.nodes.get(&self.root)
    }

    /// Degraded walks still return data, but callers may want to say so
    pub fn is_partial(&self) -> bool {
        self.truncated || self.cancelled || self.failed_fetches > 0
    }

    pub fn into_graph(self) -> OwnershipGraph {
        OwnershipGraph {
            root: self.root,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

type Fetched = Result<Vec<OwnershipRecord>, RelationError>;

/// Upward and downward walks over an ownership relation
pub struct RelationTraversal<'a, R: OwnershipRelation + ?Sized> {
    relation: &'a R,
    resolver: &'a IdentityResolver,
    config: TraversalConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, R: OwnershipRelation + ?Sized> RelationTraversal<'a, R> {
    pub fn new(relation: &'a R, resolver: &'a IdentityResolver, config: TraversalConfig) -> Self {
        Self {
            relation,
            resolver,
            config,
            cancel: None,
        }
    }

    /// Stop between hops once the receiver reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Asset → owners → ... → ultimate parents
    pub async fn traverse_up(&self, asset_id: &str) -> TraversalResult {
        self.walk(asset_id.trim(), Direction::Up).await
    }

    /// Entity → holdings → ... → assets
    pub async fn traverse_down(&self, entity_id: &str) -> TraversalResult {
        self.walk(entity_id.trim(), Direction::Down).await
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn walk(&self, root: &str, direction: Direction) -> TraversalResult {
        let mut result = TraversalResult::new(root, direction);
        let mut edge_index: HashMap<(NodeId, NodeId), usize> = HashMap::new();
        // walk-direction adjacency of edges recorded so far
        let mut walked: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut scheduled: HashSet<NodeId> = HashSet::from([root.to_string()]);
        let mut frontier = vec![root.to_string()];
        let mut depth: u32 = 0;

        while !frontier.is_empty() {
            if self.is_cancelled() {
                tracing::info!(root = %root, depth, "Traversal cancelled, returning partial result");
                result.cancelled = true;
                break;
            }
            if depth >= self.config.max_depth {
                tracing::warn!(
                    root = %root,
                    max_depth = self.config.max_depth,
                    pending_nodes = frontier.len(),
                    "Traversal depth cap reached, returning partial result"
                );
                result.truncated = true;
                break;
            }

            let fetched = self.fetch_hop(&frontier, direction).await;
            let mut next = Vec::new();

            for node in &frontier {
                let Some(Ok(rows)) = fetched.get(node) else {
                    continue;
                };

                for row in rows {
                    let Some((owner, owned)) = self.endpoints(row, &mut result) else {
                        continue;
                    };
                    let far = match direction {
                        Direction::Up => owner.clone(),
                        Direction::Down => owned.clone(),
                    };

                    merge_edge(
                        &mut result.edges,
                        &mut edge_index,
                        GraphEdge::new(owner, owned, row.share_percent, depth),
                    );

                    if scheduled.contains(&far) && reaches(&walked, &far, node) {
                        tracing::debug!(root = %root, node = %far, "Ownership cycle closed");
                        result.cycles_detected += 1;
                        continue;
                    }
                    walked.entry(node.clone()).or_default().push(far.clone());
                    if scheduled.insert(far.clone()) {
                        next.push(far);
                    }
                }
            }

            result.failed_fetches += fetched.values().filter(|r| r.is_err()).count();
            frontier = next;
            depth += 1;
        }

        if !result.nodes.contains_key(root) {
            let kind = match direction {
                Direction::Up => self.resolver.kind_of(root),
                Direction::Down => NodeKind::Entity,
            };
            result
                .nodes
                .insert(root.to_string(), GraphNode::new(root, root, kind));
        }

        tracing::debug!(
            root = %root,
            direction = ?direction,
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            failed_fetches = result.failed_fetches,
            "Traversal complete"
        );
        result
    }

    /// Fetch rows for every distinct frontier node of one hop
    async fn fetch_hop(&self, frontier: &[NodeId], direction: Direction) -> HashMap<NodeId, Fetched> {
        let mut ids = frontier.to_vec();
        ids.sort();

        if self.config.batch_lookups {
            return self.fetch_batch(ids, direction).await;
        }

        let responses = join_all(ids.iter().map(|id| async move {
            match direction {
                Direction::Up => self.relation.owners_of(id).await,
                Direction::Down => self.relation.holdings_of(id).await,
            }
        }))
        .await;

        ids.into_iter()
            .zip(responses)
            .map(|(id, response)| {
                if let Err(e) = &response {
                    tracing::warn!(node = %id, error = %e, "Ownership lookup failed, ending branch");
                }
                (id, response)
            })
            .collect()
    }

    /// One `*_of_any` query per hop; a failure ends every branch of the hop
    async fn fetch_batch(&self, ids: Vec<NodeId>, direction: Direction) -> HashMap<NodeId, Fetched> {
        let response = match direction {
            Direction::Up => self.relation.owners_of_any(&ids).await,
            Direction::Down => self.relation.holdings_of_any(&ids).await,
        };

        match response {
            Ok(rows) => {
                let mut grouped: HashMap<NodeId, Fetched> =
                    ids.iter().map(|id| (id.clone(), Ok(Vec::new()))).collect();
                for row in rows {
                    let key = match direction {
                        Direction::Up => row.subject_id.trim().to_string(),
                        Direction::Down => match row.owner_key() {
                            Some(owner) => owner.to_string(),
                            None => self.resolver.derive(row.owner_name.trim()),
                        },
                    };
                    if let Some(Ok(bucket)) = grouped.get_mut(&key) {
                        bucket.push(row);
                    }
                }
                grouped
            }
            Err(e) => {
                tracing::warn!(nodes = ids.len(), error = %e, "Batch ownership lookup failed, ending branches");
                let message = e.to_string();
                ids.into_iter()
                    .map(|id| {
                        let err = RelationError::QueryFailed {
                            key: id.clone(),
                            message: message.clone(),
                        };
                        (id, Err(err))
                    })
                    .collect()
            }
        }
    }

    /// Resolve `(owner_id, owned_id)` for a row and record both nodes
    fn endpoints(&self, row: &OwnershipRecord, result: &mut TraversalResult) -> Option<(NodeId, NodeId)> {
        let owned = row.subject_id.trim();
        if owned.is_empty() {
            tracing::warn!(owner_name = %row.owner_name, "Ownership row has no subject id, skipping");
            return None;
        }
        let owner = match row.owner_key() {
            Some(id) => id.to_string(),
            None if !row.owner_name.trim().is_empty() => self.resolver.derive(row.owner_name.trim()),
            None => {
                tracing::warn!(subject_id = %owned, "Ownership row has no owner id or name, skipping");
                return None;
            }
        };

        let owned_kind = row
            .subject_kind
            .unwrap_or_else(|| self.resolver.kind_of(owned));
        upsert_node(
            &mut result.nodes,
            GraphNode::new(owned, display_or_id(&row.subject_name, owned), owned_kind)
                .with_attributes(row.subject_attributes()),
        );
        upsert_node(
            &mut result.nodes,
            GraphNode::entity(owner.clone(), display_or_id(&row.owner_name, &owner)),
        );
        Some((owner, owned.to_string()))
    }
}

fn display_or_id(name: &str, id: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}

/// First sighting wins, but later rows may fill in missing attributes
fn upsert_node(nodes: &mut BTreeMap<NodeId, GraphNode>, node: GraphNode) {
    match nodes.get_mut(&node.id) {
        Some(existing) => {
            if existing.attributes.is_none() {
                existing.attributes = node.attributes;
            }
        }
        None => {
            nodes.insert(node.id.clone(), node);
        }
    }
}

/// Whether `to` is reachable from `from` over walked edges
fn reaches(walked: &HashMap<NodeId, Vec<NodeId>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen: HashSet<&str> = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(nexts) = walked.get(node) {
            stack.extend(nexts.iter().map(String::as_str));
        }
    }
    false
}

/// One edge per pair, at its shallowest depth
///
/// Same share rule as path graphs: the last known share wins, and a later
/// unknown share does not erase a known one.
fn merge_edge(
    edges: &mut Vec<GraphEdge>,
    index: &mut HashMap<(NodeId, NodeId), usize>,
    edge: GraphEdge,
) {
    let key = (edge.source.clone(), edge.target.clone());
    match index.get(&key) {
        Some(&idx) => {
            let existing = &mut edges[idx];
            existing.depth = existing.depth.min(edge.depth);
            if edge.share_percent.is_some() {
                existing.share_percent = edge.share_percent;
            }
        }
        None => {
            index.insert(key, edges.len());
            edges.push(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::InMemoryRelation;

    fn resolver() -> IdentityResolver {
        IdentityResolver::default()
    }

    fn link(subject: &str, owner: &str, share: f64) -> OwnershipRecord {
        OwnershipRecord::new(subject, format!("{} name", subject), format!("{} name", owner))
            .with_owner_id(owner)
            .with_share(share)
    }

    #[tokio::test]
    async fn test_traverse_up_depths() {
        let r = resolver();
        let relation = InMemoryRelation::new(
            vec![
                link("G100000000001", "E100000000001", 60.0),
                link("G100000000001", "E100000000002", 40.0),
                link("E100000000001", "E100000000003", 100.0),
            ],
            &r,
        );
        let traversal = RelationTraversal::new(&relation, &r, TraversalConfig::default());
        let result = traversal.traverse_up("G100000000001").await;

        assert_eq!(result.edges.len(), 3);
        assert_eq!(result.nodes.len(), 4);
        assert_eq!(result.max_depth_reached(), Some(1));
        let top = result
            .edges
            .iter()
            .find(|e| e.source == "E100000000003")
            .unwrap();
        assert_eq!(top.target, "E100000000001");
        assert_eq!(top.depth, 1);
        assert_eq!(result.root_node().unwrap().kind, NodeKind::Asset);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_two_cycle_terminates() {
        let r = resolver();
        let relation = InMemoryRelation::new(
            vec![
                link("E100000000002", "E100000000001", 50.0),
                link("E100000000001", "E100000000002", 50.0),
            ],
            &r,
        );
        let traversal = RelationTraversal::new(&relation, &r, TraversalConfig::default());
        let result = traversal.traverse_down("E100000000001").await;

        assert_eq!(result.edges.len(), 2);
        assert_eq!(result.cycles_detected, 1);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_duplicate_rows_keep_last_known_share() {
        let r = resolver();
        let unknown = OwnershipRecord::new("G100000000001", "Plant", "Holdings")
            .with_owner_id("E100000000001");
        let relation = InMemoryRelation::new(
            vec![
                link("G100000000001", "E100000000001", 30.0),
                link("G100000000001", "E100000000001", 45.0),
                unknown,
            ],
            &r,
        );
        let traversal = RelationTraversal::new(&relation, &r, TraversalConfig::default());
        let result = traversal.traverse_up("G100000000001").await;

        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].share_percent, Some(45.0));
    }

    #[tokio::test]
    async fn test_cycle_reached_through_sibling_is_counted() {
        let r = resolver();
        // E1 and E2 both own the asset and each other
        let relation = InMemoryRelation::new(
            vec![
                link("G100000000001", "E100000000001", 50.0),
                link("G100000000001", "E100000000002", 50.0),
                link("E100000000001", "E100000000002", 10.0),
                link("E100000000002", "E100000000001", 10.0),
            ],
            &r,
        );
        let traversal = RelationTraversal::new(&relation, &r, TraversalConfig::default());
        let result = traversal.traverse_up("G100000000001").await;

        assert_eq!(result.edges.len(), 4);
        assert_eq!(result.cycles_detected, 1);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_unknown_root_is_empty() {
        let r = resolver();
        let relation = InMemoryRelation::default();
        let traversal = RelationTraversal::new(&relation, &r, TraversalConfig::default());
        let result = traversal.traverse_up("G100000000404").await;
        assert!(result.is_empty());
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.into_graph().root, "G100000000404");
    }
}
