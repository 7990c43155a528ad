//! Ultimate owners and effective ownership
//!
//! Effective ownership multiplies shares along each chain from the asset to an
//! ultimate parent and sums over chains. A chain with any unknown share
//! contributes nothing known; an owner reached only through such chains has an
//! unknown effective share.
//!
//! Sections of the graph with no cycle above them are summed once per node,
//! so layered joint ventures cost one pass over the edges. Chains are only
//! enumerated one by one below a cycle, where they must avoid revisiting a
//! node on the current chain.

use std::collections::{HashMap, HashSet};

use ownership_types::{GraphEdge, NodeId};
use serde::{Deserialize, Serialize};

use super::{Direction, TraversalResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltimateOwner {
    pub id: NodeId,
    pub display_name: String,
    /// Percent of the asset held through all known chains
    pub effective_share: Option<f64>,
    /// Depth of the shallowest edge out of this owner
    pub depth: u32,
    /// Number of distinct chains reaching this owner
    pub chain_count: usize,
}

#[derive(Default)]
struct Accumulator {
    known_total: f64,
    any_known: bool,
    chain_count: usize,
}

/// Chains from one node up to one ultimate owner, summed
#[derive(Debug, Clone, Copy, Default)]
struct ChainSum {
    /// Sum of share products over chains with every share known
    known: f64,
    known_chains: usize,
    chains: usize,
}

impl ChainSum {
    fn single(share: Option<f64>) -> Self {
        match share {
            Some(share) => Self {
                known: share / 100.0,
                known_chains: 1,
                chains: 1,
            },
            None => Self {
                chains: 1,
                ..Self::default()
            },
        }
    }

    /// Prefix every chain with an edge of `share`
    fn through(self, share: Option<f64>) -> Self {
        match share {
            Some(share) => Self {
                known: self.known * share / 100.0,
                ..self
            },
            None => Self {
                chains: self.chains,
                ..Self::default()
            },
        }
    }

    fn absorb(&mut self, other: Self) {
        self.known += other.known;
        self.known_chains = self.known_chains.saturating_add(other.known_chains);
        self.chains = self.chains.saturating_add(other.chains);
    }
}

type OwnersOf<'g> = HashMap<&'g str, Vec<&'g GraphEdge>>;

/// Ultimate owners of an upward walk's root, largest effective share first
///
/// Downward results have no ultimate owners and yield an empty list.
pub fn ultimate_owners(result: &TraversalResult) -> Vec<UltimateOwner> {
    if result.direction != Direction::Up {
        return Vec::new();
    }

    // owned id -> edges from its owners
    let mut owners_of: OwnersOf = HashMap::new();
    for edge in &result.edges {
        owners_of.entry(edge.target.as_str()).or_default().push(edge);
    }

    let mut acyclic: HashMap<&str, bool> = HashMap::new();
    classify(&result.root, &owners_of, &mut HashSet::new(), &mut acyclic);

    let mut memo: HashMap<&str, HashMap<&str, ChainSum>> = HashMap::new();
    let mut totals: HashMap<&str, Accumulator> = HashMap::new();
    let mut on_path: HashSet<&str> = HashSet::new();
    on_path.insert(result.root.as_str());
    walk_chains(
        &result.root,
        Some(1.0),
        &owners_of,
        &acyclic,
        &mut memo,
        &mut on_path,
        &mut totals,
    );

    let mut ultimates: Vec<UltimateOwner> = totals
        .into_iter()
        .map(|(id, acc)| {
            let depth = result
                .edges
                .iter()
                .filter(|e| e.source == id)
                .map(|e| e.depth)
                .min()
                .unwrap_or(0);
            UltimateOwner {
                id: id.to_string(),
                display_name: result
                    .nodes
                    .get(id)
                    .map(|n| n.display_name.clone())
                    .unwrap_or_else(|| id.to_string()),
                effective_share: acc.any_known.then_some(acc.known_total * 100.0),
                depth,
                chain_count: acc.chain_count,
            }
        })
        .collect();

    ultimates.sort_by(|a, b| match (a.effective_share, b.effective_share) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    ultimates
}

/// Mark each owned node `true` when no cycle lies at or above it
fn classify<'g>(
    node: &'g str,
    owners_of: &OwnersOf<'g>,
    on_stack: &mut HashSet<&'g str>,
    acyclic: &mut HashMap<&'g str, bool>,
) -> bool {
    if let Some(&clean) = acyclic.get(node) {
        return clean;
    }
    let Some(edges) = owners_of.get(node) else {
        return true;
    };

    on_stack.insert(node);
    let mut clean = true;
    for &edge in edges {
        let owner = edge.source.as_str();
        let owner_clean = if on_stack.contains(owner) {
            false
        } else {
            classify(owner, owners_of, on_stack, acyclic)
        };
        clean &= owner_clean;
    }
    on_stack.remove(node);
    acyclic.insert(node, clean);
    clean
}

/// Chain sums from an acyclic node to each ultimate owner above it, computed once per node
fn upstream<'g>(
    node: &'g str,
    owners_of: &OwnersOf<'g>,
    memo: &mut HashMap<&'g str, HashMap<&'g str, ChainSum>>,
) {
    if memo.contains_key(node) {
        return;
    }
    let mut sums: HashMap<&str, ChainSum> = HashMap::new();
    if let Some(edges) = owners_of.get(node) {
        for &edge in edges {
            let owner = edge.source.as_str();
            if !owners_of.contains_key(owner) {
                sums.entry(owner)
                    .or_default()
                    .absorb(ChainSum::single(edge.share_percent));
                continue;
            }
            upstream(owner, owners_of, memo);
            if let Some(above) = memo.get(owner) {
                for (&ultimate, &sum) in above {
                    sums.entry(ultimate)
                        .or_default()
                        .absorb(sum.through(edge.share_percent));
                }
            }
        }
    }
    memo.insert(node, sums);
}

/// Depth-first over owner edges; `fraction` is `None` once a share is unknown
///
/// Paths are enumerated only where a cycle lies above; acyclic sections
/// are summed once per node.
fn walk_chains<'g>(
    node: &'g str,
    fraction: Option<f64>,
    owners_of: &OwnersOf<'g>,
    acyclic: &HashMap<&'g str, bool>,
    memo: &mut HashMap<&'g str, HashMap<&'g str, ChainSum>>,
    on_path: &mut HashSet<&'g str>,
    totals: &mut HashMap<&'g str, Accumulator>,
) {
    if acyclic.get(node).copied().unwrap_or(false) {
        upstream(node, owners_of, memo);
        let Some(sums) = memo.get(node) else {
            return;
        };
        for (&ultimate, sum) in sums {
            let acc = totals.entry(ultimate).or_default();
            acc.chain_count = acc.chain_count.saturating_add(sum.chains);
            if let Some(f) = fraction.filter(|_| sum.known_chains > 0) {
                acc.known_total += f * sum.known;
                acc.any_known = true;
            }
        }
        return;
    }

    let Some(edges) = owners_of.get(node) else {
        return;
    };

    for &edge in edges {
        let owner = edge.source.as_str();
        if on_path.contains(owner) {
            continue;
        }
        let next = match (fraction, edge.share_percent) {
            (Some(f), Some(share)) => Some(f * share / 100.0),
            _ => None,
        };

        if owners_of.contains_key(owner) {
            on_path.insert(owner);
            walk_chains(owner, next, owners_of, acyclic, memo, on_path, totals);
            on_path.remove(owner);
        } else {
            let acc = totals.entry(owner).or_default();
            acc.chain_count = acc.chain_count.saturating_add(1);
            if let Some(f) = next {
                acc.known_total += f;
                acc.any_known = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ownership_types::GraphNode;
    use std::collections::BTreeMap;

    fn up_result(edges: Vec<GraphEdge>) -> TraversalResult {
        let mut nodes = BTreeMap::new();
        for e in &edges {
            for id in [&e.source, &e.target] {
                nodes
                    .entry(id.clone())
                    .or_insert_with(|| GraphNode::entity(id.clone(), format!("{} Ltd", id)));
            }
        }
        TraversalResult {
            root: "asset".into(),
            direction: Direction::Up,
            nodes,
            edges,
            truncated: false,
            cancelled: false,
            failed_fetches: 0,
            cycles_detected: 0,
        }
    }

    #[test]
    fn test_effective_share_multiplies_through_chain() {
        let result = up_result(vec![
            GraphEdge::new("hold", "asset", Some(80.0), 0),
            GraphEdge::new("minor", "asset", Some(20.0), 0),
            GraphEdge::new("group", "hold", Some(50.0), 1),
            GraphEdge::new("fund", "hold", Some(50.0), 1),
        ]);
        let owners = ultimate_owners(&result);
        let ids: Vec<_> = owners.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["fund", "group", "minor"]);
        assert!((owners[0].effective_share.unwrap() - 40.0).abs() < 1e-9);
        assert!((owners[2].effective_share.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(owners[0].depth, 1);
        assert_eq!(owners[2].display_name, "minor Ltd");
    }

    #[test]
    fn test_diamond_sums_chains() {
        let result = up_result(vec![
            GraphEdge::new("a", "asset", Some(50.0), 0),
            GraphEdge::new("b", "asset", Some(50.0), 0),
            GraphEdge::new("top", "a", Some(100.0), 1),
            GraphEdge::new("top", "b", Some(100.0), 1),
        ]);
        let owners = ultimate_owners(&result);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].chain_count, 2);
        assert!((owners[0].effective_share.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_share_propagates() {
        let result = up_result(vec![
            GraphEdge::new("hold", "asset", None, 0),
            GraphEdge::new("group", "hold", Some(100.0), 1),
            GraphEdge::new("known", "asset", Some(10.0), 0),
        ]);
        let owners = ultimate_owners(&result);
        assert_eq!(owners[0].id, "known");
        assert_eq!(owners[1].id, "group");
        assert_eq!(owners[1].effective_share, None);
    }

    #[test]
    fn test_joint_venture_lattice_sums_all_chains() {
        // asset <- two co-owners per layer, each owned 50/50 by both of the layer above
        let layers = 30;
        let id = |layer: usize, side: usize| format!("l{}s{}", layer, side);
        let mut edges = vec![
            GraphEdge::new(id(1, 0), "asset", Some(50.0), 0),
            GraphEdge::new(id(1, 1), "asset", Some(50.0), 0),
        ];
        for layer in 2..=layers {
            for owned in 0..2 {
                for owner in 0..2 {
                    edges.push(GraphEdge::new(
                        id(layer, owner),
                        id(layer - 1, owned),
                        Some(50.0),
                        (layer - 1) as u32,
                    ));
                }
            }
        }
        let owners = ultimate_owners(&up_result(edges));

        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].id, id(layers, 0));
        for owner in &owners {
            assert!((owner.effective_share.unwrap() - 50.0).abs() < 1e-9);
            assert_eq!(owner.chain_count, 1 << (layers - 1));
            assert_eq!(owner.depth, (layers - 1) as u32);
        }
    }

    #[test]
    fn test_acyclic_owner_above_cycle_is_summed() {
        let result = up_result(vec![
            GraphEdge::new("a", "asset", Some(100.0), 0),
            GraphEdge::new("b", "a", Some(50.0), 1),
            GraphEdge::new("a", "b", Some(50.0), 2),
            GraphEdge::new("x", "b", Some(50.0), 2),
            GraphEdge::new("top", "x", Some(40.0), 3),
            GraphEdge::new("top", "x2", Some(100.0), 4),
            GraphEdge::new("x2", "x", Some(60.0), 3),
        ]);
        let owners = ultimate_owners(&result);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, "top");
        assert_eq!(owners[0].chain_count, 2);
        // 100% * 50% * 50% * (40% + 60% * 100%)
        assert!((owners[0].effective_share.unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let result = up_result(vec![
            GraphEdge::new("a", "asset", Some(100.0), 0),
            GraphEdge::new("b", "a", Some(50.0), 1),
            GraphEdge::new("a", "b", Some(50.0), 2),
            GraphEdge::new("c", "b", Some(50.0), 2),
        ]);
        let owners = ultimate_owners(&result);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, "c");
        assert!((owners[0].effective_share.unwrap() - 25.0).abs() < 1e-9);
    }
}
