//! Portfolio aggregation over a downward walk
//!
//! Every asset reached from the root entity is attributed to exactly one
//! immediate owner: the root itself when it holds the asset directly, otherwise
//! the subsidiary chosen by [`attributing_edge`].

use std::cmp::Ordering;

use ownership_types::{
    AssetHolding, GraphEdge, GraphNode, NodeId, NodeKind, Portfolio, PortfolioRollup,
};

use crate::traversal::TraversalResult;

/// Rollup key for missing status, country or category
pub const UNKNOWN_BUCKET: &str = "unknown";

pub struct PortfolioAggregator;

impl PortfolioAggregator {
    pub fn aggregate(result: &TraversalResult) -> Portfolio {
        let root = result
            .root_node()
            .cloned()
            .unwrap_or_else(|| GraphNode::entity(result.root.clone(), result.root.clone()));
        let mut portfolio = Portfolio::empty(root);

        for node in result.nodes.values() {
            if node.kind == NodeKind::Entity {
                portfolio
                    .entity_map
                    .insert(node.id.clone(), node.display_name.clone());
            }
        }

        for node in result.nodes.values().filter(|n| n.is_asset()) {
            if node.id == result.root {
                continue;
            }
            let Some(edge) = attributing_edge(&result.edges, &result.root, &node.id) else {
                tracing::warn!(asset_id = %node.id, root = %result.root, "Asset has no inbound edge, dropping from portfolio");
                continue;
            };

            let holding = holding_for(node, edge.share_percent);
            add_to_rollup(&mut portfolio.rollup, &holding);

            if edge.source == result.root {
                portfolio.directly_owned.push(holding);
            } else {
                portfolio
                    .subsidiaries
                    .entry(edge.source.clone())
                    .or_default()
                    .push(holding);
            }
        }

        let subsidiary_ids: Vec<NodeId> = portfolio.subsidiaries.keys().cloned().collect();
        for id in subsidiary_ids {
            let share = attributing_edge(&result.edges, &result.root, &id).and_then(|e| e.share_percent);
            portfolio.edge_shares.insert(id, share);
        }

        tracing::debug!(
            root = %result.root,
            direct = portfolio.directly_owned.len(),
            subsidiaries = portfolio.subsidiaries.len(),
            assets = portfolio.rollup.asset_count,
            "Aggregated portfolio"
        );
        portfolio
    }
}

/// Inbound edge credited with owning `target`
///
/// An edge from the root wins. Otherwise the shallowest edge, then the largest
/// known share, then the lowest source id.
pub fn attributing_edge<'e>(edges: &'e [GraphEdge], root: &str, target: &str) -> Option<&'e GraphEdge> {
    let inbound = edges.iter().filter(|e| e.target == target && e.source != target);
    let mut best: Option<&GraphEdge> = None;
    for edge in inbound {
        best = match best {
            None => Some(edge),
            Some(current) if prefer(edge, current, root) == Ordering::Less => Some(edge),
            keep => keep,
        };
    }
    best
}

fn prefer(a: &GraphEdge, b: &GraphEdge, root: &str) -> Ordering {
    let from_root = |e: &GraphEdge| if e.source == root { 0 } else { 1 };
    from_root(a)
        .cmp(&from_root(b))
        .then(a.depth.cmp(&b.depth))
        .then_with(|| match (a.share_percent, b.share_percent) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.source.cmp(&b.source))
}

fn holding_for(node: &GraphNode, share_percent: Option<f64>) -> AssetHolding {
    let attributes = node.attributes.clone().unwrap_or_default();
    AssetHolding {
        id: node.id.clone(),
        name: node.display_name.clone(),
        status: attributes.status,
        category: attributes.category,
        country: attributes.country,
        capacity: attributes.capacity,
        share_percent,
    }
}

fn bucket_key(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_BUCKET.to_string(),
    }
}

fn add_to_rollup(rollup: &mut PortfolioRollup, holding: &AssetHolding) {
    rollup.asset_count += 1;
    rollup.total_capacity += holding.capacity.filter(|c| c.is_finite()).unwrap_or(0.0);
    rollup
        .by_status
        .entry(bucket_key(holding.status.as_deref()))
        .or_default()
        .add(holding.capacity);
    rollup
        .by_country
        .entry(bucket_key(holding.country.as_deref()))
        .or_default()
        .add(holding.capacity);
    rollup
        .by_category
        .entry(bucket_key(holding.category.as_deref()))
        .or_default()
        .add(holding.capacity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::Direction;
    use ownership_types::AssetAttributes;
    use std::collections::BTreeMap;

    fn attribution_counts(portfolio: &Portfolio) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for holding in portfolio.assets() {
            *counts.entry(holding.id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    fn asset(id: &str, country: Option<&str>, capacity: Option<f64>) -> GraphNode {
        GraphNode::asset(id, format!("Plant {}", id)).with_attributes(Some(AssetAttributes {
            status: Some("operating".into()),
            category: Some("solar".into()),
            country: country.map(String::from),
            capacity,
        }))
    }

    fn result(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> TraversalResult {
        TraversalResult {
            root: "E000001".into(),
            direction: Direction::Down,
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges,
            truncated: false,
            cancelled: false,
            failed_fetches: 0,
            cycles_detected: 0,
        }
    }

    fn sample() -> TraversalResult {
        result(
            vec![
                GraphNode::entity("E000001", "Root Power"),
                GraphNode::entity("E000002", "Sub One"),
                GraphNode::entity("E000003", "Sub Two"),
                asset("G000001", Some("Chile"), Some(100.0)),
                asset("G000002", Some("Chile"), Some(50.0)),
                asset("G000003", None, None),
                asset("G000004", Some("Peru"), Some(25.0)),
            ],
            vec![
                GraphEdge::new("E000001", "G000001", Some(100.0), 0),
                GraphEdge::new("E000001", "E000002", Some(75.0), 0),
                GraphEdge::new("E000001", "E000003", None, 0),
                GraphEdge::new("E000002", "G000002", Some(60.0), 1),
                // held both directly and through a subsidiary
                GraphEdge::new("E000002", "G000001", Some(10.0), 1),
                GraphEdge::new("E000003", "G000003", Some(40.0), 1),
                GraphEdge::new("E000002", "G000004", Some(30.0), 1),
                GraphEdge::new("E000003", "G000004", Some(70.0), 1),
            ],
        )
    }

    #[test]
    fn test_each_asset_attributed_once() {
        let portfolio = PortfolioAggregator::aggregate(&sample());
        let counts = attribution_counts(&portfolio);
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(portfolio.asset_count(), 4);
    }

    #[test]
    fn test_direct_edge_wins() {
        let portfolio = PortfolioAggregator::aggregate(&sample());
        assert_eq!(portfolio.directly_owned.len(), 1);
        assert_eq!(portfolio.directly_owned[0].id, "G000001");
        assert_eq!(portfolio.directly_owned[0].share_percent, Some(100.0));
    }

    #[test]
    fn test_largest_share_breaks_depth_tie() {
        let portfolio = PortfolioAggregator::aggregate(&sample());
        let sub_two: Vec<_> = portfolio.subsidiaries["E000003"].iter().map(|h| h.id.as_str()).collect();
        assert_eq!(sub_two, vec!["G000003", "G000004"]);
        assert_eq!(portfolio.edge_shares["E000002"], Some(75.0));
        assert_eq!(portfolio.edge_shares["E000003"], None);
    }

    #[test]
    fn test_entity_map_and_rollup() {
        let portfolio = PortfolioAggregator::aggregate(&sample());
        assert_eq!(portfolio.entity_map.len(), 3);
        assert_eq!(portfolio.entity_map["E000002"], "Sub One");

        let rollup = &portfolio.rollup;
        assert_eq!(rollup.asset_count, 4);
        assert_eq!(rollup.total_capacity, 175.0);
        assert_eq!(rollup.by_country["Chile"].count, 2);
        assert_eq!(rollup.by_country["Chile"].capacity, 150.0);
        assert_eq!(rollup.by_country[UNKNOWN_BUCKET].count, 1);
        assert_eq!(rollup.by_category["solar"].count, 4);
    }

    #[test]
    fn test_orphan_asset_dropped() {
        let portfolio = PortfolioAggregator::aggregate(&result(
            vec![GraphNode::entity("E000001", "Root"), asset("G000009", None, None)],
            Vec::new(),
        ));
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.root.display_name, "Root");
    }
}
