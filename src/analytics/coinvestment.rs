//! Co-investment pair frequency

use std::collections::{BTreeMap, BTreeSet};

use ownership_types::NodeId;
use serde::{Deserialize, Serialize};

/// Two owners appearing together on one or more assets; `owner_a < owner_b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoInvestmentPair {
    pub owner_a: NodeId,
    pub owner_b: NodeId,
    pub count: usize,
    pub shared_assets: Vec<NodeId>,
}

/// Most frequent owner pairs over `owners_by_asset`, at most `top_n`
///
/// Owners repeated on one asset count once. Ties are ordered by owner ids.
pub fn co_investment_pairs(
    owners_by_asset: &BTreeMap<NodeId, Vec<NodeId>>,
    top_n: usize,
) -> Vec<CoInvestmentPair> {
    let mut shared: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();

    for (asset, owners) in owners_by_asset {
        let distinct: BTreeSet<&str> = owners.iter().map(String::as_str).collect();
        let distinct: Vec<&str> = distinct.into_iter().collect();
        for (i, &a) in distinct.iter().enumerate() {
            for &b in &distinct[i + 1..] {
                shared.entry((a, b)).or_default().push(asset.as_str());
            }
        }
    }

    let mut pairs: Vec<CoInvestmentPair> = shared
        .into_iter()
        .map(|((a, b), assets)| CoInvestmentPair {
            owner_a: a.to_string(),
            owner_b: b.to_string(),
            count: assets.len(),
            shared_assets: assets.into_iter().map(String::from).collect(),
        })
        .collect();
    pairs.sort_by(|x, y| {
        y.count
            .cmp(&x.count)
            .then_with(|| x.owner_a.cmp(&y.owner_a))
            .then_with(|| x.owner_b.cmp(&y.owner_b))
    });
    pairs.truncate(top_n);
    pairs
}
