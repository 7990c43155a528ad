//! Concentration analytics
//!
//! Pure functions over portfolios and ownership rows. No I/O.
//!
//! - `concentration` - HHI, Gini and geographic spread
//! - `outliers` - z-score outliers
//! - `coinvestment` - owner pair frequency
//! - `anomaly` - per-asset rule findings

pub mod anomaly;
pub mod coinvestment;
pub mod concentration;
pub mod outliers;

use std::collections::{BTreeMap, BTreeSet};

use ownership_types::{AssetHolding, OwnershipRecord, Portfolio};
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::portfolio::UNKNOWN_BUCKET;

pub use anomaly::{AnomalyRules, AssetProfile};
pub use coinvestment::{co_investment_pairs, CoInvestmentPair};
pub use concentration::{
    calculate_gini, calculate_hhi, geographic_concentration, GeoBand, GeoConcentration, GiniBand,
    HhiBand,
};
pub use outliers::{detect_outliers, Outlier, OutlierDirection};

/// Concentration summary of one entity's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub asset_count: usize,
    pub total_capacity: f64,
    /// HHI of capacity across immediate owners (root and subsidiaries)
    pub owner_capacity_hhi: f64,
    pub owner_capacity_band: HhiBand,
    /// Inequality of asset capacities
    pub capacity_gini: f64,
    pub capacity_gini_band: GiniBand,
    /// Spread of asset counts over countries; assets without a country are left out
    pub geography: GeoConcentration,
    pub capacity_outliers: Vec<Outlier>,
}

pub fn portfolio_metrics(portfolio: &Portfolio, config: &AnalyticsConfig) -> PortfolioMetrics {
    let mut owner_capacity = vec![capacity_of(&portfolio.directly_owned)];
    owner_capacity.extend(portfolio.subsidiaries.values().map(|h| capacity_of(h)));
    let owner_capacity_hhi = calculate_hhi(&owner_capacity);

    let capacities: Vec<f64> = portfolio.assets().filter_map(|h| h.capacity).collect();
    let capacity_gini = calculate_gini(&capacities);

    let country_counts: BTreeMap<String, usize> = portfolio
        .rollup
        .by_country
        .iter()
        .filter(|(country, _)| country.as_str() != UNKNOWN_BUCKET)
        .map(|(country, bucket)| (country.clone(), bucket.count))
        .collect();

    let labelled: Vec<(String, f64)> = portfolio
        .assets()
        .filter_map(|h| h.capacity.map(|c| (h.id.clone(), c)))
        .collect();

    PortfolioMetrics {
        asset_count: portfolio.rollup.asset_count,
        total_capacity: portfolio.rollup.total_capacity,
        owner_capacity_hhi,
        owner_capacity_band: HhiBand::classify(owner_capacity_hhi, config),
        capacity_gini,
        capacity_gini_band: GiniBand::classify(capacity_gini, config),
        geography: geographic_concentration(&country_counts),
        capacity_outliers: detect_outliers(&labelled, config.z_threshold),
    }
}

fn capacity_of(holdings: &[AssetHolding]) -> f64 {
    holdings
        .iter()
        .filter_map(|h| h.capacity)
        .filter(|c| c.is_finite())
        .sum()
}

/// Ownership concentration of one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetOwnershipMetrics {
    pub owner_count: usize,
    pub known_share_total: f64,
    pub unknown_share_count: usize,
    pub hhi: f64,
    pub band: HhiBand,
}

/// Metrics over an asset's direct owner rows
///
/// Owners are distinguished by id, or by name where no id is present.
pub fn asset_ownership_metrics(
    owner_rows: &[OwnershipRecord],
    config: &AnalyticsConfig,
) -> AssetOwnershipMetrics {
    let owners: BTreeSet<&str> = owner_rows
        .iter()
        .map(|r| r.owner_key().unwrap_or_else(|| r.owner_name.trim()))
        .filter(|k| !k.is_empty())
        .collect();
    let known: Vec<f64> = owner_rows
        .iter()
        .filter_map(|r| r.share_percent)
        .filter(|s| s.is_finite())
        .collect();
    let hhi = calculate_hhi(&known);

    AssetOwnershipMetrics {
        owner_count: owners.len(),
        known_share_total: known.iter().sum(),
        unknown_share_count: owner_rows.len() - known.len(),
        hhi,
        band: HhiBand::classify(hhi, config),
    }
}
