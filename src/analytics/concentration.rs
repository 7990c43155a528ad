//! Concentration and inequality measures
//!
//! All functions are total: degenerate input yields zero rather than NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HhiBand {
    Unconcentrated,
    Moderate,
    Concentrated,
}

impl HhiBand {
    pub fn classify(hhi: f64, config: &AnalyticsConfig) -> Self {
        if hhi < config.hhi_moderate {
            Self::Unconcentrated
        } else if hhi <= config.hhi_concentrated {
            Self::Moderate
        } else {
            Self::Concentrated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiniBand {
    Low,
    Moderate,
    High,
}

impl GiniBand {
    pub fn classify(gini: f64, config: &AnalyticsConfig) -> Self {
        if gini < config.gini_moderate {
            Self::Low
        } else if gini < config.gini_high {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoBand {
    Diversified,
    ModeratelyConcentrated,
    HighlyConcentrated,
}

/// Country spread of a set of assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoConcentration {
    pub top_country: Option<String>,
    /// Percent of assets in the top country
    pub top_share: f64,
    /// Percent of assets in the three largest countries
    pub top3_share: f64,
    pub hhi: f64,
    pub country_count: usize,
    pub band: GeoBand,
}

fn usable(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Herfindahl-Hirschman Index of `shares`, normalised to sum 100 first
///
/// ```
/// use ownership_engine::analytics::calculate_hhi;
/// assert!((calculate_hhi(&[50.0, 30.0, 20.0]) - 3800.0).abs() < 1e-9);
/// assert_eq!(calculate_hhi(&[]), 0.0);
/// ```
pub fn calculate_hhi(shares: &[f64]) -> f64 {
    let total: f64 = usable(shares).sum();
    if total <= 0.0 {
        return 0.0;
    }
    usable(shares)
        .map(|s| {
            let normalised = s / total * 100.0;
            normalised * normalised
        })
        .sum()
}

/// Gini coefficient in [0, 1]
pub fn calculate_gini(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = usable(values).collect();
    let n = sorted.len();
    if n <= 1 {
        return 0.0;
    }
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    // G = 2 * sum(i * x_i) / (n * sum(x)) - (n + 1) / n, with i from 1
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (i as f64 + 1.0) * x)
        .sum();
    let n = n as f64;
    let gini = 2.0 * weighted / (n * total) - (n + 1.0) / n;
    gini.clamp(0.0, 1.0)
}

/// Spread of assets over countries, from country -> asset count
pub fn geographic_concentration(counts: &BTreeMap<String, usize>) -> GeoConcentration {
    let total: usize = counts.values().sum();
    if total == 0 {
        return GeoConcentration {
            top_country: None,
            top_share: 0.0,
            top3_share: 0.0,
            hhi: 0.0,
            country_count: 0,
            band: GeoBand::Diversified,
        };
    }

    let mut ranked: Vec<(&String, usize)> = counts
        .iter()
        .filter(|(_, &c)| c > 0)
        .map(|(k, &c)| (k, c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let pct = |c: usize| c as f64 / total as f64 * 100.0;
    let top3_share = pct(ranked.iter().take(3).map(|(_, c)| c).sum());
    let band = if top3_share > 80.0 {
        GeoBand::HighlyConcentrated
    } else if top3_share > 50.0 {
        GeoBand::ModeratelyConcentrated
    } else {
        GeoBand::Diversified
    };
    let counts_f: Vec<f64> = ranked.iter().map(|(_, c)| *c as f64).collect();

    GeoConcentration {
        top_country: ranked.first().map(|(k, _)| (*k).clone()),
        top_share: ranked.first().map(|(_, c)| pct(*c)).unwrap_or(0.0),
        top3_share,
        hhi: calculate_hhi(&counts_f),
        country_count: ranked.len(),
        band,
    }
}
