//! Z-score outliers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierDirection {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub id: String,
    pub value: f64,
    pub z_score: f64,
    pub direction: OutlierDirection,
}

/// Values whose |z| is at least `threshold`, most extreme first
///
/// Only positive finite values take part. Fewer than three of them, or zero
/// spread, yields no outliers.
pub fn detect_outliers(values: &[(String, f64)], threshold: f64) -> Vec<Outlier> {
    let kept: Vec<&(String, f64)> = values
        .iter()
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();
    if kept.len() < 3 {
        return Vec::new();
    }

    let n = kept.len() as f64;
    let mean = kept.iter().map(|(_, v)| v).sum::<f64>() / n;
    let variance = kept.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return Vec::new();
    }

    let mut outliers: Vec<Outlier> = kept
        .into_iter()
        .filter_map(|(id, value)| {
            let z = (value - mean) / stddev;
            (z.abs() >= threshold).then(|| Outlier {
                id: id.clone(),
                value: *value,
                z_score: z,
                direction: if z > 0.0 {
                    OutlierDirection::High
                } else {
                    OutlierDirection::Low
                },
            })
        })
        .collect();
    outliers.sort_by(|a, b| {
        b.z_score
            .abs()
            .total_cmp(&a.z_score.abs())
            .then_with(|| a.id.cmp(&b.id))
    });
    outliers
}
