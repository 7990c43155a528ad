//! Rule-based anomaly flags for a single asset
//!
//! Each rule inspects an [`AssetProfile`] and yields at most one finding.
//! Findings are advisory; nothing here fails.

use std::collections::BTreeSet;

use ownership_types::{
    sort_by_severity, AnomalyFinding, AssetAttributes, NodeId, OwnershipGraph, OwnershipRecord,
    Severity,
};
use serde_json::json;

use crate::config::AnalyticsConfig;

/// What the rules know about one asset
#[derive(Debug, Clone, Default)]
pub struct AssetProfile {
    pub asset_id: NodeId,
    pub attributes: AssetAttributes,
    /// Shares of the direct owners, `None` where unknown
    pub owner_shares: Vec<Option<f64>>,
    /// Direct owner rows carrying an estimated share
    pub imputed_count: usize,
    /// Upward ownership graph of the asset
    pub graph: OwnershipGraph,
}

impl AssetProfile {
    /// Profile from the asset's direct owner rows and its upward graph
    ///
    /// Attributes are taken from the first row that populates each field.
    pub fn from_records(asset_id: &str, owner_rows: &[OwnershipRecord], graph: OwnershipGraph) -> Self {
        let mut attributes = AssetAttributes::default();
        for row in owner_rows {
            if attributes.status.is_none() {
                attributes.status = non_blank(&row.status);
            }
            if attributes.category.is_none() {
                attributes.category = non_blank(&row.category);
            }
            if attributes.country.is_none() {
                attributes.country = non_blank(&row.country);
            }
            if attributes.capacity.is_none() {
                attributes.capacity = row.capacity.filter(|c| c.is_finite());
            }
        }

        Self {
            asset_id: asset_id.to_string(),
            attributes,
            owner_shares: owner_rows.iter().map(|r| r.share_percent).collect(),
            imputed_count: owner_rows.iter().filter(|r| r.imputed).count(),
            graph,
        }
    }

    fn known_share_total(&self) -> Option<f64> {
        let known: Vec<f64> = self
            .owner_shares
            .iter()
            .flatten()
            .copied()
            .filter(|s| s.is_finite())
            .collect();
        (!known.is_empty()).then(|| known.iter().sum())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub struct AnomalyRules<'a> {
    config: &'a AnalyticsConfig,
}

impl<'a> AnomalyRules<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Every rule, most severe findings first
    pub fn evaluate_all(&self, profile: &AssetProfile) -> Vec<AnomalyFinding> {
        let mut findings: Vec<AnomalyFinding> = [
            self.incomplete_ownership(profile),
            self.overlapping_ownership(profile),
            self.complex_structure(profile),
            self.fragmented_ownership(profile),
            self.imputed_shares(profile),
            self.missing_fields(profile),
            self.limbo_status(profile),
        ]
        .into_iter()
        .flatten()
        .collect();
        sort_by_severity(&mut findings);

        if !findings.is_empty() {
            tracing::debug!(asset_id = %profile.asset_id, findings = findings.len(), "Anomaly rules flagged asset");
        }
        findings
    }

    /// Known shares add up to noticeably less than the whole
    pub fn incomplete_ownership(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let total = profile.known_share_total()?;
        (total < self.config.incomplete_below).then(|| {
            AnomalyFinding::new(
                "incomplete_ownership",
                Severity::Warning,
                format!("Known ownership sums to {:.1}%", total),
                json!({ "total_percent": total, "threshold": self.config.incomplete_below }),
            )
        })
    }

    /// Known shares add up to more than the whole, likely double counting
    pub fn overlapping_ownership(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let total = profile.known_share_total()?;
        (total > self.config.overlap_above).then(|| {
            AnomalyFinding::new(
                "overlapping_ownership",
                Severity::Critical,
                format!("Ownership sums to {:.1}%, exceeding 100%", total),
                json!({ "total_percent": total, "threshold": self.config.overlap_above }),
            )
        })
    }

    pub fn complex_structure(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let layers = profile.graph.max_depth()? + 1;
        (layers >= self.config.complex_depth).then(|| {
            AnomalyFinding::new(
                "complex_structure",
                Severity::Info,
                format!("Ownership chain is {} layers deep", layers),
                json!({ "chain_depth": layers, "threshold": self.config.complex_depth }),
            )
        })
    }

    /// Many distinct ultimate parents at the top of the structure
    pub fn fragmented_ownership(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let graph = &profile.graph;
        let deepest = graph.max_depth()?;
        let owned: BTreeSet<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
        let parents: BTreeSet<&str> = graph
            .edges
            .iter()
            .filter(|e| e.depth == deepest && !owned.contains(e.source.as_str()))
            .map(|e| e.source.as_str())
            .collect();

        (parents.len() > self.config.fragmented_parents).then(|| {
            AnomalyFinding::new(
                "fragmented_ownership",
                Severity::Warning,
                format!("{} distinct ultimate parents", parents.len()),
                json!({ "ultimate_parents": parents, "depth": deepest }),
            )
        })
    }

    pub fn imputed_shares(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        (profile.imputed_count > 0).then(|| {
            AnomalyFinding::new(
                "imputed_shares",
                Severity::Info,
                format!(
                    "{} ownership record(s) use estimated ownership values",
                    profile.imputed_count
                ),
                json!({ "imputed_count": profile.imputed_count }),
            )
        })
    }

    pub fn missing_fields(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let attrs = &profile.attributes;
        let missing: Vec<&str> = [
            ("status", attrs.status.is_none()),
            ("country", attrs.country.is_none()),
            ("category", attrs.category.is_none()),
            ("capacity", attrs.capacity.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        (!missing.is_empty()).then(|| {
            AnomalyFinding::new(
                "missing_fields",
                Severity::Warning,
                format!("Missing descriptive fields: {}", missing.join(", ")),
                json!({ "fields": missing }),
            )
        })
    }

    /// Shelved, mothballed or only inferred status
    pub fn limbo_status(&self, profile: &AssetProfile) -> Option<AnomalyFinding> {
        let status = profile.attributes.status.as_deref()?;
        let lowered = status.trim().to_lowercase();
        let marker = self.config.inferred_marker.to_lowercase();
        let limbo = self
            .config
            .limbo_statuses
            .iter()
            .any(|s| s.to_lowercase() == lowered)
            || (!marker.is_empty() && lowered.contains(&marker));

        limbo.then(|| {
            AnomalyFinding::new(
                "limbo_status",
                Severity::Warning,
                format!("Asset status '{}' indicates operational limbo", status),
                json!({ "status": status }),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ownership_types::GraphEdge;

    fn complete_attributes() -> AssetAttributes {
        AssetAttributes {
            status: Some("operating".into()),
            category: Some("wind".into()),
            country: Some("Spain".into()),
            capacity: Some(120.0),
        }
    }

    fn profile(shares: &[Option<f64>]) -> AssetProfile {
        let mut graph = OwnershipGraph::empty("G000001");
        graph.edges.push(GraphEdge::new("E000001", "G000001", Some(100.0), 0));
        AssetProfile {
            asset_id: "G000001".into(),
            attributes: complete_attributes(),
            owner_shares: shares.to_vec(),
            imputed_count: 0,
            graph,
        }
    }

    fn kinds(findings: &[AnomalyFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.kind.as_str()).collect()
    }

    #[test]
    fn test_clean_asset_has_no_findings() {
        let config = AnalyticsConfig::default();
        let rules = AnomalyRules::new(&config);
        assert!(rules.evaluate_all(&profile(&[Some(60.0), Some(40.0)])).is_empty());
    }

    #[test]
    fn test_share_total_thresholds() {
        let config = AnalyticsConfig::default();
        let rules = AnomalyRules::new(&config);

        let low = rules.evaluate_all(&profile(&[Some(50.0), Some(30.0), None]));
        assert_eq!(kinds(&low), vec!["incomplete_ownership"]);
        assert_eq!(low[0].severity, Severity::Warning);

        let high = rules.evaluate_all(&profile(&[Some(80.0), Some(30.0)]));
        assert_eq!(kinds(&high), vec!["overlapping_ownership"]);
        assert_eq!(high[0].severity, Severity::Critical);

        // within tolerance on both sides
        assert!(rules.evaluate_all(&profile(&[Some(90.0)])).is_empty());
        assert!(rules.evaluate_all(&profile(&[Some(105.0)])).is_empty());
        // nothing known, nothing to compare
        assert!(rules.evaluate_all(&profile(&[None, None])).is_empty());
    }

    #[test]
    fn test_complex_and_fragmented_structure() {
        let config = AnalyticsConfig::default();
        let rules = AnomalyRules::new(&config);
        let mut p = profile(&[Some(100.0)]);
        p.graph.edges = vec![
            GraphEdge::new("E1", "G000001", Some(100.0), 0),
            GraphEdge::new("E2", "E1", Some(100.0), 1),
            GraphEdge::new("E3", "E2", Some(100.0), 2),
            GraphEdge::new("E4", "E3", Some(100.0), 3),
            GraphEdge::new("P1", "E4", Some(25.0), 4),
            GraphEdge::new("P2", "E4", Some(25.0), 4),
            GraphEdge::new("P3", "E4", Some(25.0), 4),
            GraphEdge::new("P4", "E4", Some(25.0), 4),
        ];
        let findings = rules.evaluate_all(&p);
        assert_eq!(kinds(&findings), vec!["fragmented_ownership", "complex_structure"]);
        assert_eq!(findings[1].evidence["chain_depth"], 5);

        p.graph.edges.pop();
        assert_eq!(kinds(&rules.evaluate_all(&p)), vec!["complex_structure"]);
    }

    #[test]
    fn test_descriptive_rules_sorted_by_severity() {
        let config = AnalyticsConfig::default();
        let rules = AnomalyRules::new(&config);
        let mut p = profile(&[Some(70.0), Some(50.0)]);
        p.imputed_count = 1;
        p.attributes.capacity = None;
        p.attributes.status = Some("Mothballed".into());

        let findings = rules.evaluate_all(&p);
        assert_eq!(findings[0].kind, "overlapping_ownership");
        assert_eq!(findings.last().unwrap().kind, "imputed_shares");
        assert!(findings.last().unwrap().message.contains("estimated ownership values"));
        assert!(kinds(&findings).contains(&"missing_fields"));
        assert!(kinds(&findings).contains(&"limbo_status"));
        let missing = findings.iter().find(|f| f.kind == "missing_fields").unwrap();
        assert_eq!(missing.evidence["fields"], json!(["capacity"]));
    }

    #[test]
    fn test_inferred_status_is_limbo() {
        let config = AnalyticsConfig::default();
        let rules = AnomalyRules::new(&config);
        let mut p = profile(&[Some(100.0)]);
        p.attributes.status = Some("operating (inferred)".into());
        assert!(rules.limbo_status(&p).is_some());
        p.attributes.status = Some("operating".into());
        assert!(rules.limbo_status(&p).is_none());
    }

    #[test]
    fn test_profile_from_records() {
        let rows = vec![
            OwnershipRecord {
                status: Some("  ".into()),
                imputed: true,
                ..OwnershipRecord::new("G000001", "Plant", "A").with_share(50.0)
            },
            OwnershipRecord {
                status: Some("operating".into()),
                country: Some("Chile".into()),
                capacity: Some(10.0),
                ..OwnershipRecord::new("G000001", "Plant", "B")
            },
        ];
        let p = AssetProfile::from_records("G000001", &rows, OwnershipGraph::empty("G000001"));
        assert_eq!(p.attributes.status.as_deref(), Some("operating"));
        assert_eq!(p.attributes.category, None);
        assert_eq!(p.owner_shares, vec![Some(50.0), None]);
        assert_eq!(p.imputed_count, 1);
        assert_eq!(p.known_share_total(), Some(50.0));
    }
}
