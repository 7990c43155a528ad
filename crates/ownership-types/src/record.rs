//! Ownership relation rows
//!
//! Source rows carry many optional, loosely-typed columns. The fields the
//! engine depends on are typed; everything else lands in `extra`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{AssetAttributes, NodeKind};

/// One row relating a subject (asset or entity) to an interested party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OwnershipRecord {
    pub subject_id: String,
    pub subject_name: String,
    /// Explicit kind hint from the source; identifier classification is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub owner_name: String,
    /// Share of the subject held by the owner (0-100). `None` = unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_percent: Option<f64>,
    /// Full chain from ultimate parent to subject, e.g. `"A [50%] -> B [100%] -> Plant"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Capacity in MW
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    /// Share was estimated rather than sourced
    #[serde(default)]
    pub imputed: bool,
    /// Source columns the engine does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl OwnershipRecord {
    /// Minimal record for a direct ownership link.
    pub fn new(
        subject_id: impl Into<String>,
        subject_name: impl Into<String>,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject_name: subject_name.into(),
            owner_name: owner_name.into(),
            ..Default::default()
        }
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_share(mut self, share_percent: f64) -> Self {
        self.share_percent = Some(share_percent);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.ownership_path = Some(path.into());
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.subject_kind = Some(kind);
        self
    }

    /// Owner id if one is present and not blank
    pub fn owner_key(&self) -> Option<&str> {
        self.owner_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Descriptive fields of the subject, if any are populated
    pub fn subject_attributes(&self) -> Option<AssetAttributes> {
        let attrs = AssetAttributes {
            status: self.status.clone(),
            category: self.category.clone(),
            country: self.country.clone(),
            capacity: self.capacity,
        };
        (!attrs.is_empty()).then_some(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_columns_flattened() {
        let json = r#"{
            "subject_id": "G100000000001",
            "subject_name": "Plant",
            "owner_name": "Owner Co",
            "share_percent": 40.0,
            "start_year": 1998,
            "source_url": "https://example.org"
        }"#;
        let record: OwnershipRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.share_percent, Some(40.0));
        assert!(!record.imputed);
        assert_eq!(record.extra.get("start_year"), Some(&serde_json::json!(1998)));
        assert_eq!(record.extra.len(), 2);
    }

    #[test]
    fn test_owner_key_ignores_blank() {
        let record = OwnershipRecord::new("G1", "Plant", "Owner").with_owner_id("  ");
        assert_eq!(record.owner_key(), None);
        let record = record.with_owner_id(" E100000000002 ");
        assert_eq!(record.owner_key(), Some("E100000000002"));
    }

    #[test]
    fn test_subject_attributes() {
        let mut record = OwnershipRecord::new("G1", "Plant", "Owner");
        assert!(record.subject_attributes().is_none());
        record.country = Some("Chile".into());
        let attrs = record.subject_attributes().unwrap();
        assert_eq!(attrs.country.as_deref(), Some("Chile"));
    }
}
