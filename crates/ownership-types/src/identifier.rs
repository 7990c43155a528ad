//! Classified identifier references
//!
//! Historical data and URLs contain `<entityId>_<assetId>` composites. They are
//! carried as their own variant so call sites never pattern-match raw strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentifierRef {
    /// Canonical asset key
    Asset { id: String },
    /// Canonical entity key
    Entity { id: String },
    /// Legacy `<entity>_<asset>` composite
    Composite { entity_id: String, asset_id: String },
    /// Identity synthesised from a display name
    Derived { id: String },
    Unrecognized { raw: String },
}

impl IdentifierRef {
    /// Constituent canonical ids: composites split into entity then asset.
    /// Derived and unrecognized references have no canonical parts.
    pub fn decompose(&self) -> Vec<&str> {
        match self {
            Self::Asset { id } | Self::Entity { id } => vec![id.as_str()],
            Self::Composite {
                entity_id,
                asset_id,
            } => vec![entity_id.as_str(), asset_id.as_str()],
            Self::Derived { .. } | Self::Unrecognized { .. } => Vec::new(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Asset { .. } | Self::Entity { .. })
    }

    /// The id a caller should navigate to: the asset half of a composite
    pub fn primary_id(&self) -> Option<&str> {
        match self {
            Self::Asset { id } | Self::Entity { id } | Self::Derived { id } => Some(id),
            Self::Composite { asset_id, .. } => Some(asset_id),
            Self::Unrecognized { .. } => None,
        }
    }
}
