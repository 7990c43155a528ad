//! In-memory ownership relation

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use ownership_types::{NodeId, OwnershipRecord};

use super::OwnershipRelation;
use crate::error::RelationError;
use crate::identity::IdentityResolver;

/// Record set indexed by subject and owner id
#[derive(Debug, Clone, Default)]
pub struct InMemoryRelation {
    records: Vec<OwnershipRecord>,
    by_subject: HashMap<NodeId, Vec<usize>>,
    by_owner: HashMap<NodeId, Vec<usize>>,
}

impl InMemoryRelation {
    /// Index `records`. Rows without a subject id are skipped; a missing
    /// owner id is filled with the derived identity of the owner name.
    pub fn new(records: Vec<OwnershipRecord>, resolver: &IdentityResolver) -> Self {
        let mut relation = Self::default();

        for mut record in records {
            if record.subject_id.trim().is_empty() {
                tracing::warn!(
                    subject_name = %record.subject_name,
                    owner_name = %record.owner_name,
                    "Ownership record has no subject id, skipping"
                );
                continue;
            }
            if record.owner_key().is_none() {
                if record.owner_name.trim().is_empty() {
                    tracing::warn!(
                        subject_id = %record.subject_id,
                        "Ownership record has neither owner id nor owner name, skipping"
                    );
                    continue;
                }
                record.owner_id = Some(resolver.derive(record.owner_name.trim()));
            }

            let subject = record.subject_id.trim().to_string();
            let owner = record.owner_key().unwrap_or_default().to_string();
            record.subject_id = subject.clone();
            record.owner_id = Some(owner.clone());

            let idx = relation.records.len();
            relation.records.push(record);
            relation.by_subject.entry(subject).or_default().push(idx);
            relation.by_owner.entry(owner).or_default().push(idx);
        }

        tracing::debug!(
            records = relation.records.len(),
            subjects = relation.by_subject.len(),
            owners = relation.by_owner.len(),
            "Indexed ownership relation"
        );
        relation
    }

    pub fn from_json_str(json: &str, resolver: &IdentityResolver) -> Result<Self, RelationError> {
        let records: Vec<OwnershipRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records, resolver))
    }

    /// Load a JSON array of records
    pub fn from_json_file(
        path: impl AsRef<Path>,
        resolver: &IdentityResolver,
    ) -> Result<Self, RelationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RelationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text, resolver)
    }

    pub fn records(&self) -> &[OwnershipRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rows(&self, index: &HashMap<NodeId, Vec<usize>>, key: &str) -> Vec<OwnershipRecord> {
        index
            .get(key.trim())
            .map(|rows| rows.iter().map(|&i| self.records[i].clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OwnershipRelation for InMemoryRelation {
    async fn owners_of(&self, subject_id: &str) -> Result<Vec<OwnershipRecord>, RelationError> {
        Ok(self.rows(&self.by_subject, subject_id))
    }

    async fn holdings_of(&self, owner_id: &str) -> Result<Vec<OwnershipRecord>, RelationError> {
        Ok(self.rows(&self.by_owner, owner_id))
    }
}
