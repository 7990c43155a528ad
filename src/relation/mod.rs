//! Ownership relation access
//!
//! The engine needs three access patterns from whatever stores the records:
//! lookup by subject id, lookup by owner id, and batch lookups over a set of
//! ids. Any backend (database, columnar file, HTTP API) can sit behind the
//! `OwnershipRelation` trait.
//!
//! - `InMemoryRelation` - indexed record set, used by the CLI and tests
//! - `CachedRelation` - per-request memo over another relation

pub mod cache;
pub mod memory;

use async_trait::async_trait;
use ownership_types::{NodeId, OwnershipRecord};

use crate::error::RelationError;

pub use cache::CachedRelation;
pub use memory::InMemoryRelation;

/// Read access to ownership records
///
/// Implementations must be Send + Sync so walks can fetch branches concurrently.
#[async_trait]
pub trait OwnershipRelation: Send + Sync {
    /// Rows whose subject is `subject_id`, i.e. its direct owners
    async fn owners_of(&self, subject_id: &str) -> Result<Vec<OwnershipRecord>, RelationError>;

    /// Rows whose owner is `owner_id`, i.e. its direct holdings
    async fn holdings_of(&self, owner_id: &str) -> Result<Vec<OwnershipRecord>, RelationError>;

    /// Rows whose subject is any of `subject_ids`
    ///
    /// Defaults to one point lookup per id; backends with a native `IN`
    /// query should override it.
    async fn owners_of_any(
        &self,
        subject_ids: &[NodeId],
    ) -> Result<Vec<OwnershipRecord>, RelationError> {
        let mut rows = Vec::new();
        for id in subject_ids {
            rows.extend(self.owners_of(id).await?);
        }
        Ok(rows)
    }

    /// Rows whose owner is any of `owner_ids`
    async fn holdings_of_any(
        &self,
        owner_ids: &[NodeId],
    ) -> Result<Vec<OwnershipRecord>, RelationError> {
        let mut rows = Vec::new();
        for id in owner_ids {
            rows.extend(self.holdings_of(id).await?);
        }
        Ok(rows)
    }
}
