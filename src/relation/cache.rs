//! Per-request relation cache
//!
//! Walks revisit shared ancestors on every branch that reaches them. Wrapping
//! the relation in a `CachedRelation` for the duration of one query means each
//! id is fetched once. The cache is an explicit object owned by the caller, so
//! concurrent queries never share state. Failed lookups are not cached.

use std::collections::HashMap;

use async_trait::async_trait;
use ownership_types::{NodeId, OwnershipRecord};
use tokio::sync::Mutex;

use super::OwnershipRelation;
use crate::error::RelationError;

pub struct CachedRelation<'a, R: OwnershipRelation + ?Sized> {
    inner: &'a R,
    owners: Mutex<HashMap<NodeId, Vec<OwnershipRecord>>>,
    holdings: Mutex<HashMap<NodeId, Vec<OwnershipRecord>>>,
}

impl<'a, R: OwnershipRelation + ?Sized> CachedRelation<'a, R> {
    pub fn new(inner: &'a R) -> Self {
        Self {
            inner,
            owners: Mutex::new(HashMap::new()),
            holdings: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached `(owners, holdings)` lookups
    pub async fn cached_entries(&self) -> (usize, usize) {
        (self.owners.lock().await.len(), self.holdings.lock().await.len())
    }
}

async fn cached_lookup<F, Fut>(
    cache: &Mutex<HashMap<NodeId, Vec<OwnershipRecord>>>,
    key: &str,
    fetch: F,
) -> Result<Vec<OwnershipRecord>, RelationError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<OwnershipRecord>, RelationError>>,
{
    if let Some(rows) = cache.lock().await.get(key) {
        return Ok(rows.clone());
    }
    // Lock is not held across the fetch
    let rows = fetch().await?;
    cache.lock().await.insert(key.to_string(), rows.clone());
    Ok(rows)
}

#[async_trait]
impl<'a, R: OwnershipRelation + ?Sized> OwnershipRelation for CachedRelation<'a, R> {
    async fn owners_of(&self, subject_id: &str) -> Result<Vec<OwnershipRecord>, RelationError> {
        cached_lookup(&self.owners, subject_id, || self.inner.owners_of(subject_id)).await
    }

    async fn holdings_of(&self, owner_id: &str) -> Result<Vec<OwnershipRecord>, RelationError> {
        cached_lookup(&self.holdings, owner_id, || self.inner.holdings_of(owner_id)).await
    }
}
