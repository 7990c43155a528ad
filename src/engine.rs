//! Query facade over an ownership relation
//!
//! `OwnershipEngine` owns the relation handle, the identity resolver and the
//! configuration. Each query wraps the relation in a fresh [`CachedRelation`]
//! so repeated lookups within the query hit memory and nothing is shared
//! between queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use ownership_types::{AnomalyFinding, NodeId, OwnershipGraph, OwnershipRecord, Portfolio};
use tokio::sync::watch;

use crate::analytics::{
    self, AnomalyRules, AssetOwnershipMetrics, AssetProfile, CoInvestmentPair, PortfolioMetrics,
};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::GraphBuilder;
use crate::identity::IdentityResolver;
use crate::portfolio::PortfolioAggregator;
use crate::relation::{CachedRelation, OwnershipRelation};
use crate::traversal::{ultimate_owners, RelationTraversal, TraversalResult, UltimateOwner};

pub struct OwnershipEngine<R: OwnershipRelation + ?Sized> {
    relation: Arc<R>,
    config: EngineConfig,
    resolver: IdentityResolver,
    cancel: Option<watch::Receiver<bool>>,
}

impl<R: OwnershipRelation + ?Sized> Clone for OwnershipEngine<R> {
    fn clone(&self) -> Self {
        Self {
            relation: Arc::clone(&self.relation),
            config: self.config.clone(),
            resolver: self.resolver.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R: OwnershipRelation + ?Sized> OwnershipEngine<R> {
    pub fn new(relation: Arc<R>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let resolver = IdentityResolver::new(config.identity.clone());
        Ok(Self {
            relation,
            config,
            resolver,
            cancel: None,
        })
    }

    /// Walks started by this engine stop once `cancel` reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    fn traversal<'q, Q: OwnershipRelation + ?Sized>(&'q self, relation: &'q Q) -> RelationTraversal<'q, Q> {
        let traversal = RelationTraversal::new(relation, &self.resolver, self.config.traversal.clone());
        match &self.cancel {
            Some(cancel) => traversal.with_cancellation(cancel.clone()),
            None => traversal,
        }
    }

    /// Upward walk from an asset to its ultimate owners
    pub async fn asset_graph(&self, asset_id: &str) -> TraversalResult {
        let cached = CachedRelation::new(self.relation.as_ref());
        let result = self.traversal(&cached).traverse_up(asset_id).await;
        log_partial(&result);
        result
    }

    pub async fn ultimate_owners(&self, asset_id: &str) -> Vec<UltimateOwner> {
        ultimate_owners(&self.asset_graph(asset_id).await)
    }

    /// Graph assembled from the ownership path strings on the asset's rows
    pub async fn asset_graph_from_paths(&self, asset_id: &str) -> Result<OwnershipGraph> {
        let asset_id = asset_id.trim();
        let rows = self.relation.owners_of(asset_id).await?;
        let asset_name = rows
            .iter()
            .map(|r| r.subject_name.trim())
            .find(|n| !n.is_empty())
            .unwrap_or(asset_id);

        let mut builder = GraphBuilder::new(&self.resolver, asset_id, asset_name);
        builder.add_records(&rows);
        Ok(builder.build())
    }

    /// Downward walk from an entity, attributed into a portfolio
    pub async fn entity_portfolio(&self, entity_id: &str) -> Portfolio {
        let cached = CachedRelation::new(self.relation.as_ref());
        let result = self.traversal(&cached).traverse_down(entity_id).await;
        log_partial(&result);
        PortfolioAggregator::aggregate(&result)
    }

    pub async fn asset_anomalies(&self, asset_id: &str) -> Result<Vec<AnomalyFinding>> {
        let asset_id = asset_id.trim();
        let cached = CachedRelation::new(self.relation.as_ref());
        let rows = cached.owners_of(asset_id).await?;
        let result = self.traversal(&cached).traverse_up(asset_id).await;
        log_partial(&result);

        let profile = AssetProfile::from_records(asset_id, &rows, result.into_graph());
        Ok(AnomalyRules::new(&self.config.analytics).evaluate_all(&profile))
    }

    pub async fn portfolio_metrics(&self, entity_id: &str) -> PortfolioMetrics {
        let portfolio = self.entity_portfolio(entity_id).await;
        analytics::portfolio_metrics(&portfolio, &self.config.analytics)
    }

    pub async fn asset_ownership_metrics(&self, asset_id: &str) -> Result<AssetOwnershipMetrics> {
        let rows = self.relation.owners_of(asset_id.trim()).await?;
        Ok(analytics::asset_ownership_metrics(&rows, &self.config.analytics))
    }

    /// Owner pairs that appear together most often across `asset_ids`
    pub async fn co_investment(&self, asset_ids: &[NodeId], top_n: usize) -> Result<Vec<CoInvestmentPair>> {
        let rows = self.relation.owners_of_any(asset_ids).await?;
        Ok(analytics::co_investment_pairs(&self.owners_by_asset(&rows), top_n))
    }

    fn owners_by_asset(&self, rows: &[OwnershipRecord]) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut grouped: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for row in rows {
            let owner = match row.owner_key() {
                Some(id) => id.to_string(),
                None if !row.owner_name.trim().is_empty() => self.resolver.derive(row.owner_name.trim()),
                None => continue,
            };
            grouped
                .entry(row.subject_id.trim().to_string())
                .or_default()
                .push(owner);
        }
        grouped
    }
}

fn log_partial(result: &TraversalResult) {
    if result.is_partial() {
        tracing::info!(
            root = %result.root,
            truncated = result.truncated,
            cancelled = result.cancelled,
            failed_fetches = result.failed_fetches,
            "Returning partial ownership result"
        );
    }
}
