//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{ParentFilter, TableDef};
use crate::error::Result;
use crate::models::{
    AnalyticsBenchmark, HubEventStats, HubRatingStats, PeriodCount, RagBenchmark, RatingCount,
    Session,
};
use crate::schema::Values;

/// Row persistence for every entity table.
///
/// Rows cross this boundary as JSON objects so one adapter serves all
/// entities; typed access lives in the services layer. Every statement is
/// scoped to the owning user.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts one row and returns its new id.
    async fn insert(&self, table: &TableDef, owner: Uuid, values: &Values) -> anyhow::Result<Uuid>;

    /// Returns `false` when no row with `id` belongs to `owner`.
    async fn update(
        &self,
        table: &TableDef,
        owner: Uuid,
        id: Uuid,
        values: &Values,
    ) -> anyhow::Result<bool>;

    /// Returns `false` when no row with `id` belongs to `owner`.
    async fn delete(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;

    /// Fetches one row with its relation labels resolved.
    async fn find(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Value>>;

    /// Lists rows oldest first, relation labels resolved.
    async fn list(
        &self,
        table: &TableDef,
        owner: Uuid,
        filter: Option<ParentFilter>,
    ) -> anyhow::Result<Vec<Value>>;
}

/// Read-only aggregate queries backing the analytics tools.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    /// Review count and mean rating for every hub, including hubs without reviews.
    async fn hub_rating_stats(&self, category: Option<String>) -> anyhow::Result<Vec<HubRatingStats>>;

    /// Number of reviews per star rating, only ratings that occur.
    async fn rating_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<RatingCount>>;

    /// Reviews per calendar month, oldest first.
    async fn monthly_review_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<PeriodCount>>;

    /// Total and upcoming events per hub.
    async fn hub_event_stats(&self) -> anyhow::Result<Vec<HubEventStats>>;
}

/// Storage for benchmark runs submitted by the evaluation harness.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BenchmarkRepo: Send + Sync {
    /// Stores the run and its chunks.
    async fn save_rag(&self, run: &RagBenchmark) -> anyhow::Result<Uuid>;
    async fn save_analytics(&self, run: &AnalyticsBenchmark) -> anyhow::Result<Uuid>;
}

/// Identity contract. Sessions are issued elsewhere; we only verify them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Session>;
}
