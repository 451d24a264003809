//! # dr-db-memory
//!
//! Process-local implementation of the storage ports, used by tests and by
//! `--features db-memory` demo builds. Rows are kept as JSON objects in
//! insertion order, which is also creation order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dr_core::{
    AnalyticsBenchmark, AnalyticsRepo, BenchmarkRepo, HubEventStats, HubRatingStats, OnDelete,
    ParentFilter, PeriodCount, RagBenchmark, RatingCount, RecordStore, TableDef, Values, TABLES,
};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<&'static str, Vec<Row>>,
    rag_runs: DashMap<Uuid, RagBenchmark>,
    analytics_runs: DashMap<Uuid, AnalyticsBenchmark>,
}

fn uuid_of(row: &Row, column: &str) -> Option<Uuid> {
    row.get(column)?.as_str()?.parse().ok()
}

fn owned_by(row: &Row, owner: Uuid) -> bool {
    uuid_of(row, "user_id") == Some(owner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rag_run(&self, id: Uuid) -> Option<RagBenchmark> {
        self.rag_runs.get(&id).map(|run| run.clone())
    }

    pub fn analytics_run(&self, id: Uuid) -> Option<AnalyticsBenchmark> {
        self.analytics_runs.get(&id).map(|run| run.clone())
    }

    /// Copies a table out so no shard lock is held while joining.
    fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.get(table).map(|rows| rows.clone()).unwrap_or_default()
    }

    fn exists(&self, table: &str, id: Uuid) -> bool {
        self.tables
            .get(table)
            .is_some_and(|rows| rows.iter().any(|row| uuid_of(row, "id") == Some(id)))
    }

    fn check_references(&self, table: &TableDef, values: &Values) -> anyhow::Result<()> {
        for rel in table.relations {
            let Some(parent) = values.get(rel.column).and_then(|v| v.as_uuid()) else {
                continue;
            };
            if !self.exists(rel.table, parent) {
                anyhow::bail!(
                    "insert or update on table \"{}\" violates foreign key on \"{}\"",
                    table.name,
                    rel.column
                );
            }
        }
        Ok(())
    }

    /// Applies each child relation's delete rule, the way the Postgres foreign
    /// keys do. Shard guards are released before recursing.
    fn remove_children(&self, parent: &str, id: Uuid) {
        for child in TABLES {
            for rel in child.children_of(parent) {
                let removed: Vec<Uuid> = match self.tables.get_mut(child.name) {
                    Some(mut rows) => match rel.on_delete {
                        OnDelete::Cascade => {
                            let mut removed = Vec::new();
                            rows.retain(|row| {
                                if uuid_of(row, rel.column) != Some(id) {
                                    return true;
                                }
                                removed.extend(uuid_of(row, "id"));
                                false
                            });
                            removed
                        }
                        OnDelete::SetNull => {
                            for row in rows.iter_mut().filter(|row| uuid_of(row, rel.column) == Some(id)) {
                                row.insert(rel.column.to_string(), Value::Null);
                            }
                            Vec::new()
                        }
                    },
                    None => Vec::new(),
                };
                if !removed.is_empty() {
                    debug!(table = child.name, rows = removed.len(), "cascaded delete");
                }
                for child_id in removed {
                    self.remove_children(child.name, child_id);
                }
            }
        }
    }

    fn with_labels(&self, table: &TableDef, mut row: Row) -> Value {
        for rel in table.relations {
            let label = uuid_of(&row, rel.column)
                .and_then(|parent| {
                    self.tables.get(rel.table).and_then(|rows| {
                        rows.iter()
                            .find(|r| uuid_of(r, "id") == Some(parent))
                            .and_then(|r| r.get(rel.display).cloned())
                    })
                })
                .unwrap_or(Value::Null);
            row.insert(rel.alias.to_string(), label);
        }
        Value::Object(row)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: &TableDef, owner: Uuid, values: &Values) -> anyhow::Result<Uuid> {
        self.check_references(table, values)?;

        let id = Uuid::now_v7();
        let now = Value::String(Utc::now().to_rfc3339());
        let mut row = values.to_json();
        row.insert("id".into(), Value::String(id.to_string()));
        row.insert("user_id".into(), Value::String(owner.to_string()));
        row.insert("created_at".into(), now.clone());
        row.insert("updated_at".into(), now);

        self.tables.entry(table.name).or_default().push(row);
        debug!(table = table.name, %id, "row inserted");
        Ok(id)
    }

    async fn update(
        &self,
        table: &TableDef,
        owner: Uuid,
        id: Uuid,
        values: &Values,
    ) -> anyhow::Result<bool> {
        self.check_references(table, values)?;

        let Some(mut rows) = self.tables.get_mut(table.name) else {
            return Ok(false);
        };
        let Some(row) = rows
            .iter_mut()
            .find(|row| uuid_of(row, "id") == Some(id) && owned_by(row, owner))
        else {
            return Ok(false);
        };
        row.extend(values.to_json());
        row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        Ok(true)
    }

    async fn delete(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let Some(mut rows) = self.tables.get_mut(table.name) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !(uuid_of(row, "id") == Some(id) && owned_by(row, owner)));
        let deleted = rows.len() < before;
        drop(rows);

        if deleted {
            self.remove_children(table.name, id);
        }
        Ok(deleted)
    }

    async fn find(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Value>> {
        let row = self
            .rows(table.name)
            .into_iter()
            .find(|row| uuid_of(row, "id") == Some(id) && owned_by(row, owner));
        Ok(row.map(|row| self.with_labels(table, row)))
    }

    async fn list(
        &self,
        table: &TableDef,
        owner: Uuid,
        filter: Option<ParentFilter>,
    ) -> anyhow::Result<Vec<Value>> {
        Ok(self
            .rows(table.name)
            .into_iter()
            .filter(|row| owned_by(row, owner))
            .filter(|row| filter.map_or(true, |f| uuid_of(row, f.column) == Some(f.id)))
            .map(|row| self.with_labels(table, row))
            .collect())
    }
}

fn rating(row: &Row) -> Option<i32> {
    row.get("rating")?.as_i64().and_then(|r| i32::try_from(r).ok())
}

#[async_trait]
impl AnalyticsRepo for MemoryStore {
    async fn hub_rating_stats(&self, category: Option<String>) -> anyhow::Result<Vec<HubRatingStats>> {
        let reviews = self.rows("reviews");
        let mut stats: Vec<HubRatingStats> = self
            .rows("hubs")
            .iter()
            .filter(|hub| category.as_deref().map_or(true, |c| hub.get("category").and_then(Value::as_str) == Some(c)))
            .filter_map(|hub| {
                let hub_id = uuid_of(hub, "id")?;
                let ratings: Vec<i32> = reviews
                    .iter()
                    .filter(|r| uuid_of(r, "hub_id") == Some(hub_id))
                    .filter_map(rating)
                    .collect();
                let review_count = ratings.len() as i64;
                let avg_rating = if ratings.is_empty() {
                    0.0
                } else {
                    f64::from(ratings.iter().sum::<i32>()) / ratings.len() as f64
                };
                Some(HubRatingStats {
                    hub_id,
                    hub_name: hub.get("name")?.as_str()?.to_string(),
                    category: hub.get("category")?.as_str()?.to_string(),
                    member_count: hub
                        .get("member_count")
                        .and_then(Value::as_i64)
                        .and_then(|m| i32::try_from(m).ok()),
                    review_count,
                    avg_rating,
                })
            })
            .collect();
        stats.sort_by(|a, b| a.hub_name.cmp(&b.hub_name));
        Ok(stats)
    }

    async fn rating_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<RatingCount>> {
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for review in self.rows("reviews") {
            if hub_id.is_some_and(|id| uuid_of(&review, "hub_id") != Some(id)) {
                continue;
            }
            if let Some(r) = rating(&review) {
                *counts.entry(r).or_default() += 1;
            }
        }
        Ok(counts.into_iter().map(|(rating, count)| RatingCount { rating, count }).collect())
    }

    async fn monthly_review_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<PeriodCount>> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for review in self.rows("reviews") {
            if hub_id.is_some_and(|id| uuid_of(&review, "hub_id") != Some(id)) {
                continue;
            }
            let created = review
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            if let Some(created) = created {
                *counts.entry(created.format("%Y-%m").to_string()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().map(|(period, count)| PeriodCount { period, count }).collect())
    }

    async fn hub_event_stats(&self) -> anyhow::Result<Vec<HubEventStats>> {
        let now = Utc::now();
        let events = self.rows("events");
        let mut stats: Vec<HubEventStats> = self
            .rows("hubs")
            .iter()
            .filter_map(|hub| {
                let hub_id = uuid_of(hub, "id")?;
                let starts: Vec<Option<DateTime<Utc>>> = events
                    .iter()
                    .filter(|e| uuid_of(e, "hub_id") == Some(hub_id))
                    .map(|e| {
                        e.get("starts_at")
                            .and_then(Value::as_str)
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|t| t.with_timezone(&Utc))
                    })
                    .collect();
                Some(HubEventStats {
                    hub_id,
                    hub_name: hub.get("name")?.as_str()?.to_string(),
                    total: starts.len() as i64,
                    upcoming: starts.iter().filter(|s| s.is_some_and(|t| t > now)).count() as i64,
                })
            })
            .collect();
        stats.sort_by(|a, b| a.hub_name.cmp(&b.hub_name));
        Ok(stats)
    }
}

#[async_trait]
impl BenchmarkRepo for MemoryStore {
    async fn save_rag(&self, run: &RagBenchmark) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        self.rag_runs.insert(id, run.clone());
        Ok(id)
    }

    async fn save_analytics(&self, run: &AnalyticsBenchmark) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        self.analytics_runs.insert(id, run.clone());
        Ok(id)
    }
}
