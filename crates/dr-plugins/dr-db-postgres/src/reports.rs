//! Aggregate queries and benchmark storage.

use async_trait::async_trait;
use dr_core::{
    AnalyticsBenchmark, AnalyticsRepo, BenchmarkRepo, HubEventStats, HubRatingStats, PeriodCount,
    RagBenchmark, RatingCount,
};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::PgStore;

#[async_trait]
impl AnalyticsRepo for PgStore {
    async fn hub_rating_stats(&self, category: Option<String>) -> anyhow::Result<Vec<HubRatingStats>> {
        let rows = sqlx::query(
            "SELECT h.id, h.name, h.category, h.member_count, \
                    COUNT(r.id) AS review_count, \
                    COALESCE(AVG(r.rating), 0)::float8 AS avg_rating \
             FROM hubs h LEFT JOIN reviews r ON r.hub_id = h.id \
             WHERE ($1::text IS NULL OR h.category = $1) \
             GROUP BY h.id \
             ORDER BY h.name",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HubRatingStats {
                hub_id: row.get("id"),
                hub_name: row.get("name"),
                category: row.get("category"),
                member_count: row.get("member_count"),
                review_count: row.get("review_count"),
                avg_rating: row.get("avg_rating"),
            })
            .collect())
    }

    async fn rating_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<RatingCount>> {
        let rows = sqlx::query(
            "SELECT rating, COUNT(*) AS count FROM reviews \
             WHERE ($1::uuid IS NULL OR hub_id = $1) \
             GROUP BY rating ORDER BY rating",
        )
        .bind(hub_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RatingCount { rating: row.get("rating"), count: row.get("count") })
            .collect())
    }

    async fn monthly_review_counts(&self, hub_id: Option<Uuid>) -> anyhow::Result<Vec<PeriodCount>> {
        let rows = sqlx::query(
            "SELECT to_char(date_trunc('month', created_at), 'YYYY-MM') AS period, COUNT(*) AS count \
             FROM reviews \
             WHERE ($1::uuid IS NULL OR hub_id = $1) \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(hub_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PeriodCount { period: row.get("period"), count: row.get("count") })
            .collect())
    }

    async fn hub_event_stats(&self) -> anyhow::Result<Vec<HubEventStats>> {
        let rows = sqlx::query(
            "SELECT h.id, h.name, COUNT(e.id) AS total, \
                    COUNT(e.id) FILTER (WHERE e.starts_at > now()) AS upcoming \
             FROM hubs h LEFT JOIN events e ON e.hub_id = h.id \
             GROUP BY h.id \
             ORDER BY h.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HubEventStats {
                hub_id: row.get("id"),
                hub_name: row.get("name"),
                total: row.get("total"),
                upcoming: row.get("upcoming"),
            })
            .collect())
    }
}

#[async_trait]
impl BenchmarkRepo for PgStore {
    /// The run and its chunks commit together; a failed chunk leaves no
    /// half-recorded run behind.
    async fn save_rag(&self, run: &RagBenchmark) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rag_benchmarks (id, query, response, model, latency_ms) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&run.query)
        .bind(&run.response)
        .bind(&run.model)
        .bind(run.latency_ms)
        .execute(&mut *tx)
        .await?;

        for (position, chunk) in run.chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO rag_benchmark_chunks (id, benchmark_id, position, content, similarity, source) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::now_v7())
            .bind(id)
            .bind(i32::try_from(position)?)
            .bind(&chunk.content)
            .bind(chunk.similarity)
            .bind(&chunk.source)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%id, chunks = run.chunks.len(), "rag benchmark stored");
        Ok(id)
    }

    async fn save_analytics(&self, run: &AnalyticsBenchmark) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO analytics_benchmarks (id, query, response, model, latency_ms, metric, tool_calls) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(&run.query)
        .bind(&run.response)
        .bind(&run.model)
        .bind(run.latency_ms)
        .bind(&run.metric)
        .bind(&run.tool_calls)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}
