//! Persistence of evaluation runs posted by the benchmark harness.

use std::sync::Arc;

use dr_core::{AppError, BenchmarkRepo, BenchmarkRun, Result};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct BenchmarkService {
    repo: Arc<dyn BenchmarkRepo>,
}

impl BenchmarkService {
    pub fn new(repo: Arc<dyn BenchmarkRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip_all)]
    pub async fn record(&self, run: &BenchmarkRun) -> Result<Uuid> {
        validate(run)?;
        let id = match run {
            BenchmarkRun::Rag(rag) => self.repo.save_rag(rag).await?,
            BenchmarkRun::Analytics(analytics) => self.repo.save_analytics(analytics).await?,
        };
        info!(%id, kind = kind(run), "benchmark stored");
        Ok(id)
    }
}

fn kind(run: &BenchmarkRun) -> &'static str {
    match run {
        BenchmarkRun::Rag(_) => "rag",
        BenchmarkRun::Analytics(_) => "analytics",
    }
}

fn validate(run: &BenchmarkRun) -> Result<()> {
    let (query, latency_ms) = match run {
        BenchmarkRun::Rag(r) => (&r.query, r.latency_ms),
        BenchmarkRun::Analytics(a) => (&a.query, a.latency_ms),
    };
    if query.trim().is_empty() {
        return Err(AppError::ValidationError("query must not be empty".into()));
    }
    if latency_ms < 0 {
        return Err(AppError::ValidationError("latency_ms must not be negative".into()));
    }
    if let BenchmarkRun::Rag(rag) = run {
        if let Some(chunk) = rag.chunks.iter().find(|c| !(0.0..=1.0).contains(&c.similarity)) {
            return Err(AppError::ValidationError(format!(
                "chunk similarity {} is outside 0..=1",
                chunk.similarity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::{AnalyticsBenchmark, BenchmarkChunk, MockBenchmarkRepo, RagBenchmark};
    use serde_json::json;

    fn rag(similarity: f64) -> BenchmarkRun {
        BenchmarkRun::Rag(RagBenchmark {
            query: "Which hubs in Penang have day passes?".into(),
            response: "Two of them.".into(),
            model: "gpt-4o-mini".into(),
            latency_ms: 640,
            chunks: vec![BenchmarkChunk { content: "Day pass RM30".into(), similarity, source: None }],
        })
    }

    #[tokio::test]
    async fn rag_runs_go_to_rag_storage() {
        let id = Uuid::now_v7();
        let mut repo = MockBenchmarkRepo::new();
        repo.expect_save_rag()
            .withf(|run| run.chunks.len() == 1)
            .times(1)
            .returning(move |_| Ok(id));
        repo.expect_save_analytics().never();

        let stored = BenchmarkService::new(Arc::new(repo)).record(&rag(0.74)).await.unwrap();
        assert_eq!(stored, id);
    }

    #[tokio::test]
    async fn analytics_runs_go_to_analytics_storage() {
        let mut repo = MockBenchmarkRepo::new();
        repo.expect_save_analytics()
            .withf(|run| run.metric.as_deref() == Some("top_rated_hubs"))
            .returning(|_| Ok(Uuid::nil()));

        let run = BenchmarkRun::Analytics(AnalyticsBenchmark {
            query: "Best rated coworking?".into(),
            response: "Hub A".into(),
            model: "gpt-4o".into(),
            latency_ms: 1200,
            metric: Some("top_rated_hubs".into()),
            tool_calls: json!([{ "name": "review_analytics" }]),
        });
        assert!(BenchmarkService::new(Arc::new(repo)).record(&run).await.is_ok());
    }

    #[tokio::test]
    async fn out_of_range_similarity_is_rejected_before_storage() {
        let mut repo = MockBenchmarkRepo::new();
        repo.expect_save_rag().never();

        let err = BenchmarkService::new(Arc::new(repo)).record(&rag(1.4)).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn storage_failures_surface_as_internal() {
        let mut repo = MockBenchmarkRepo::new();
        repo.expect_save_rag().returning(|_| Err(anyhow::anyhow!("connection reset")));

        let err = BenchmarkService::new(Arc::new(repo)).record(&rag(0.5)).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
