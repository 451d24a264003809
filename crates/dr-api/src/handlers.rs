//! # dr-api Handlers
//!
//! Coordinates HTTP requests with the services. Entity handlers are generic
//! and instantiated once per entity by the router.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dr_core::{AppError, BenchmarkRun, Entity, FormInput, ParentFilter};
use dr_services::{
    tools, AnalyticsFilter, AnalyticsService, AnalyticsTools, BenchmarkService, ChartData,
    EntityActions, Metric, ToolDefinition,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::AuthSession;
use crate::AppState;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Picks out `?<relation_column>=<uuid>`. Other keys and blank values are
/// ignored; at most one relation may be given.
pub(crate) fn parent_filter<E: Entity>(params: &HashMap<String, String>) -> ApiResult<Option<ParentFilter>> {
    let mut filters = params.iter().filter_map(|(column, raw)| {
        let relation = E::TABLE.relation(column)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.parse::<Uuid>()
                .map(|id| ParentFilter { column: relation.column, id })
                .map_err(|_| AppError::ValidationError(format!("{column}: Invalid uuid"))),
        )
    });
    match (filters.next(), filters.next()) {
        (None, _) => Ok(None),
        (Some(filter), None) => Ok(Some(filter?)),
        (Some(_), Some(_)) => Err(AppError::ValidationError("only one parent filter is supported".into()).into()),
    }
}

pub async fn list_entities<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<Json<Vec<E>>> {
    let Query(params) = params?;
    let filter = parent_filter::<E>(&params)?;
    let items = EntityActions::<E>::new(state.store.clone()).list(&session, filter).await?;
    Ok(Json(items))
}

pub async fn get_entity<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<E>> {
    EntityActions::<E>::new(state.store.clone())
        .get(&session, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(E::TABLE.singular, id).into())
}

pub async fn create_entity<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    payload: Result<Json<FormInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    let id = EntityActions::<E>::new(state.store.clone()).create(&session, &input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn update_entity<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<FormInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    EntityActions::<E>::new(state.store.clone()).update(&session, id, &input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete_entity<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    EntityActions::<E>::new(state.store.clone()).delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn parse_metric(raw: &str) -> ApiResult<Metric> {
    Ok(raw.parse::<Metric>()?)
}

pub async fn analytics(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Path(metric): Path<String>,
    filter: Result<Query<AnalyticsFilter>, QueryRejection>,
) -> ApiResult<Json<ChartData>> {
    let Query(filter) = filter?;
    let data = AnalyticsService::new(state.analytics.clone())
        .run(parse_metric(&metric)?, &filter)
        .await?;
    Ok(Json(data))
}

pub async fn list_tools(AuthSession(_session): AuthSession) -> Json<Vec<ToolDefinition>> {
    Json(tools::definitions())
}

/// Runs a tool call; the response body is the tool's JSON string.
pub async fn call_tool(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Path(name): Path<String>,
    args: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<String>> {
    let Json(args) = args?;
    let tools = AnalyticsTools::new(AnalyticsService::new(state.analytics.clone()));
    Ok(Json(tools.call(&name, args).await?))
}

/// Stores a RAG or analytics evaluation run posted by the benchmark harness.
pub async fn record_benchmark(
    State(state): State<AppState>,
    payload: Result<Json<BenchmarkRun>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(run) = payload?;
    let id = BenchmarkService::new(state.benchmarks.clone()).record(&run).await?;
    Ok(Json(json!({ "result": { "id": id } })))
}
