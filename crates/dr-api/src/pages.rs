//! Server-rendered HTML pages.

use std::collections::HashMap;

use askama::Template;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Html;
use dr_core::{reconcile, AppError, Entity};
use dr_services::{AnalyticsFilter, AnalyticsService, EntityActions};
use dr_ui::{ChartPage, DetailPage, ListPage};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::AuthSession;
use crate::handlers::{parent_filter, parse_metric};
use crate::AppState;

fn render(template: &impl Template) -> ApiResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(format!("template rendering failed: {e}")).into())
}

pub async fn list_page<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<Html<String>> {
    let Query(params) = params?;
    let filter = parent_filter::<E>(&params)?;
    let items = EntityActions::<E>::new(state.store.clone()).list(&session, filter).await?;
    render(&ListPage::new(&reconcile(&items, None)))
}

pub async fn detail_page<E: Entity>(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Html<String>> {
    let entity = EntityActions::<E>::new(state.store.clone())
        .get(&session, id)
        .await?
        .ok_or_else(|| AppError::not_found(E::TABLE.singular, id))?;
    render(&DetailPage::new(&entity))
}

pub async fn chart_page(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Path(metric): Path<String>,
    filter: Result<Query<AnalyticsFilter>, QueryRejection>,
) -> ApiResult<Html<String>> {
    let Query(filter) = filter?;
    let data = AnalyticsService::new(state.analytics.clone())
        .run(parse_metric(&metric)?, &filter)
        .await?;
    render(&ChartPage::new(&data))
}
