//! # dr-api
//!
//! The web routing and orchestration layer for DE Rantau.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod pages;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dr_core::{
    AnalyticsRepo, BenchmarkRepo, Chat, CommunityPost, CommunityReply, Entity, Event,
    HealthClearanceInfo, Hub, Invite, Message, NomadProfile, RecordStore, Region, Review,
    SessionVerifier, State,
};

pub use error::{ApiError, ApiResult};
pub use extract::AuthSession;

/// Shared across all handlers. Adapters are chosen by the binary.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub analytics: Arc<dyn AnalyticsRepo>,
    pub benchmarks: Arc<dyn BenchmarkRepo>,
    pub sessions: Arc<dyn SessionVerifier>,
}

/// JSON CRUD under `/api/<table>` and HTML pages under `/app/<table>`.
fn entity_routes<E: Entity>() -> Router<AppState> {
    let name = E::TABLE.name;
    Router::new()
        .route(
            &format!("/api/{name}"),
            get(handlers::list_entities::<E>).post(handlers::create_entity::<E>),
        )
        .route(
            &format!("/api/{name}/{{id}}"),
            get(handlers::get_entity::<E>)
                .put(handlers::update_entity::<E>)
                .delete(handlers::delete_entity::<E>),
        )
        .route(&format!("/app/{name}"), get(pages::list_page::<E>))
        .route(&format!("/app/{name}/{{id}}"), get(pages::detail_page::<E>))
}

/// Builds the full application router with middleware applied.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/analytics/{metric}", get(handlers::analytics))
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/tools/{name}", post(handlers::call_tool))
        .route("/api/benchmarks", post(handlers::record_benchmark))
        .route("/app/analytics/{metric}", get(pages::chart_page))
        .merge(entity_routes::<Region>())
        .merge(entity_routes::<State>())
        .merge(entity_routes::<Hub>())
        .merge(entity_routes::<Review>())
        .merge(entity_routes::<Event>())
        .merge(entity_routes::<Chat>())
        .merge(entity_routes::<Message>())
        .merge(entity_routes::<CommunityPost>())
        .merge(entity_routes::<CommunityReply>())
        .merge(entity_routes::<Invite>())
        .merge(entity_routes::<NomadProfile>())
        .merge(entity_routes::<HealthClearanceInfo>());

    middleware::apply(routes).with_state(state)
}
