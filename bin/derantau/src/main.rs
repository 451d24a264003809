//! # DE Rantau Binary
//!
//! Assembles the application from the adapters selected at compile time.
//! `cargo run` uses Postgres; `cargo run --no-default-features --features
//! db-memory,auth-supabase` runs against process memory.

use std::sync::Arc;

use dr_api::{router, AppState};
use dr_config::{LogSettings, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use dr_db_postgres::PgStore;

#[cfg(all(feature = "db-memory", not(feature = "db-postgres")))]
use dr_db_memory::MemoryStore;

#[cfg(feature = "auth-supabase")]
use dr_auth_supabase::SupabaseVerifier;

#[cfg(not(any(feature = "db-postgres", feature = "db-memory")))]
compile_error!("enable one storage adapter: `db-postgres` or `db-memory`");

#[cfg(not(feature = "auth-supabase"))]
compile_error!("the `auth-supabase` feature is required");

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // 1. Storage
    #[cfg(feature = "db-postgres")]
    let store = {
        use secrecy::ExposeSecret;
        let store = PgStore::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await?;
        store.migrate().await?;
        Arc::new(store)
    };

    #[cfg(all(feature = "db-memory", not(feature = "db-postgres")))]
    let store = {
        tracing::warn!("using in-memory storage; data is lost on exit");
        Arc::new(MemoryStore::new())
    };

    // 2. Sessions
    let sessions = Arc::new(SupabaseVerifier::new(&settings.auth.jwt_secret, &settings.auth.audience));

    let state = AppState {
        store: store.clone(),
        analytics: store.clone(),
        benchmarks: store,
        sessions,
    };

    let addr = settings.server.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("DE Rantau listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("DE Rantau stopped");
    Ok(())
}
