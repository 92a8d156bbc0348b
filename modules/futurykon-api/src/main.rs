use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use futurykon_common::Config;
use futurykon_engine::{EventPersister, EventSource, ForecastBoard, ForecastService, RetryPolicy};
use futurykon_events::EventStore;

mod auth;
mod error;
mod jwt;
mod rest;

use jwt::JwtService;

pub type Service = ForecastService<Arc<dyn EventPersister>, Arc<dyn EventSource>>;

pub struct AppState {
    pub service: Service,
    pub jwt: JwtService,
    pub admin_user_ids: Vec<Uuid>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/api/categories", get(rest::api_categories))
        // Questions
        .route(
            "/api/questions",
            get(rest::api_questions).post(rest::admin::api_publish_question),
        )
        .route("/api/questions/{id}", get(rest::api_question_detail))
        .route("/api/questions/{id}/community", get(rest::api_question_community))
        .route(
            "/api/questions/{id}/predictions",
            get(rest::api_question_predictions).post(rest::submit::api_submit_prediction),
        )
        .route("/api/questions/{id}/history", get(rest::api_question_history))
        .route(
            "/api/questions/{id}/resolve",
            post(rest::admin::api_resolve_question),
        )
        // Forecasters
        .route("/api/leaderboard", get(rest::api_leaderboard))
        .route("/api/users/{id}/predictions", get(rest::api_user_predictions))
        // Suggestions
        .route(
            "/api/suggestions",
            get(rest::admin::api_suggestions).post(rest::submit::api_submit_suggestion),
        )
        .route(
            "/api/suggestions/{id}/review",
            post(rest::admin::api_review_suggestion),
        )
        // Freshness
        .route("/api/status", get(rest::api_status))
        .route("/api/refresh", post(rest::api_refresh))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only (no query params, no tokens)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("futurykon=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let pool = PgPool::connect(&config.database_url).await?;
    let store = EventStore::new(pool);
    store.migrate().await?;
    let store = Arc::new(store);

    let source: Arc<dyn EventSource> = store.clone();
    let persister: Arc<dyn EventPersister> = store;
    let board = Arc::new(
        ForecastBoard::new(source, RetryPolicy::from_config(&config))
            .with_gap_grace(config.log_gap_grace),
    );

    let outcome = board.refresh().await;
    if outcome.is_stale() {
        warn!(?outcome, "Starting with an incomplete projection");
    }
    info!(last_seq = board.status().await.last_seq, "Projection loaded");

    let refresher = board.clone();
    let every = config.refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            refresher.refresh().await;
        }
    });

    let state = Arc::new(AppState {
        service: ForecastService::new(persister, board),
        jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        admin_user_ids: config.admin_user_ids.clone(),
    });

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Futurykon API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use futurykon_engine::MemoryEventSink;

    /// App state over an in-memory log, with one configured admin.
    pub fn state(admin: Uuid) -> (Arc<MemoryEventSink>, Arc<AppState>) {
        let log = Arc::new(MemoryEventSink::new());
        let source: Arc<dyn EventSource> = log.clone();
        let persister: Arc<dyn EventPersister> = log.clone();
        let board = Arc::new(ForecastBoard::new(source, RetryPolicy::none()));
        let state = Arc::new(AppState {
            service: ForecastService::new(persister, board),
            jwt: JwtService::new(crate::jwt::test_tokens::SECRET, None),
            admin_user_ids: vec![admin],
        });
        (log, state)
    }
}
