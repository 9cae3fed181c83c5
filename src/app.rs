use crate::config::{self, Config};
use crate::discovery::{self, SearchOptions, SearchOutcome};
use crate::models::{ItemDetails, MediaKind, NormalizedItem, TrendingWindow};
use crate::query::{self, ParsedQuery};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_QUERY_CHARS: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub default_region: String,
    pub auto_broaden: bool,
}

impl AppState {
    pub fn new(tmdb: Arc<dyn TmdbApi>, config: &Config) -> Self {
        Self {
            tmdb,
            default_region: config.default_region.clone(),
            auto_broaden: config.auto_broaden,
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_config(&config)?);
    let state = AppState::new(tmdb, &config);
    info!(
        "Default region {}, auto-broaden {}",
        state.default_region, state.auto_broaden
    );

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/parse", get(parse_query))
        .route("/search", get(search))
        .route("/trending/:media", get(trending))
        .route("/items/:media/:id", get(details))
        .route("/items/:media/:id/recommendations", get(recommendations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct TextParams {
    q: Option<String>,
    region: Option<String>,
    broaden: Option<String>,
}

fn query_text(params: &TextParams) -> Result<&str, ApiError> {
    let text = params.q.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query 'q' must not be empty"));
    }
    if text.chars().count() > MAX_QUERY_CHARS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("query longer than {MAX_QUERY_CHARS} characters"),
        ));
    }
    Ok(text)
}

async fn parse_query(Query(params): Query<TextParams>) -> Result<Json<ParsedQuery>, ApiError> {
    let text = query_text(&params)?;
    Ok(Json(query::parse(text)))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<TextParams>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let text = query_text(&params)?;
    let region = match params.region.as_deref() {
        Some(r) => config::normalize_region(r)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.default_region.clone(),
    };
    let auto_broaden = match params.broaden.as_deref() {
        Some(b) => config::parse_bool(b).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "broaden must be true or false")
        })?,
        None => state.auto_broaden,
    };

    info!("Search '{}' (region {})", text, region);
    let options = SearchOptions {
        region,
        auto_broaden,
    };
    let outcome = discovery::search_text(state.tmdb.as_ref(), text, &options).await;
    Ok(Json(outcome))
}

fn media_kind(raw: &str) -> Result<MediaKind, ApiError> {
    raw.parse()
        .map_err(|e: anyhow::Error| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn upstream_error(context: &str, e: anyhow::Error) -> ApiError {
    warn!("{} failed: {:#}", context, e);
    api_error(StatusCode::BAD_GATEWAY, format!("{context} failed"))
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    #[serde(default)]
    window: TrendingWindow,
}

async fn trending(
    State(state): State<AppState>,
    Path(media): Path<String>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<NormalizedItem>>, ApiError> {
    let media = media_kind(&media)?;
    state
        .tmdb
        .trending(media, params.window)
        .await
        .map(Json)
        .map_err(|e| upstream_error("trending lookup", e))
}

async fn details(
    State(state): State<AppState>,
    Path((media, id)): Path<(String, i32)>,
) -> Result<Json<ItemDetails>, ApiError> {
    let media = media_kind(&media)?;
    state
        .tmdb
        .details(media, id)
        .await
        .map(Json)
        .map_err(|e| upstream_error("detail lookup", e))
}

async fn recommendations(
    State(state): State<AppState>,
    Path((media, id)): Path<(String, i32)>,
) -> Result<Json<Vec<NormalizedItem>>, ApiError> {
    let media = media_kind(&media)?;
    state
        .tmdb
        .recommendations(media, id)
        .await
        .map(Json)
        .map_err(|e| upstream_error("recommendations lookup", e))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
