use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hearthdash_overlay::model::PageOrder;
use hearthdash_overlay::overlay::{validate_import, ExportScope, ImportError, ImportMode};
use hearthdash_overlay::resolve::{resolve_page, resolve_view};
use hearthdash_overlay::storage::Persistence;
use hearthdash_overlay::{Catalog, OverlayStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;

pub type DynPersistence = Box<dyn Persistence + Send>;

/// Shared application state
pub struct AppState {
    version: &'static str,
    catalog: Catalog,
    store: Mutex<OverlayStore<DynPersistence>>,
}

impl AppState {
    pub fn new(catalog: Catalog, store: OverlayStore<DynPersistence>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            catalog,
            store: Mutex::new(store),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, OverlayStore<DynPersistence>>, ApiError> {
        self.store.lock().map_err(|_| ApiError::Poisoned)
    }
}

#[derive(Serialize)]
struct PingResponse {
    status: String,
}

#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    errors: Vec<String>,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    errors: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    devices: usize,
    panels: usize,
    links: usize,
    pages: usize,
}

#[derive(Debug, Deserialize)]
struct ImportParams {
    #[serde(default)]
    mode: ImportMode,
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(default)]
    scope: ExportScope,
}

enum ApiError {
    Store(StoreError),
    Poisoned,
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::Store(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::Store(StoreError::Import(error)) => {
                (StatusCode::BAD_REQUEST, error.messages())
            }
            ApiError::Store(
                error @ (StoreError::Storage(_) | StoreError::Corrupt(_)),
            ) => {
                tracing::error!("Overlay persistence failed: {}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, vec![error.to_string()])
            }
            ApiError::Store(error) => (StatusCode::BAD_REQUEST, vec![error.to_string()]),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec!["overlay store is unavailable".to_string()],
            ),
        };

        (status, Json(ErrorResponse { errors })).into_response()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    Json(InfoResponse {
        version: state.version.to_string(),
        hostname,
    })
}

/// Handler for GET /v1/view
#[tracing::instrument(skip(state))]
async fn view(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let store = state.store()?;
    Ok(Json(resolve_view(&state.catalog, store.overlay())).into_response())
}

/// Handler for GET /v1/pages/:page/order
#[tracing::instrument(skip(state))]
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store()?;
    Ok(Json(resolve_page(&state.catalog, &page, store.overlay())).into_response())
}

/// Handler for PUT /v1/pages/:page/order
#[tracing::instrument(skip(state, order))]
async fn put_order(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
    Json(order): Json<PageOrder>,
) -> Result<Response, ApiError> {
    if state.catalog.page(&page).is_none() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let mut store = state.store()?;
    store.set_order(&page, order)?;
    Ok(Json(resolve_page(&state.catalog, &page, store.overlay())).into_response())
}

/// Handler for DELETE /v1/pages/:page/order
#[tracing::instrument(skip(state))]
async fn reset_order(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store()?.reset_order(&page)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /v1/overlay
#[tracing::instrument(skip(state))]
async fn export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let store = state.store()?;
    Ok(Json(store.export(params.scope)).into_response())
}

/// Handler for POST /v1/overlay/import
#[tracing::instrument(skip(state, body))]
async fn import(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<Response, ApiError> {
    let summary = state.store()?.import_str(&body, params.mode)?;
    Ok(Json(ImportResponse {
        devices: summary.devices,
        panels: summary.panels,
        links: summary.links,
        pages: summary.pages,
    })
    .into_response())
}

/// Handler for POST /v1/overlay/validate
#[tracing::instrument(skip(body))]
async fn validate(body: String) -> impl IntoResponse {
    let errors = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(document) => {
            let report = validate_import(&document);
            ImportError::Invalid(report).messages()
        }
        Err(e) => ImportError::InvalidFormat(e).messages(),
    };

    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors,
    })
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/view", get(view))
        .route(
            "/v1/pages/:page/order",
            get(get_order).put(put_order).delete(reset_order),
        )
        .route("/v1/overlay", get(export))
        .route("/v1/overlay/import", post(import))
        .route("/v1/overlay/validate", post(validate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown_rx` fires.
pub async fn serve(
    config: &ApiConfig,
    state: Arc<AppState>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
