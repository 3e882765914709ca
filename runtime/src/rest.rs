// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API over the product store.
//!
//! Read endpoints query the store directly. `POST /api/products/scrape`
//! runs a full scrape; the store lock is taken only for the commit, and at
//! most one scrape runs at a time.

use crate::config::ScrapeConfig;
use crate::pipeline;
use crate::progress::{ProgressSender, Reporter};
use crate::renderer::Launcher;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use openbox_catalog::{ListQuery, ProductStore, SortColumn, SortOrder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared state behind every handler.
pub struct AppState {
    pub store: Mutex<ProductStore>,
    pub launcher: Arc<dyn Launcher>,
    pub config: ScrapeConfig,
    /// Subscribers see progress from scrapes started over HTTP.
    pub progress: Option<ProgressSender>,
    scrape_lock: Mutex<()>,
}

impl AppState {
    pub fn new(store: ProductStore, launcher: Arc<dyn Launcher>, config: ScrapeConfig) -> Self {
        Self {
            store: Mutex::new(store),
            launcher,
            config,
            progress: None,
            scrape_lock: Mutex::new(()),
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/products", get(list_products))
        .route("/api/products/scrape", post(scrape))
        .route("/api/products/grade/:grade", get(products_by_grade))
        .route("/api/products/:id", get(product_by_id))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until the process is stopped.
pub async fn start(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// An error status with a JSON body.
struct ApiError(StatusCode, Value);

impl ApiError {
    fn new(status: StatusCode, message: &str) -> Self {
        Self(status, json!({ "error": message }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

// ── Handlers ────────────────────────────────────────────────────

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Openbox product API",
        "endpoints": {
            "health": "/health",
            "products": "/api/products",
            "productById": "/api/products/:id",
            "productsByGrade": "/api/products/grade/:grade",
            "scrape": "POST /api/products/scrape"
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let ping = state.store.lock().await.ping();
    match ping {
        Ok(()) => Json(json!({
            "status": "healthy",
            "database": "connected",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string(),
            })),
        )
            .into_response(),
    }
}

/// Query string for the list endpoint. Values are taken leniently: anything
/// unparseable falls back to its default.
#[derive(Deserialize, Default)]
struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    name: Option<String>,
}

impl ListParams {
    fn into_query(self) -> ListQuery {
        let defaults = ListQuery::default();
        ListQuery {
            page: parse_or(self.page, defaults.page),
            limit: parse_or(self.limit, defaults.limit),
            sort: self
                .sort
                .map(|s| SortColumn::parse_or_default(&s))
                .unwrap_or_default(),
            order: self
                .order
                .map(|o| SortOrder::parse_or_default(&o))
                .unwrap_or_default(),
            name: self.name,
        }
    }
}

fn parse_or(raw: Option<String>, fallback: u32) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

async fn list_products(State(state): State<Arc<AppState>>, Query(params): Query<ListParams>) -> ApiResult {
    let query = params.into_query();
    let listed = state.store.lock().await.list(&query);
    let (total, products) = listed.map_err(|e| {
        error!(error = %e, "failed to list products");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch products")
    })?;
    Ok(Json(json!({
        "products": products,
        "pagination": {
            "page": query.effective_page(),
            "limit": query.effective_limit(),
            "total": total,
            "totalPages": query.total_pages(total),
        }
    })))
}

async fn products_by_grade(State(state): State<Arc<AppState>>, Path(grade): Path<String>) -> ApiResult {
    let found = state.store.lock().await.by_grade(&grade);
    let products = found.map_err(|e| {
        error!(error = %e, grade = %grade, "failed to fetch products by grade");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch products")
    })?;
    Ok(Json(json!({ "count": products.len(), "products": products })))
}

async fn product_by_id(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> ApiResult {
    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid product ID"))?;
    let found = state.store.lock().await.get(id);
    match found {
        Ok(Some(product)) => Ok(Json(json!(product))),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, "Product not found")),
        Err(e) => {
            error!(error = %e, id, "failed to fetch product");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch product"))
        }
    }
}

async fn scrape(State(state): State<Arc<AppState>>) -> ApiResult {
    let Ok(_running) = state.scrape_lock.try_lock() else {
        return Err(ApiError::new(StatusCode::CONFLICT, "A scrape is already running"));
    };
    info!("scrape requested over HTTP");

    let mut reporter = Reporter::new(state.progress.clone());
    let collected = pipeline::collect(state.launcher.as_ref(), &state.config, &mut reporter)
        .await
        .map_err(|e| scrape_failed(format!("{e:#}")))?;
    let summary = {
        let mut store = state.store.lock().await;
        pipeline::persist(&mut store, &collected.records, &mut reporter).map_err(|e| scrape_failed(e.to_string()))?
    };

    Ok(Json(json!({
        "message": "Scraping completed successfully",
        "runId": reporter.run_id(),
        "saved": summary.saved,
        "updated": summary.updated,
        "total": collected.records.len(),
    })))
}

fn scrape_failed(message: String) -> ApiError {
    error!(error = %message, "scrape failed");
    ApiError(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Failed to scrape products", "message": message }),
    )
}
