//! API Service - HTTP surface over the complaints ingestion pipeline
//!
//! Endpoints:
//! - GET  /health - Health check
//! - POST /complaints/download - Fetch the Kaggle dataset (idempotent)
//! - POST /complaints/load_all - Whole-file ingestion, batched staging, one merge
//! - POST /complaints/load_batch - Single-page ingestion, caller advances the page
//! - GET  /complaints/report - Complaint counts per product/sub-product/quarter

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower_http::cors::{Any, CorsLayer};

use ingest::config::{Config, DEFAULT_BATCH_SIZE};
use ingest::download::download_dataset;
use ingest::{load_all, load_page, IngestError};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    config: Config,
    client: reqwest::Client,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct DownloadResponse {
    message: &'static str,
    data_path: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
}

#[derive(Serialize, sqlx::FromRow)]
struct ReportRow {
    product: Option<String>,
    sub_product: Option<String>,
    year: Option<i32>,
    quarter: Option<i32>,
    complaints: i64,
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct LoadAllQuery {
    batch_size: Option<usize>,
}

#[derive(Deserialize)]
struct LoadBatchQuery {
    page: usize,
    page_size: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

fn error_response(err: IngestError) -> Response {
    let status = match &err {
        IngestError::SourceUnavailable { .. } => StatusCode::CONFLICT,
        IngestError::InvalidBatchSize(_) => StatusCode::BAD_REQUEST,
        IngestError::MalformedRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::DownloadFailed(_) => StatusCode::BAD_GATEWAY,
        IngestError::StorageWrite(_) | IngestError::UpsertConflict(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            kind: err.kind(),
            line: err.line(),
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: "0.1.0",
    })
}

async fn download_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match download_dataset(&state.client, &state.config).await {
        Ok(path) => Json(DownloadResponse {
            message: "Dataset downloaded successfully.",
            data_path: path.display().to_string(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn load_all_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoadAllQuery>,
) -> impl IntoResponse {
    let batch_size = params.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    match load_all(&state.pool, &state.config.data_path(), batch_size).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn load_batch_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoadBatchQuery>,
) -> impl IntoResponse {
    let page_size = params.page_size.unwrap_or(DEFAULT_BATCH_SIZE);
    match load_page(&state.pool, &state.config.data_path(), params.page, page_size).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn report_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rows: Result<Vec<ReportRow>, _> = sqlx::query_as(
        r#"
        SELECT product,
               sub_product,
               EXTRACT(YEAR FROM date_received)::int AS year,
               EXTRACT(QUARTER FROM date_received)::int AS quarter,
               COUNT(*) AS complaints
        FROM consumer_complaints
        GROUP BY product, sub_product, year, quarter
        ORDER BY year, quarter, product, sub_product
        "#,
    )
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => Json(serde_json::json!({ "report": rows })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                kind: "storage_read_error",
                error: e.to_string(),
                line: None,
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== Consumer Complaints API ===");
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_uri)
        .await
        .context("Failed to connect to database")?;

    println!("Database connected");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(600))
        .build()?;

    let state = Arc::new(AppState {
        pool,
        config,
        client,
    });

    // CORS for downstream analytics clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/complaints/download", post(download_handler))
        .route("/complaints/load_all", post(load_all_handler))
        .route("/complaints/load_batch", post(load_batch_handler))
        .route("/complaints/report", get(report_handler))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  POST /complaints/download");
    println!("  POST /complaints/load_all?batch_size=");
    println!("  POST /complaints/load_batch?page=&page_size=");
    println!("  GET  /complaints/report");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
