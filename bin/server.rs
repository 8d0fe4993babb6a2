// Personal Finance Dashboard - Web Server
// Serves the dashboard pages and the JSON API behind them

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use finance_dashboard::{
    add_category, category_summaries, get_all_spending, get_categories,
    get_spending_by_category, record_spending, trends_for_categories, validate_amount,
    validate_category_name, CategorySummary, Config, RecordOutcome, SpendingEntry,
    TrendFrequency,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(error.into()),
        }
    }
}

/// Spending entry response (timestamps rendered for the UI)
#[derive(Serialize)]
struct SpendingResponse {
    id: String,
    amount: f64,
    category: String,
    note: String,
    timestamp: String,
    date: String,
}

impl From<SpendingEntry> for SpendingResponse {
    fn from(entry: SpendingEntry) -> Self {
        Self {
            date: entry.date().format("%Y-%m-%d").to_string(),
            timestamp: entry.timestamp.to_rfc3339(),
            id: entry.id,
            amount: entry.amount,
            category: entry.category,
            note: entry.note,
        }
    }
}

/// Overview response for the index page
#[derive(Serialize)]
struct SummaryResponse {
    total_entries: i64,
    total_spent: f64,
    category_count: usize,
    by_category: Vec<CategorySummary>,
}

#[derive(Deserialize)]
struct NewCategoryRequest {
    name: String,
}

#[derive(Deserialize)]
struct NewSpendingRequest {
    amount: f64,
    category: String,
    #[serde(default)]
    note: String,
    /// RFC 3339 or YYYY-MM-DD; defaults to now
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct TrendQuery {
    /// Comma-separated category names; all categories when absent
    categories: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/categories - All category names
async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_categories(&conn) {
        Ok(categories) => (StatusCode::OK, Json(ApiResponse::ok(categories))).into_response(),
        Err(e) => {
            tracing::error!("Error listing categories: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to list categories")),
            )
                .into_response()
        }
    }
}

/// POST /api/categories - Add a category
async fn create_category(
    State(state): State<AppState>,
    Json(request): Json<NewCategoryRequest>,
) -> impl IntoResponse {
    let name = request.name.trim().to_string();

    if let Err(e) = validate_category_name(&name) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::fail(e.to_string())),
        )
            .into_response();
    }

    let conn = state.db.lock().unwrap();

    match add_category(&conn, &name) {
        Ok(()) => {
            tracing::info!("Added category: {name}");
            (StatusCode::CREATED, Json(ApiResponse::ok(name))).into_response()
        }
        Err(e) if e.to_string().contains("already exists") => (
            StatusCode::CONFLICT,
            Json(ApiResponse::fail(format!("category already exists: {name}"))),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error adding category: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to add category")),
            )
                .into_response()
        }
    }
}

/// GET /api/spending - Full register, newest first
async fn list_spending(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_all_spending(&conn) {
        Ok(entries) => {
            let response: Vec<SpendingResponse> =
                entries.into_iter().map(|e| e.into()).collect();

            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            tracing::error!("Error getting spending: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to read register")),
            )
                .into_response()
        }
    }
}

/// POST /api/spending - Record one entry (the dashboard form)
async fn create_spending(
    State(state): State<AppState>,
    Json(request): Json<NewSpendingRequest>,
) -> impl IntoResponse {
    let mut errors = Vec::new();

    if let Err(e) = validate_amount(request.amount) {
        errors.push(e.to_string());
    }

    let category = request.category.trim().to_string();
    if let Err(e) = validate_category_name(&category) {
        errors.push(e.to_string());
    }

    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::fail(errors.join("; "))),
        )
            .into_response();
    }

    let timestamp = match &request.timestamp {
        Some(raw) => match finance_dashboard::db::parse_timestamp(raw) {
            Ok(ts) => ts,
            Err(e) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ApiResponse::fail(format!("timestamp: {e:#}"))),
                )
                    .into_response();
            }
        },
        None => Utc::now(),
    };

    let entry = SpendingEntry::new(request.amount, &category, request.note.trim(), timestamp);

    let conn = state.db.lock().unwrap();

    match record_spending(&conn, &entry) {
        Ok(RecordOutcome::Inserted) => {
            tracing::info!(amount = entry.amount, category = %entry.category, "Recorded spending");
            (
                StatusCode::CREATED,
                Json(ApiResponse::ok(SpendingResponse::from(entry))),
            )
                .into_response()
        }
        Ok(RecordOutcome::Duplicate) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::fail(
                "an identical entry already exists (same amount, category and timestamp)",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error recording spending: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to record spending")),
            )
                .into_response()
        }
    }
}

/// GET /api/categories/:name/spending - Register entries for one category
async fn spending_for_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    // Decode URL-encoded category name
    let decoded_name = urlencoding::decode(&name)
        .unwrap_or_else(|_| name.clone().into())
        .into_owned();

    let conn = state.db.lock().unwrap();

    match get_spending_by_category(&conn, &decoded_name) {
        Ok(entries) => {
            let response: Vec<SpendingResponse> =
                entries.into_iter().map(|e| e.into()).collect();

            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            tracing::error!("Error getting spending for {decoded_name}: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to read register")),
            )
                .into_response()
        }
    }
}

/// GET /api/summary - Overview totals plus per-category aggregates
async fn get_summary(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    let summaries = match category_summaries(&conn) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Error computing summary: {e:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to compute summary")),
            )
                .into_response();
        }
    };

    let total_entries: i64 = summaries.iter().map(|s| s.entry_count).sum();
    let total_spent: f64 = summaries.iter().map(|s| s.total_spent).sum();

    let summary = SummaryResponse {
        total_entries,
        total_spent,
        category_count: summaries.len(),
        by_category: summaries,
    };

    (StatusCode::OK, Json(ApiResponse::ok(summary))).into_response()
}

/// GET /api/trends/:frequency - Weekly or monthly trend series
async fn get_trends(
    State(state): State<AppState>,
    Path(frequency): Path<String>,
    Query(query): Query<TrendQuery>,
) -> impl IntoResponse {
    let Some(frequency) = TrendFrequency::parse(&frequency) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail(format!(
                "unknown frequency: {frequency} (expected weekly or monthly)"
            ))),
        )
            .into_response();
    };

    let conn = state.db.lock().unwrap();

    let selected: Vec<String> = match &query.categories {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => match get_categories(&conn) {
            Ok(all) => all,
            Err(e) => {
                tracing::error!("Error listing categories for trends: {e:#}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::fail("failed to list categories")),
                )
                    .into_response();
            }
        },
    };

    match get_all_spending(&conn) {
        Ok(entries) => {
            let series = trends_for_categories(&entries, &selected, frequency);
            (StatusCode::OK, Json(ApiResponse::ok(series))).into_response()
        }
        Err(e) => {
            tracing::error!("Error computing trends: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("failed to compute trends")),
            )
                .into_response()
        }
    }
}

/// GET / - Serve overview page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /spending-tracker - Serve spending tracker page
async fn serve_spending_tracker() -> impl IntoResponse {
    Html(include_str!("../web/spending-tracker.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    if !config.db_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.db_path);
        eprintln!("   Run: finance-dashboard init");
        eprintln!("   to create it first.");
        std::process::exit(1);
    }

    let conn = match Connection::open(&config.db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Failed to open database {:?}: {e}", config.db_path);
            std::process::exit(1);
        }
    };
    tracing::info!("Database opened: {:?}", config.db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:name/spending", get(spending_for_category))
        .route("/spending", get(list_spending).post(create_spending))
        .route("/summary", get(get_summary))
        .route("/trends/:frequency", get(get_trends))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .route("/spending-tracker", get(serve_spending_tracker))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive());

    // Start server
    let listener = match tokio::net::TcpListener::bind(&config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Failed to bind {}: {e}", config.bind);
            std::process::exit(1);
        }
    };

    tracing::info!("Dashboard running on http://{}", config.bind);
    tracing::info!("  Overview: http://{}/", config.bind);
    tracing::info!("  Tracker:  http://{}/spending-tracker", config.bind);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {e}");
        std::process::exit(1);
    }
}
