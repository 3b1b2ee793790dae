// SEComPair - Web Server
// REST API over one shared comparison session

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use secompair::{
    export_filename, import_csv, AppConfig, CsvFactsSource, FactError, FactsSource,
    InMemoryFactsSource, Session, YearRange,
};

/// Shared application state
///
/// The session sits behind a mutex: a load replaces the working dataset as a
/// whole, and no reader may observe a half-applied load.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    source: Arc<dyn FactsSource>,
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

fn fact_error_response(err: FactError) -> Response {
    let status = match &err {
        FactError::MalformedInput { .. } => StatusCode::BAD_REQUEST,
        FactError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        FactError::PaletteExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FactError::Source(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    error_response(status, err.to_string())
}

fn lock_session(state: &AppState) -> Result<MutexGuard<'_, Session>, Response> {
    state.session.lock().map_err(|_| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "session state is poisoned".to_string(),
        )
    })
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Deserialize)]
struct LoadRequest {
    #[serde(default)]
    companies: Vec<String>,
    /// Contents of a CSV exported by a previous run
    import_csv: Option<String>,
}

#[derive(Deserialize)]
struct CompareQuery {
    x: Option<String>,
    y: Option<String>,
    low: Option<i32>,
    high: Option<i32>,
}

#[derive(Deserialize)]
struct SeriesQuery {
    vs: Option<String>,
    label: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/entities - Entities the facts source can fetch
async fn get_entities(State(state): State<AppState>) -> Response {
    let source = state.source.clone();
    match tokio::task::spawn_blocking(move || source.list_entities()).await {
        Ok(Ok(entities)) => ApiResponse::ok(entities),
        Ok(Err(e)) => fact_error_response(FactError::Source(e)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/load - Fetch and/or import, then replace the working dataset
async fn load_data(State(state): State<AppState>, Json(request): Json<LoadRequest>) -> Response {
    let (imported, import_rejected) = match request.import_csv {
        Some(text) => match import_csv(text.as_bytes()) {
            Ok(report) => (Some(report.facts), report.rejected.len()),
            Err(e) => return fact_error_response(e),
        },
        None => (None, 0),
    };

    let task_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut session = lock_session(&task_state)?;
        let mut rng = StdRng::from_entropy();
        let outcome = session
            .load_from_source(task_state.source.as_ref(), &request.companies, imported, &mut rng)
            .map_err(fact_error_response);
        outcome
    })
    .await;

    match result {
        Ok(Ok(outcome)) => ApiResponse::ok(outcome.with_import_rejections(import_rejected)),
        Ok(Err(response)) => response,
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/labels - Labels comparable across every loaded entity
async fn get_labels(State(state): State<AppState>) -> Response {
    match lock_session(&state) {
        Ok(session) => ApiResponse::ok(session.comparable_labels().clone()),
        Err(response) => response,
    }
}

/// GET /api/colors - Entity color map for the current dataset
async fn get_colors(State(state): State<AppState>) -> Response {
    match lock_session(&state) {
        Ok(session) => ApiResponse::ok(session.colors().clone()),
        Err(response) => response,
    }
}

/// GET /api/years - Year bounds (slider min/max)
async fn get_years(State(state): State<AppState>) -> Response {
    match lock_session(&state) {
        Ok(session) => ApiResponse::ok(session.year_bounds()),
        Err(response) => response,
    }
}

/// GET /api/compare?x=&y=&low=&high= - Comparison rows
async fn get_comparison(State(state): State<AppState>, Query(query): Query<CompareQuery>) -> Response {
    let session = match lock_session(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let defaults = &state.config.comparison;
    let x = query.x.unwrap_or_else(|| defaults.default_x_label.clone());
    let y = query.y.unwrap_or_else(|| defaults.default_y_label.clone());

    let years = YearRange::from_bounds(query.low, query.high, session.year_bounds());

    match session.compare(&x, &y, years) {
        Ok(rows) => ApiResponse::ok(rows),
        Err(e) => fact_error_response(e),
    }
}

/// GET /api/series/:entity?vs=&label= - Full-history slice
async fn get_series(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Response {
    // Decode URL-encoded entity name
    let entity = urlencoding::decode(&entity)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(entity);

    let session = match lock_session(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let label = query
        .label
        .unwrap_or_else(|| state.config.comparison.default_x_label.clone());

    match session.time_series(&entity, query.vs.as_deref(), &label) {
        Ok(slice) => ApiResponse::ok(slice),
        Err(e) => fact_error_response(e),
    }
}

/// GET /api/export - Working dataset as a CSV download
async fn export_dataset(State(state): State<AppState>) -> Response {
    let session = match lock_session(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let Some(dataset) = session.dataset() else {
        return error_response(StatusCode::NOT_FOUND, "no working dataset loaded".to_string());
    };

    let mut body = Vec::new();
    if let Err(e) = dataset.write_csv(&mut body) {
        return fact_error_response(e);
    }

    let export = &state.config.export;
    let filename = export_filename(&export.filename_prefix, &export.timestamp_format, &Local::now());

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    secompair::init_tracing("secompair=info,tower_http=info");

    let config = AppConfig::load(None)?;

    let source: Arc<dyn FactsSource> = match &config.source.facts_csv {
        Some(path) => {
            info!(path = %path.display(), "serving raw facts from CSV");
            Arc::new(CsvFactsSource::new(path.clone()))
        }
        None => {
            info!("no facts CSV configured; only imports can load data");
            Arc::new(InMemoryFactsSource::default())
        }
    };

    let bind = config.server.bind.clone();
    let state = AppState {
        session: Arc::new(Mutex::new(Session::new())),
        source,
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/entities", get(get_entities))
        .route("/load", post(load_data))
        .route("/labels", get(get_labels))
        .route("/colors", get(get_colors))
        .route("/years", get(get_years))
        .route("/compare", get(get_comparison))
        .route("/series/:entity", get(get_series))
        .route("/export", get(export_dataset))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    println!("🚀 Server running on http://{}", bind);
    println!("   API: http://{}/api/health", bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
