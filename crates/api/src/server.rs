use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cache::CacheStats;
use crate::config::OperationMode;
use crate::metrics::MetricsSnapshot;
use crate::runner::Runner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
    pub mode: OperationMode,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    mode: OperationMode,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub path: String,
    pub output_dir: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub files_processed: usize,
    pub files_failed: usize,
    pub documents: usize,
    pub relations: usize,
    pub outputs: Vec<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    metrics: MetricsSnapshot,
    cache: Option<CacheStats>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process", post(process_collection))
        .route("/ingest", post(ingest_path))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mode: state.mode,
    })
}

async fn process_collection(
    State(state): State<Arc<AppState>>,
    Json(collection): Json<ingest::Collection>,
) -> Result<Json<ingest::Collection>, StatusCode> {
    let request_id = uuid::Uuid::new_v4();
    tracing::info!(%request_id, documents = collection.documents.len(), "Processing collection");

    let result = state.runner.run(collection).await;
    state.runner.metrics().record_request(result.is_ok());

    let (collection, _) = result.map_err(|e| {
        tracing::error!(%request_id, error = %e, "Processing failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(collection))
}

async fn ingest_path(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, StatusCode> {
    let path = PathBuf::from(&req.path);
    let output_dir = PathBuf::from(&req.output_dir);

    if !path.exists() {
        return Err(StatusCode::NOT_FOUND);
    }

    let files = if path.is_file() {
        vec![path]
    } else if path.is_dir() {
        ingest::FileReader::discover(&path).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    } else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let mut response = IngestResponse {
        files_processed: 0,
        files_failed: 0,
        documents: 0,
        relations: 0,
        outputs: Vec::new(),
    };

    for file in &files {
        match mine_file(&state.runner, file, &output_dir).await {
            Ok((output, documents, relations)) => {
                response.files_processed += 1;
                response.documents += documents;
                response.relations += relations;
                response.outputs.push(output.to_string_lossy().to_string());
            }
            Err(e) => {
                tracing::warn!(path = ?file, error = %e, "Failed to mine file");
                response.files_failed += 1;
            }
        }
    }

    state.runner.metrics().record_request(response.files_failed == 0);
    Ok(Json(response))
}

/// Mine one BioC file and write `<name>.annotated.json`.
pub async fn mine_file(runner: &Runner, path: &Path, output_dir: &Path) -> anyhow::Result<(PathBuf, usize, usize)> {
    let collection = ingest::ingest_file(path).await?;
    let (collection, _) = runner.run(collection).await?;

    let output = ingest::FileReader::output_path(path, output_dir);
    ingest::FileReader::write_collection(&collection, &output).await?;

    let relations = collection.documents.iter().map(|d| d.relations.len()).sum();
    Ok((output, collection.documents.len(), relations))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.runner.metrics().snapshot(),
        cache: state.runner.cache().map(|cache| cache.stats()),
    })
}
