use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info};

use crate::config::Config;
use crate::storage;

/// Read-only view over the pipeline's terminal artifacts. Shares nothing
/// with a running scrape beyond files on disk, and answers correctly
/// before any run has completed.
#[derive(Debug)]
struct AppState {
    output_dir: PathBuf,
}

pub fn build_router(output_dir: PathBuf, public_dir: PathBuf) -> Router {
    let state = Arc::new(AppState { output_dir });
    let index = ServeFile::new(public_dir.join("index.html"));
    let static_files = ServeDir::new(public_dir).not_found_service(index);

    Router::new()
        .route("/api/classes", get(classes))
        .with_state(state)
        .fallback_service(static_files)
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let app = build_router(cfg.output_dir.clone(), cfg.public_dir.clone());
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "read service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// The most recent listing export as a JSON array, or a documented
/// "no data" response when no run has produced one yet.
async fn classes(State(state): State<Arc<AppState>>) -> Response {
    let listing = match storage::latest_listing(&state.output_dir) {
        Ok(listing) => listing,
        Err(error) => {
            error!(%error, "failed to scan for listing exports");
            return internal_error();
        }
    };

    let Some(path) = listing else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No class data found" })),
        )
            .into_response();
    };

    match storage::read_listing_records(&path) {
        Ok(records) => Json(records).into_response(),
        Err(error) => {
            error!(%error, path = %path.display(), "failed to read listing export");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "failed to read class data" })),
    )
        .into_response()
}
