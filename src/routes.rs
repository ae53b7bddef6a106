use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::jobs;
use crate::state::AppState;
use crate::storage;

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.into()})),
    )
}

fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": message.into()})),
    )
}

pub fn create_routes(state: &AppState) -> Router<AppState> {
    let system_config = &state.config.system_config;
    let static_dir = PathBuf::from(&system_config.static_dir);

    Router::new()
        // WebSocket progress channel
        .route("/progress-ws", get(crate::websocket::websocket_handler))
        // Health check
        .route("/api/health", get(health_check))
        // REST API routes
        .route("/api/base-config", get(get_base_config))
        .route("/api/jobs/:file_id", get(get_job_status))
        .route("/upload", post(upload_files))
        .route("/start_translation", post(start_translation))
        .route("/delete_file/:file_id", delete(delete_file))
        .route("/download/:filename", get(download_file))
        // Upload page and assets
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&static_dir))
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Supported languages and allowed extensions for the upload form.
async fn get_base_config(State(state): State<AppState>) -> Json<Value> {
    let languages: Vec<Value> = state
        .config
        .language_config
        .languages
        .iter()
        .map(|l| json!({"code": l.code, "name": l.name}))
        .collect();
    Json(json!({
        "languages": languages,
        "allowed_extensions": state.config.system_config.allowed_extensions,
        "max_chunk_chars": state.config.system_config.max_chunk_chars,
    }))
}

/// Accept one or more files. Each stored file gets a fresh identifier and
/// lands as `{id}_{sanitized_name}` in the upload dir. A single disallowed
/// extension rejects the whole request; files already written for it are
/// removed again.
async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let allow_list = state.config.system_config.allowed_extensions.clone();
    let upload_dir = PathBuf::from(&state.config.system_config.upload_dir);
    let mut accepted: Vec<Value> = Vec::new();
    let mut stored_ids: Vec<String> = Vec::new();

    let undo = |state: &AppState, ids: &[String], dir: &PathBuf| {
        for id in ids {
            state.uploads.remove(id);
            let _ = storage::remove_files_with_id(dir, id);
        }
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart request: {e}")))?
    {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let Some(extension) = storage::allowed_extension(&original_name, &allow_list) else {
            undo(&state, &stored_ids, &upload_dir);
            return Err(bad_request(format!(
                "file type not allowed: {original_name}"
            )));
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;

        let display_name = storage::sanitize_filename(&original_name);
        let file_id = storage::generate_file_id();
        let stored_path = upload_dir.join(storage::stored_filename(&file_id, &display_name));

        if let Err(e) = tokio::fs::write(&stored_path, &data).await {
            warn!(error = %e, "failed to store upload");
            undo(&state, &stored_ids, &upload_dir);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to store upload"})),
            ));
        }

        info!(file_id = %file_id, name = %display_name, bytes = data.len(), "stored upload");
        state.uploads.insert(
            file_id.clone(),
            storage::StoredUpload::new(
                file_id.clone(),
                display_name.clone(),
                stored_path,
                extension,
            ),
        );
        accepted.push(json!({"id": file_id.clone(), "name": display_name}));
        stored_ids.push(file_id);
    }

    if accepted.is_empty() {
        return Err(bad_request("no valid file supplied"));
    }
    Ok(Json(json!({"files": accepted})))
}

#[derive(Debug, Deserialize)]
struct StartTranslationRequest {
    files: Vec<FileRef>,
    target_language: String,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
    #[allow(dead_code)]
    name: Option<String>,
}

/// Validate everything up front, then dispatch one background job per file.
/// Validation failures reject the whole request before any job starts.
async fn start_translation(
    State(state): State<AppState>,
    Json(request): Json<StartTranslationRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.files.is_empty() {
        return Err(bad_request("no files to translate"));
    }
    if !state
        .config
        .language_config
        .is_supported(&request.target_language)
    {
        return Err(bad_request(format!(
            "unsupported target language: {}",
            request.target_language
        )));
    }

    let mut uploads = Vec::with_capacity(request.files.len());
    for file in &request.files {
        let Some(upload) = state.uploads.get(&file.id).map(|u| u.value().clone()) else {
            return Err(bad_request(format!("unknown upload: {}", file.id)));
        };
        if state
            .jobs
            .get(&file.id)
            .map(|entry| entry.is_running())
            .unwrap_or(false)
        {
            return Err((
                StatusCode::CONFLICT,
                Json(json!({"error": format!("translation already running for {}", file.id)})),
            ));
        }
        uploads.push(upload);
    }

    let count = uploads.len();
    for upload in uploads {
        jobs::spawn(&state, upload, request.target_language.clone());
    }
    Ok(Json(json!({"status": "started", "count": count})))
}

/// Observable status of one file's job.
async fn get_job_status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(entry) = state.jobs.get(&file_id) else {
        return Err(not_found(format!("no job for {file_id}")));
    };
    let mut body = serde_json::to_value(&entry.status)
        .unwrap_or_else(|_| json!({"status": "unknown"}));
    body["file_id"] = json!(file_id);
    Ok(Json(body))
}

/// Remove everything stored under this identifier: the upload, intermediate
/// parts, and any processed artifact.
async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let had_entry = state.uploads.remove(&file_id).is_some();

    let upload_dir = PathBuf::from(&state.config.system_config.upload_dir);
    let processed_dir = PathBuf::from(&state.config.system_config.processed_dir);
    let removed = storage::remove_files_with_id(&upload_dir, &file_id).unwrap_or(0)
        + storage::remove_files_with_id(&processed_dir, &file_id).unwrap_or(0);

    if !had_entry && removed == 0 {
        return Err(not_found(format!("no stored file for {file_id}")));
    }
    info!(file_id = %file_id, removed, "deleted stored files");
    Ok(Json(json!({"status": "deleted", "removed": removed})))
}

/// Serve a processed artifact as an attachment. Only bare filenames inside
/// the processed dir resolve; anything that smells like traversal is a 404
/// so probing leaks nothing.
async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if !storage::is_safe_download_name(&filename) {
        return Err(not_found("file not found"));
    }

    let processed_dir = PathBuf::from(&state.config.system_config.processed_dir);
    let path = processed_dir.join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| not_found("file not found"))?;

    let display_name = attachment_name(&state, &filename);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{display_name}\""),
        )
        .body(Body::from(bytes))
        .map_err(|_| not_found("file not found"))
}

/// Prefer the registry's display name; fall back to stripping the embedded
/// identifier when the registry no longer knows the upload.
fn attachment_name(state: &AppState, stored: &str) -> String {
    let lang = artifact_language(stored).unwrap_or("translated");
    for entry in state.uploads.iter() {
        if stored.contains(&format!("_{}_", entry.id)) {
            let (stem, ext) = entry
                .display_name
                .rsplit_once('.')
                .unwrap_or((entry.display_name.as_str(), "txt"));
            return format!("{stem}_{lang}.{ext}");
        }
    }
    storage::display_name_from_artifact(stored)
}

fn artifact_language(stored: &str) -> Option<&str> {
    let stem = stored.rsplit_once('.').map(|(s, _)| s).unwrap_or(stored);
    stem.rsplit('_').next()
}
