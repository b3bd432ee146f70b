use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use bookgen_core::run_pipeline;
use bookgen_core::storage::ArtifactKey;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::{Result, ServiceError};
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub book_title: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Download path, relative to `/download/`.
    pub filename: String,
}

/// Run the whole pipeline for one title and return the download path.
pub async fn generate(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Result<Json<GenerateResponse>> {
    tracing::info!(book_title = %form.book_title, "Generation request received");

    let artifact = run_pipeline(
        state.client.as_ref(),
        state.renderer.clone(),
        state.store.as_ref(),
        &state.pipeline,
        &form.book_title,
    )
    .await?;

    tracing::info!(
        request_id = %artifact.request_id,
        filename = %artifact.download_path(),
        dropped = artifact
            .subchapters_requested
            .saturating_sub(artifact.subchapters_generated),
        "Generation request completed"
    );
    Ok(Json(GenerateResponse {
        filename: artifact.download_path(),
    }))
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Bytes outside RFC 5987 `attr-char`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` with an ASCII `filename` fallback and the exact name in
/// `filename*` (RFC 6266), so any stored name yields a valid header.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        utf8_percent_encode(name, ATTR_CHAR)
    )
}

/// Serve a stored artifact as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    let key = ArtifactKey::from_download_path(&path)?;
    let bytes = state.store.get(&key).await?;
    tracing::info!(key = %key, size = bytes.len(), "Artifact downloaded");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(key.name()))
        .header(header::CONTENT_DISPOSITION, content_disposition(key.name()))
        .body(Body::from(bytes))
        .map_err(|e| ServiceError::Internal(format!("Failed to build response: {e}")))
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
