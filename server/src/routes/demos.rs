// demo file download streaming

use crate::error::{ApiError, ApiResult};
use app_core::CoreError;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, header},
    response::Response,
};
use axum_extra::routing::TypedPath;
use serde::Deserialize;
use shared::AppState;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::instrument;

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/demos/{slug}/download")]
pub struct DemoDownloadPath {
    pub slug: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/demos/{slug}/download/{map_number}")]
pub struct DemoMapDownloadPath {
    pub slug: String,
    pub map_number: u32,
}

#[instrument(name = "demos.download", skip(state))]
pub async fn download_latest(
    DemoDownloadPath { slug }: DemoDownloadPath,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let relative = demo_relative_path(&state, &slug, None).await?;
    stream_demo(&state, &slug, &relative).await
}

#[instrument(name = "demos.download_map", skip(state))]
pub async fn download_map(
    DemoMapDownloadPath { slug, map_number }: DemoMapDownloadPath,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let relative = demo_relative_path(&state, &slug, Some(map_number)).await?;
    stream_demo(&state, &slug, &relative).await
}

async fn demo_relative_path(
    state: &AppState,
    slug: &str,
    map_number: Option<u32>,
) -> Result<String, ApiError> {
    let m = state
        .core
        .get_match(slug)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("match {slug}"))))?;
    let path = match map_number {
        Some(n) => m
            .get_map_results()
            .iter()
            .find(|r| r.map_number == n)
            .and_then(|r| r.demo_file_path.clone()),
        None => m.get_demo_file_paths().last().cloned(),
    };
    path.ok_or_else(|| ApiError(CoreError::NotFound(format!("no demo recorded for {slug}"))))
}

async fn stream_demo(state: &AppState, slug: &str, relative: &str) -> ApiResult<Response> {
    let root: &PathBuf = &state.demo_dir;
    let candidate = root.join(relative);
    // demo paths come from the event pipeline; refuse anything escaping
    // the demo root
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| ApiError(CoreError::NotFound(format!("demo file for {slug}"))))?;
    let root_resolved = tokio::fs::canonicalize(root)
        .await
        .map_err(|_| ApiError(CoreError::NotFound("demo directory".into())))?;
    if !resolved.starts_with(&root_resolved) {
        return Err(ApiError(CoreError::Conflict(
            "demo path escapes the demo directory".into(),
        )));
    }

    let file = tokio::fs::File::open(&resolved)
        .await
        .map_err(|_| ApiError(CoreError::NotFound(format!("demo file for {slug}"))))?;
    let stream = ReaderStream::new(file);

    let filename = Path::new(relative)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("demo.dem")
        .to_string();
    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
