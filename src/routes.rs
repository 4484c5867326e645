use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ResonateError;
use crate::matching::MatchResult;
use crate::persistance::{CatalogStats, TrackId, TrackStore};
use crate::server::AppState;

pub const NO_MATCH_MESSAGE: &str = "No matching song found in database";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SongMatch {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub confidence: f64,
    pub match_count: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CatalogDebug {
    pub db_songs: u64,
    pub db_fingerprints: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentifyResponse {
    MatchFound { song: SongMatch, debug: CatalogDebug },
    NoMatch { message: String, debug: CatalogDebug },
}

#[derive(Deserialize)]
pub struct FingerprintRequest {
    pub fingerprint: Vec<u32>,
}

pub enum ApiError {
    BadRequest(String),
    Internal(ResonateError),
}

impl From<ResonateError> for ApiError {
    fn from(e: ResonateError) -> Self { ApiError::Internal(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(e) => {
                let status = match e {
                    ResonateError::Extract(_) | ResonateError::Parse(_) =>
                        StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                warn!(error = %e, "request failed");
                (status, e.to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<CatalogStats>, ApiError> {
    Ok(Json(state.identifier.catalog().stats().await?))
}

/// Identify an uploaded clip.
///
/// Expects a form field named `file` containing the audio payload.
pub async fn identify(
    State(state): State<AppState>,
    mut audio: Multipart,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let mut audio_bytes = None;

    while let Some(field) = audio.next_field().await
        .map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            audio_bytes = Some(bytes);
        }
    }

    let audio_bytes = audio_bytes
        .ok_or_else(|| ApiError::BadRequest("missing form field `file`".to_string()))?;

    let upload = tempfile::Builder::new()
        .prefix("resonate-")
        .tempfile()
        .map_err(ResonateError::from)?;
    tokio::fs::write(upload.path(), &audio_bytes).await.map_err(ResonateError::from)?;

    let extracted = state.extractor.extract(upload.path()).await?;
    respond(&state, &extracted.fingerprint).await
}

/// Identify a clip from a raw fingerprint computed by the caller.
pub async fn identify_fingerprint(
    State(state): State<AppState>,
    Json(request): Json<FingerprintRequest>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    respond(&state, &request.fingerprint).await
}

async fn respond(state: &AppState, fingerprint: &[u32]) -> Result<Json<IdentifyResponse>, ApiError> {
    let result = state.identifier.identify(fingerprint).await?;
    let stats = state.identifier.catalog().stats().await?;
    let debug = CatalogDebug { db_songs: stats.songs, db_fingerprints: stats.fingerprints };

    let response = match result {
        Some(found) => IdentifyResponse::MatchFound { song: song_match(found), debug },
        None => IdentifyResponse::NoMatch { message: NO_MATCH_MESSAGE.to_string(), debug },
    };

    Ok(Json(response))
}

fn song_match(found: MatchResult) -> SongMatch {
    SongMatch {
        id: found.track.id,
        title: found.track.title,
        artist: found.track.artist,
        confidence: (found.confidence * 1000.0).round() / 1000.0,
        match_count: found.match_count,
    }
}
