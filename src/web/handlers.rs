use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::error::Error;
use crate::extraction::Extraction;
use crate::models::EventRecord;

const NO_IMAGE: &str = "No image file uploaded.";
const EXTRACTION_FAILED: &str = "Failed to extract event details from the image.";
const NOT_AUTHENTICATED: &str = "User not authenticated.";
const EVENT_ADDED: &str = "Event added to Google Calendar successfully.";

/// A JSON `{"error": ...}` response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    /// Keeps the status axum picked, so an oversized body stays a 413
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("Upload rejected: {}", err.body_text());
        }
        Self::new(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Handler for the index page
pub async fn index_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let logged_in = matches!(
        state.sessions.resolve(&jar).await,
        Some((_, data)) if data.credentials.is_some()
    );

    let auth_links = if logged_in {
        "<a href=\"/logout\">Log out</a>"
    } else {
        "<a href=\"/authorize\">Log in with Google</a>"
    };

    Html(
        include_str!("../../assets/index.html")
            .replace("<!-- AUTH_LINKS -->", auth_links)
            .replace("<!-- LOGGED_IN -->", if logged_in { "true" } else { "false" }),
    )
}

// Handler for API health check
pub async fn health_handler() -> &'static str {
    "OK"
}

/// Start the OAuth flow
pub async fn authorize_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let (session_id, jar) = state
        .sessions
        .resolve_or_create(jar)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let oauth_state = Uuid::new_v4().to_string();
    let url = state
        .oauth
        .authorization_url(&oauth_state)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state
        .sessions
        .update(&session_id, |data| data.oauth_state = Some(oauth_state))
        .await;

    Ok((jar, Redirect::to(&url)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Google redirects here after consent
pub async fn oauth2callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
    let (session_id, data) = state
        .sessions
        .resolve(&jar)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No login in progress."))?;

    if let Some(err) = params.error {
        warn!("Google declined authorization: {}", err);
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {}", err),
        ));
    }

    let expected = data
        .oauth_state
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No login in progress."))?;
    if params.state.as_deref() != Some(expected.as_str()) {
        warn!("OAuth state mismatch for session {}", session_id);
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "OAuth state mismatch."));
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing authorization code."))?;

    let credentials = state.oauth.exchange_code(&code).await.map_err(|e| {
        error!("Failed to exchange authorization code: {}", e);
        ApiError::bad_request(e)
    })?;

    state
        .sessions
        .update(&session_id, |data| {
            data.oauth_state = None;
            data.credentials = Some(credentials);
        })
        .await;

    info!("Session {} logged in to Google Calendar", session_id);
    Ok(Redirect::to("/"))
}

/// Forget the session and its credentials
pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    (state.sessions.end(jar).await, Redirect::to("/"))
}

/// Extract an event from the uploaded `image` field
pub async fn extract_event_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<EventRecord>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field.bytes().await?;
            upload = Some((file_name, data));
        }
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, NO_IMAGE))?;
    info!("Received {} ({} bytes)", file_name, data.len());

    let path = upload_path(&state.upload_dir, &file_name);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        error!("Failed to store upload {}: {}", path.display(), e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, EXTRACTION_FAILED)
    })?;

    let result = state.extractor.extract_event_from_image(&path).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to remove upload {}: {}", path.display(), e);
    }

    match result {
        Ok(Extraction::Extracted(event)) => Ok(Json(event)),
        Ok(Extraction::Rejected(_)) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            EXTRACTION_FAILED,
        )),
        Err(e) => {
            error!("Extraction failed for {}: {}", file_name, e);
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Insert the posted event into the logged-in user's calendar
pub async fn add_event_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let value: Value = serde_json::from_slice(&body).map_err(ApiError::bad_request)?;
    let event = EventRecord::from_value(&value).map_err(ApiError::bad_request)?;

    let (session_id, data) = state
        .sessions
        .resolve(&jar)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, NOT_AUTHENTICATED))?;
    let mut credentials = data
        .credentials
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, NOT_AUTHENTICATED))?;

    if credentials.is_expired(Utc::now().timestamp()) {
        credentials = state
            .oauth
            .refresh(&credentials)
            .await
            .map_err(ApiError::bad_request)?;
        let refreshed = credentials.clone();
        state
            .sessions
            .update(&session_id, |data| data.credentials = Some(refreshed))
            .await;
    }

    let inserted = state
        .calendar
        .insert_event(&credentials.token, &event)
        .await
        .map_err(|e: Error| {
            error!("Failed to add event: {}", e);
            ApiError::bad_request(e)
        })?;

    Ok(Json(json!({
        "message": EVENT_ADDED,
        "htmlLink": inserted.html_link,
    })))
}

/// Unique path under `dir` for an uploaded file, keeping only its base name
fn upload_path(dir: &Path, file_name: &str) -> PathBuf {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    dir.join(format!("{}-{}", Uuid::new_v4(), base))
}
