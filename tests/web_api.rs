#![cfg(feature = "web-interface")]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use calvert::calendar::{Credentials, OAuthClient};
use calvert::config::DEFAULT_MAX_UPLOAD_BYTES;
use calvert::extraction::EventExtractor;
use calvert::web::session::SESSION_COOKIE;
use calvert::web::{router, AppState, SessionService};
use common::{png_bytes, RecordingCalendar, ScriptedModel, VALID_REPLY};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "calvert-test-boundary";

struct TestApp {
    app: Router,
    model: Arc<ScriptedModel>,
    calendar: Arc<RecordingCalendar>,
    sessions: Arc<SessionService>,
    uploads: TempDir,
}

fn test_app(model: ScriptedModel, calendar: RecordingCalendar) -> TestApp {
    test_app_with_upload_limit(model, calendar, DEFAULT_MAX_UPLOAD_BYTES)
}

fn test_app_with_upload_limit(
    model: ScriptedModel,
    calendar: RecordingCalendar,
    max_upload_bytes: usize,
) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let model = Arc::new(model);
    let calendar = Arc::new(calendar);
    let sessions = Arc::new(SessionService::new("test-secret"));

    let state = AppState::new(
        uploads.path().to_path_buf(),
        max_upload_bytes,
        Arc::new(EventExtractor::new(model.clone())),
        calendar.clone(),
        Arc::new(OAuthClient::new(
            "client-id",
            "client-secret",
            "http://localhost:3000/oauth2callback",
        )),
        sessions.clone(),
    );

    TestApp {
        app: router(state),
        model,
        calendar,
        sessions,
        uploads,
    }
}

fn multipart_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/extract-event")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn add_event_request(body: &str, cookie: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/add-event")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Log a session in and return the cookie header naming it
async fn logged_in_cookie(sessions: &SessionService) -> String {
    let id = sessions.create().await;
    sessions
        .update(&id, |data| {
            data.credentials = Some(Credentials {
                token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                token_uri: "https://oauth2.googleapis.com/token".to_string(),
                client_id: "client-id".to_string(),
                scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
                expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            })
        })
        .await;
    let cookie = sessions.cookie(&id).unwrap();
    format!("{}={}", SESSION_COOKIE, cookie.value())
}

#[tokio::test]
async fn test_health() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());

    let response = test
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_index_offers_login() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());

    let response = test
        .app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("/authorize"));
}

#[tokio::test]
async fn test_extract_event_returns_record() {
    let test = test_app(
        ScriptedModel::replying(&[VALID_REPLY]),
        RecordingCalendar::default(),
    );

    let response = test
        .app
        .clone()
        .oneshot(multipart_request("image", "flyer.png", &png_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["summary"], "Test Event");
    assert_eq!(body["start"]["dateTime"], "2023-01-01T00:00:00Z");
    assert_eq!(test.model.calls(), 1);

    // The upload is removed once processed
    assert_eq!(std::fs::read_dir(test.uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_extract_event_without_image() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());

    let response = test
        .app
        .oneshot(multipart_request("file", "flyer.png", &png_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No image file uploaded.");
    assert_eq!(test.model.calls(), 0);
}

#[tokio::test]
async fn test_extract_event_rejected_reply() {
    let test = test_app(
        ScriptedModel::replying(&["I could not find an event"]),
        RecordingCalendar::default(),
    );

    let response = test
        .app
        .oneshot(multipart_request("image", "flyer.png", &png_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Failed to extract event details from the image."
    );
}

#[tokio::test]
async fn test_upload_over_limit_is_payload_too_large() {
    let test = test_app_with_upload_limit(
        ScriptedModel::replying(&[VALID_REPLY]),
        RecordingCalendar::default(),
        64,
    );

    let response = test
        .app
        .oneshot(multipart_request("image", "flyer.png", &[0u8; 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(test.model.calls(), 0);
}

#[tokio::test]
async fn test_upload_larger_than_image_ceiling_is_accepted() {
    // The encoded-size ceiling is applied after decoding, not to the upload
    let test = test_app(
        ScriptedModel::replying(&[VALID_REPLY]),
        RecordingCalendar::default(),
    );
    assert!(DEFAULT_MAX_UPLOAD_BYTES > calvert::extraction::MAX_ENCODED_BYTES);

    let response = test
        .app
        .oneshot(multipart_request("image", "flyer.png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_extract_event_unsupported_upload() {
    let test = test_app(
        ScriptedModel::replying(&[VALID_REPLY]),
        RecordingCalendar::default(),
    );

    let response = test
        .app
        .oneshot(multipart_request("image", "notes.txt", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains(".txt"));
    assert_eq!(test.model.calls(), 0);
}

#[tokio::test]
async fn test_add_event_requires_login() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());

    let response = test
        .app
        .oneshot(add_event_request(VALID_REPLY, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "User not authenticated.");
    assert!(test.calendar.inserted().is_empty());
}

#[tokio::test]
async fn test_add_event_rejects_incomplete_event() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());
    let cookie = logged_in_cookie(&test.sessions).await;

    let response = test
        .app
        .oneshot(add_event_request(r#"{"summary":"Only a title"}"#, Some(cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("description"));
    assert!(test.calendar.inserted().is_empty());
}

#[tokio::test]
async fn test_add_event_inserts_with_session_token() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());
    let cookie = logged_in_cookie(&test.sessions).await;

    let response = test
        .app
        .oneshot(add_event_request(VALID_REPLY, Some(cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Event added to Google Calendar successfully.");
    assert_eq!(body["htmlLink"], "https://calendar.google.com/event?eid=evt1");

    let inserted = test.calendar.inserted();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].0, "access-1");
    assert_eq!(inserted[0].1.summary, "Test Event");
}

#[tokio::test]
async fn test_add_event_calendar_failure() {
    let test = test_app(
        ScriptedModel::default(),
        RecordingCalendar::failing("HTTP 403 - forbidden"),
    );
    let cookie = logged_in_cookie(&test.sessions).await;

    let response = test
        .app
        .oneshot(add_event_request(VALID_REPLY, Some(cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("403"));
}

#[tokio::test]
async fn test_logout_forgets_session() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());
    let cookie = logged_in_cookie(&test.sessions).await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::get("/logout")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let response = test
        .app
        .oneshot(add_event_request(VALID_REPLY, Some(cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_redirects_to_google() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());

    let response = test
        .app
        .oneshot(Request::get("/authorize").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
    assert!(location.contains("state="));
    assert!(response.headers().contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn test_callback_with_wrong_state() {
    let test = test_app(ScriptedModel::default(), RecordingCalendar::default());
    let id = test.sessions.create().await;
    test.sessions
        .update(&id, |data| data.oauth_state = Some("expected".to_string()))
        .await;
    let cookie = format!(
        "{}={}",
        SESSION_COOKIE,
        test.sessions.cookie(&id).unwrap().value()
    );

    let response = test
        .app
        .oneshot(
            Request::get("/oauth2callback?code=abc&state=forged")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
