//! Route tests driven through `tower::ServiceExt::oneshot`: mocked LLM, real
//! renderer, filesystem store in a temp dir.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bookgen::server::{build_router, AppState};
use bookgen_core::contract::{MockCompletionClient, Prompt};
use bookgen_core::render::PdfBookRenderer;
use bookgen_core::contract::ArtifactStore;
use bookgen_core::storage::{ArtifactKey, FilesystemStore};
use bookgen_core::PipelineConfig;
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const OUTLINE: &str = r#"{"Introduction to AI": ["What is AI", "History of AI"]}"#;

fn is_outline(p: &Prompt) -> bool {
    p.system.contains("in JSON format")
}

fn working_client() -> MockCompletionClient {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .withf(is_outline)
        .returning(|_| Ok(OUTLINE.to_string()));
    client
        .expect_complete()
        .returning(|_| Ok("Artificial Intelligence is a branch of computer science.".to_string()));
    client
}

async fn app_with(client: MockCompletionClient, isolate_requests: bool) -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let store = FilesystemStore::new(dir.path()).await.unwrap();
    let state = AppState::new(
        Arc::new(client),
        Arc::new(PdfBookRenderer::default()),
        Arc::new(store),
        PipelineConfig {
            max_concurrent_requests: None,
            isolate_requests,
        },
    );
    (build_router(state), dir)
}

fn generate_request(form_body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn generate_then_download_pdf() {
    let (app, dir) = app_with(working_client(), false).await;

    let response = app
        .clone()
        .oneshot(generate_request("book_title=AI+Book"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filename"], "AI_Book.pdf");
    assert!(dir.path().join("AI_Book.pdf").is_file());
    assert!(dir.path().join("AI_Book.book.json").is_file());
    assert!(dir.path().join("outline.json").is_file());

    let response = app.oneshot(get("/download/AI_Book.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"AI_Book.pdf\"; filename*=UTF-8''AI_Book.pdf"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[0..4], b"%PDF");
}

#[tokio::test]
async fn isolated_request_returns_namespaced_filename() {
    let (app, _dir) = app_with(working_client(), true).await;

    let response = app
        .clone()
        .oneshot(generate_request("book_title=AI%3A+What+Now%3F"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let filename = json_body(response).await["filename"]
        .as_str()
        .unwrap()
        .to_string();
    let (namespace, name) = filename.split_once('/').expect("namespaced filename");
    assert_eq!(name, "AI-_What_Now.pdf");
    assert_eq!(namespace.len(), 36);

    let response = app
        .oneshot(get(&format!("/download/{filename}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn blank_or_missing_title_is_bad_request() {
    for form in ["book_title=+++", ""] {
        let mut client = MockCompletionClient::new();
        client.expect_complete().never();
        let (app, _dir) = app_with(client, true).await;

        let response = app.oneshot(generate_request(form)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "form {form:?}");
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn outline_failure_is_server_error_with_message() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .times(1)
        .returning(|_| Err("invalid api key".into()));
    let (app, _dir) = app_with(client, true).await;

    let response = app
        .oneshot(generate_request("book_title=Doomed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("invalid api key"), "got: {error}");
}

#[tokio::test]
async fn malformed_outline_is_server_error() {
    let mut client = MockCompletionClient::new();
    client
        .expect_complete()
        .times(1)
        .returning(|_| Ok("Sure! Here is your outline:".to_string()));
    let (app, _dir) = app_with(client, true).await;

    let response = app
        .oneshot(generate_request("book_title=Chatty"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unknown_download_is_not_found() {
    let (app, _dir) = app_with(MockCompletionClient::new(), true).await;

    let response = app.oneshot(get("/download/missing.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "File not found");
}

#[tokio::test]
async fn traversal_download_is_rejected() {
    let (app, _dir) = app_with(MockCompletionClient::new(), true).await;

    for uri in ["/download/../secret.pdf", "/download/a/b/c.pdf", "/download/%2E%2E/x.pdf"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
    }
}

#[tokio::test]
async fn health_and_index() {
    let (app, _dir) = app_with(MockCompletionClient::new(), true).await;

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("/generate"));
}

#[tokio::test]
async fn control_character_title_stays_downloadable() {
    let (app, _dir) = app_with(working_client(), false).await;

    let response = app
        .clone()
        .oneshot(generate_request("book_title=A%01B"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["filename"], "A_B.pdf");

    let response = app.oneshot(get("/download/A_B.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"A_B.pdf\"; filename*=UTF-8''A_B.pdf"
    );
}

#[tokio::test]
async fn quote_in_stored_name_is_escaped_in_header() {
    let (app, dir) = app_with(MockCompletionClient::new(), false).await;
    let store = FilesystemStore::new(dir.path()).await.unwrap();
    let key = ArtifactKey::new(None, "a\"b.pdf").unwrap();
    store.put(&key, b"%PDF-1.3").await.unwrap();

    let response = app.oneshot(get("/download/a%22b.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"a_b.pdf\"; filename*=UTF-8''a%22b.pdf"
    );
}

#[tokio::test]
async fn non_ascii_title_downloads_with_encoded_name() {
    let (app, _dir) = app_with(working_client(), false).await;

    let response = app
        .clone()
        .oneshot(generate_request("book_title=Caf%C3%A9+Society"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["filename"], "Café_Society.pdf");

    let response = app
        .oneshot(get("/download/Caf%C3%A9_Society.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Caf__Society.pdf\"; filename*=UTF-8''Caf%C3%A9_Society.pdf"
    );
}

#[tokio::test]
async fn title_with_no_usable_characters_is_bad_request() {
    let mut client = MockCompletionClient::new();
    client.expect_complete().never();
    let (app, _dir) = app_with(client, true).await;

    let response = app
        .oneshot(generate_request("book_title=%3F%3F%3F"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
