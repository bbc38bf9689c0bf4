//! Router-level API tests
//!
//! Exercise submission, status polling, retrieval and health through the
//! full router with no external tools configured.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use drumless::config::Config;
use drumless::{build_router, AppState};

fn test_state(dir: &tempfile::TempDir) -> AppState {
    AppState::new(Config::for_tests(dir.path().to_path_buf()))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_process(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Poll a job until it reaches a terminal state, asserting lifecycle
/// invariants on every observation along the way.
async fn poll_until_terminal(app: &axum::Router, job_id: &str) -> Value {
    let rank = |status: &str| match status {
        "pending" => 0,
        "downloading" => 1,
        "processing" => 2,
        "completed" | "failed" => 3,
        other => panic!("unknown status {other}"),
    };
    let mut last_rank = 0;
    let mut last_progress: i64 = -1;

    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/status/{job_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = json_body(response).await;

        let status = job["status"].as_str().unwrap();
        let r = rank(status);
        assert!(r >= last_rank, "status regressed to {status}");
        last_rank = r;

        if let Some(p) = job["progress"].as_i64() {
            assert!(p >= last_progress, "progress regressed: {p} < {last_progress}");
            last_progress = p;
        }

        // downloadUrl iff completed, error iff failed
        assert_eq!(status == "completed", job.get("downloadUrl").is_some());
        assert_eq!(status == "failed", job.get("error").is_some());

        if status == "completed" || status == "failed" {
            return job;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn submit_without_track_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app
        .oneshot(post_process(json!({ "title": "Test Song" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn submit_returns_promptly_and_is_immediately_queryable() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app
        .clone()
        .oneshot(post_process(
            json!({ "trackId": "abc123", "title": "Test Song" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    // Queryable right away, never not-found.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job = json_body(response).await;
    assert_eq!(job["title"], "Test Song");
}

#[tokio::test]
async fn unconfigured_strategies_fail_the_job_with_a_named_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app
        .clone()
        .oneshot(post_process(
            json!({ "trackId": "abc123", "title": "Test Song" }),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let job = poll_until_terminal(&app, &job_id).await;
    assert_eq!(job["status"], "failed");
    let error = job["error"].as_str().unwrap();
    assert!(
        error.contains("no working acquisition strategy"),
        "error should name the absence of a working strategy: {error}"
    );
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app
        .oneshot(get("/api/status/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_job_id_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app.oneshot(get("/api/status/not-a-uuid")).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn serverless_deployment_rejects_submissions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_tests(dir.path().to_path_buf());
    config.serverless = true;
    let app = build_router(AppState::new(config));

    let response = app
        .oneshot(post_process(json!({ "trackId": "abc123", "title": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn download_serves_files_from_the_media_dir_only() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    std::fs::write(dir.path().join("out.mp3"), b"ID3audio").unwrap();
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(get("/api/download/out.mp3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/mpeg"
    );

    let response = app
        .clone()
        .oneshot(get("/api/download/missing.mp3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_traversal_references_cannot_escape() {
    let dir = tempfile::tempdir().unwrap();
    // A file outside the media dir that a traversal would reach.
    let outside = dir.path().join("secret.txt");
    std::fs::write(&outside, b"secret").unwrap();

    let media = dir.path().join("media");
    std::fs::create_dir_all(&media).unwrap();
    let app = build_router(AppState::new(Config::for_tests(media)));

    for reference in [
        "/api/download/..%2Fsecret.txt",
        "/api/download/..%2F..%2Fetc%2Fpasswd",
        "/api/download/..",
    ] {
        let response = app.clone().oneshot(get(reference)).await.unwrap();
        assert!(
            response.status() == StatusCode::NOT_FOUND
                || response.status() == StatusCode::BAD_REQUEST,
            "{reference} must not resolve: got {}",
            response.status()
        );
    }
}

#[tokio::test]
async fn search_requires_a_query() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app.oneshot(get("/api/search")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_module_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "drumless");
    assert_eq!(body["processing_enabled"], true);
}

#[tokio::test]
async fn root_page_serves_html() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(&dir));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));
}
