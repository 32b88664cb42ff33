use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
};
use tower::ServiceExt;

use crate::helpers::{MockStatsClient, TestApp, PNG_BYTES};

#[tokio::test]
async fn test_health_check() {
    let test_app = TestApp::new(MockStatsClient::new()).await;

    let (status, _) = test_app.get("/api/v1/health_check").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_operator_routes_require_a_known_token() {
    let test_app = TestApp::new(MockStatsClient::new()).await;

    let (status, body) = test_app.get("/api/v1/settings").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing bearer token");

    let request = Request::get("/api/v1/settings")
        .header("authorization", "Bearer not-the-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = test_app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unknown operator token");

    let (status, body) = test_app.operator_get("/api/v1/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["require_password"], false);
}

#[tokio::test]
async fn test_media_serves_stored_proofs() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let stored = test_app.media_folder.join("bingo-proofs").join("1-2-3.png");
    tokio::fs::write(&stored, PNG_BYTES).await.unwrap();

    let response = test_app
        .router
        .clone()
        .oneshot(
            Request::get("/media/bingo-proofs/1-2-3.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");

    let (status, _) = test_app.get("/media/bingo-proofs/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test_app.get("/media/secrets/1-2-3.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test_app.get("/media/bingo-proofs/.env").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
