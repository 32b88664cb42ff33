use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::helpers::{MockStatsClient, TestApp, PNG_BYTES};

async fn create_bounty(test_app: &TestApp, name: &str, tier: &str) -> i64 {
    let (status, body) = test_app
        .operator_json(
            Method::POST,
            "/api/v1/bounties",
            json!({ "name": name, "tier": tier }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_bounty_claim_approval_archives_the_bounty() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let bounty_id = create_bounty(&test_app, "Zulrah", "medium").await;

    let (status, submission) = test_app
        .upload(
            "/api/v1/submissions",
            &[("player_name", "Bob"), ("bounty_name", "zulrah")],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submission["status"], "pending");
    assert_eq!(submission["bounty_tier"], "medium");
    let submission_id = submission["id"].as_i64().unwrap();

    let (status, pending) = test_app
        .operator_get("/api/v1/submissions?status=pending")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let review_uri = format!("/api/v1/submissions/{}/review", submission_id);
    let (status, review) = test_app
        .operator_json(Method::POST, &review_uri, json!({ "action": "approve" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["submission"]["status"], "approved");
    assert_eq!(review["archived_bounty"]["id"], bounty_id);

    let (_, active) = test_app.get("/api/v1/bounties?active=true").await;
    assert!(active.as_array().unwrap().is_empty());
    let (_, bounty) = test_app
        .get(&format!("/api/v1/bounties/{}", bounty_id))
        .await;
    assert_eq!(bounty["is_active"], false);

    let (status, _) = test_app
        .operator_json(Method::POST, &review_uri, json!({ "action": "reject" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, with_trade) = test_app
        .upload(
            &format!("/api/v1/submissions/{}/trade_proof", submission_id),
            &[],
            Some(("image/webp", PNG_BYTES)),
            true,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(with_trade["trade_proof_url"]
        .as_str()
        .unwrap()
        .contains("/trade-proofs/"));
}

#[tokio::test]
async fn test_personal_best_approval_leaves_bounties_alone() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    create_bounty(&test_app, "Inferno", "high").await;

    let (status, submission) = test_app
        .upload(
            "/api/v1/submissions",
            &[
                ("player_name", "Amy"),
                ("submission_type", "personal_best"),
                ("pb_category", "Inferno"),
                ("pb_time", "58:12"),
            ],
            Some(("image/jpeg", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, review) = test_app
        .operator_json(
            Method::POST,
            &format!("/api/v1/submissions/{}/review", submission["id"]),
            json!({ "action": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(review["archived_bounty"].is_null());

    let (_, active) = test_app.get("/api/v1/bounties?active=true").await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submission_password_gate() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    create_bounty(&test_app, "Vorkath", "low").await;
    let fields = [
        ("player_name", "Bob"),
        ("bounty_name", "Vorkath"),
    ];

    let (status, _) = test_app
        .operator_json(
            Method::PUT,
            "/api/v1/settings",
            json!({ "require_password": true, "submission_password": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, settings) = test_app
        .operator_json(
            Method::PUT,
            "/api/v1/settings",
            json!({ "require_password": true, "submission_password": "hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["require_password"], true);

    let (status, _) = test_app
        .upload(
            "/api/v1/submissions",
            &fields,
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut with_password = fields.to_vec();
    with_password.push(("password", "hunter2"));
    let (status, submission) = test_app
        .upload(
            "/api/v1/submissions",
            &with_password,
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submission["bounty_tier"], "low");
}

#[tokio::test]
async fn test_submission_proof_is_checked() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let fields = [
        ("player_name", "Bob"),
        ("bounty_name", "Vorkath"),
    ];

    let (status, body) = test_app
        .upload("/api/v1/submissions", &fields, None, false)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "proof image is required");

    let (status, _) = test_app
        .upload(
            "/api/v1/submissions",
            &fields,
            Some(("text/plain", &b"not an image"[..])),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = test_app
        .upload(
            "/api/v1/submissions",
            &[("player_name", "Bob"), ("bounty_name", "Unknown boss")],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_awarded_bounty_rejects_further_claims() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    create_bounty(&test_app, "Zulrah", "low").await;

    let (status, submission) = test_app
        .upload(
            "/api/v1/submissions",
            &[("player_name", "Bob"), ("bounty_name", "Zulrah")],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, review) = test_app
        .operator_json(
            Method::POST,
            &format!("/api/v1/submissions/{}/review", submission["id"]),
            json!({ "action": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["archived_bounty"]["name"], "Zulrah");

    let (status, body) = test_app
        .upload(
            "/api/v1/submissions",
            &[
                ("player_name", "Amy"),
                ("bounty_name", "Zulrah"),
                ("bounty_tier", "high"),
            ],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no active bounty named Zulrah");

    let (_, all) = test_app.operator_get("/api/v1/submissions").await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bounty_update_and_delete() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let bounty_id = create_bounty(&test_app, "Nex", "high").await;
    let uri = format!("/api/v1/bounties/{}", bounty_id);

    let (status, updated) = test_app
        .operator_json(
            Method::PUT,
            &uri,
            json!({ "name": "Nex duo", "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Nex duo");
    assert_eq!(updated["tier"], "high");
    assert_eq!(updated["is_active"], false);

    let (status, _) = test_app
        .operator_json(Method::PUT, &uri, json!({ "tier": "low" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = test_app
        .send(crate::helpers::operator_request(Method::DELETE, &uri, None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = test_app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
