use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;

use crate::helpers::{member, MockStatsClient, TestApp, GROUP_ID, PNG_BYTES};

fn roster_stats() -> MockStatsClient {
    let mut stats = MockStatsClient::new();
    stats
        .expect_group_members()
        .withf(|group_id| *group_id == GROUP_ID)
        .returning(|_| Ok(vec![member(1, "Bob", 30.0), member(2, "Amy", 8.0)]));
    stats
        .expect_update_player()
        .returning(|name| Ok(member(1, name, 30.0)));
    stats
}

#[tokio::test]
async fn test_snapshot_is_missing_until_first_refresh() {
    let test_app = TestApp::new(roster_stats()).await;

    let (status, _) = test_app.get("/api/v1/clan/snapshot").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::post("/api/v1/clan/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, _) = test_app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_ranks_members_with_approved_bounties() {
    let test_app = TestApp::new(roster_stats()).await;
    let (status, _) = test_app
        .operator_json(
            Method::POST,
            "/api/v1/bounties",
            json!({ "name": "Zulrah", "tier": "low" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, submission) = test_app
        .upload(
            "/api/v1/submissions",
            &[
                ("player_name", "BOB"),
                ("bounty_name", "Zulrah"),
            ],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await;
    let (status, _) = test_app
        .operator_json(
            Method::POST,
            &format!("/api/v1/submissions/{}/review", submission["id"]),
            json!({ "action": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, refreshed) = test_app
        .operator_json(Method::POST, "/api/v1/clan/refresh", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["member_count"], 2);
    assert_eq!(refreshed["top_ehb"][0]["display_name"], "Bob");

    let bob = &refreshed["ranked_members"][0];
    assert_eq!(bob["display_name"], "Bob");
    assert_eq!(bob["rank"], "Sapphire");
    assert_eq!(bob["bounties"]["low"], 1);
    assert_eq!(refreshed["ranked_members"][1]["rank"], "Backpack");

    let (status, cached) = test_app.get("/api/v1/clan/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached, refreshed);
}

#[tokio::test]
async fn test_sync_steps_through_the_roster() {
    let test_app = TestApp::new(roster_stats()).await;

    let (status, step) = test_app
        .operator_json(Method::POST, "/api/v1/clan/sync/0", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(step["next_index"], 1);
    assert_eq!(step["total"], 2);
    assert_eq!(step["done"], false);

    let (_, step) = test_app
        .operator_json(Method::POST, "/api/v1/clan/sync/1", json!({}))
        .await;
    assert_eq!(step["done"], true);
}
