use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::helpers::{operator_request, MockStatsClient, TestApp, PNG_BYTES};

async fn create_lockout_game(test_app: &TestApp) -> Value {
    let (status, view) = test_app
        .operator_json(
            Method::POST,
            "/api/v1/bingo/games",
            json!({
                "name": "Summer bingo",
                "mode": "lockout",
                "board_size": 2,
                "tile_pool": "Dragon warhammer\n\nTwisted bow\nElder maul\nPet\nAny mega rare\n",
                "password": "gielinor",
                "teams": [
                    { "name": "Red", "members": ["Bob", "Cat"] },
                    { "members": ["Amy"] }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    view
}

async fn submit_tile(
    test_app: &TestApp,
    game: &Value,
    team_index: usize,
    position: usize,
    password: &str,
) -> (StatusCode, Value) {
    let game_id = game["game"]["id"].to_string();
    let team_id = game["teams"][team_index]["id"].to_string();
    let position_text = position.to_string();
    let tile_text = game["shared_board"]["tiles"][position]["text"]
        .as_str()
        .unwrap()
        .to_string();

    test_app
        .upload(
            "/api/v1/bingo/submissions",
            &[
                ("game_id", game_id.as_str()),
                ("team_id", team_id.as_str()),
                ("tile_text", tile_text.as_str()),
                ("tile_position", position_text.as_str()),
                ("player_name", "Bob"),
                ("password", password),
            ],
            Some(("image/png", PNG_BYTES)),
            false,
        )
        .await
}

#[tokio::test]
async fn test_create_lockout_game() {
    let test_app = TestApp::new(MockStatsClient::new()).await;

    let view = create_lockout_game(&test_app).await;

    assert_eq!(view["game"]["requires_password"], true);
    assert!(view["game"].get("password").is_none());
    assert_eq!(view["teams"][0]["name"], "Red");
    assert_eq!(view["teams"][1]["name"], "Team 2");
    assert_eq!(view["teams"][0]["members"], json!(["Bob", "Cat"]));
    assert!(view["team_boards"].is_null());

    let tiles = view["shared_board"]["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 4);
    for (position, tile) in tiles.iter().enumerate() {
        assert_eq!(tile["position"], position);
        assert_eq!(tile["status"], "incomplete");
    }

    let (status, body) = test_app
        .operator_json(
            Method::POST,
            "/api/v1/bingo/games",
            json!({
                "name": "Too big",
                "mode": "standard",
                "board_size": 3,
                "tile_pool": "a\nb\nc"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_tile_submission_and_approval() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let game = create_lockout_game(&test_app).await;
    let game_id = game["game"]["id"].as_i64().unwrap();

    let (status, _) = submit_tile(&test_app, &game, 0, 1, "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, submission) = submit_tile(&test_app, &game, 0, 1, "gielinor").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submission["status"], "pending");
    assert!(submission.get("proof_name").is_none());

    let (status, pending) = test_app
        .operator_get(&format!(
            "/api/v1/bingo/games/{}/submissions?status=pending",
            game_id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (_, before) = test_app
        .get(&format!("/api/v1/bingo/games/{}/version", game_id))
        .await;

    let (status, review) = test_app
        .operator_json(
            Method::POST,
            &format!("/api/v1/bingo/submissions/{}/review", submission["id"]),
            json!({ "action": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["tile"]["status"], "approved");
    assert_eq!(review["team_score"], 1);
    assert_eq!(review["game_archived"], false);

    let (_, after) = test_app
        .get(&format!("/api/v1/bingo/games/{}/version", game_id))
        .await;
    assert!(after["version"].as_i64().unwrap() > before["version"].as_i64().unwrap());

    // the other team cannot claim a locked tile
    let (status, _) = submit_tile(&test_app, &game, 1, 1, "gielinor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, view) = test_app
        .get(&format!("/api/v1/bingo/games/{}", game_id))
        .await;
    assert_eq!(view["teams"][0]["score"], 1);
    assert_eq!(
        view["shared_board"]["tiles"][1]["team_id"],
        game["teams"][0]["id"]
    );
}

#[tokio::test]
async fn test_lockout_win_closes_the_game() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let game = create_lockout_game(&test_app).await;
    let game_id = game["game"]["id"].as_i64().unwrap();

    let mut last_review = Value::Null;
    for position in 0..3 {
        let (status, submission) =
            submit_tile(&test_app, &game, 0, position, "gielinor").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, review) = test_app
            .operator_json(
                Method::POST,
                &format!("/api/v1/bingo/submissions/{}/review", submission["id"]),
                json!({ "action": "approve" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        last_review = review;
    }

    assert_eq!(last_review["game_archived"], true);
    assert_eq!(last_review["winner_team_id"], game["teams"][0]["id"]);

    let (_, archived) = test_app.get("/api/v1/bingo/games?archived=true").await;
    assert_eq!(archived[0]["id"], game_id);
    let (_, active) = test_app.get("/api/v1/bingo/games").await;
    assert!(active.as_array().unwrap().is_empty());

    let (status, _) = submit_tile(&test_app, &game, 1, 3, "gielinor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = test_app
        .operator_json(
            Method::PUT,
            &format!("/api/v1/bingo/games/{}/active", game_id),
            json!({ "is_active": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_game_administration() {
    let test_app = TestApp::new(MockStatsClient::new()).await;
    let game = create_lockout_game(&test_app).await;
    let game_id = game["game"]["id"].as_i64().unwrap();
    let red_id = game["teams"][0]["id"].as_i64().unwrap();

    let (status, closed) = test_app
        .operator_json(
            Method::PUT,
            &format!("/api/v1/bingo/games/{}/active", game_id),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["is_active"], false);

    let (status, _) = test_app
        .send(operator_request(
            Method::DELETE,
            &format!("/api/v1/bingo/teams/{}/members/Bob", red_id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, view) = test_app
        .get(&format!("/api/v1/bingo/games/{}", game_id))
        .await;
    assert_eq!(view["teams"][0]["members"], json!(["Cat"]));

    let (status, _) = test_app
        .send(operator_request(
            Method::DELETE,
            &format!("/api/v1/bingo/games/{}", game_id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = test_app
        .get(&format!("/api/v1/bingo/games/{}", game_id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
