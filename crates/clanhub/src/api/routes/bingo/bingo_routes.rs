use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::ErrorResponse,
    Json,
};
use clanhub_core::ReviewStatus;
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    api::{extractors::OperatorAuth, routes::ReviewRequest, uploads::MultipartForm},
    domain::{
        BingoGame, BingoReview, BingoSubmission, Error, GameVersion, GameView, NewGame,
        TileSubmissionForm,
    },
    startup::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct GameFilter {
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct BingoSubmissionFilter {
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

impl TryFrom<&MultipartForm> for TileSubmissionForm {
    type Error = Error;

    fn try_from(form: &MultipartForm) -> Result<Self, Self::Error> {
        Ok(TileSubmissionForm {
            game_id: form.parse_required("game_id")?,
            team_id: form.parse_required("team_id")?,
            tile_text: form.required("tile_text")?,
            tile_position: form.parse_required("tile_position")?,
            player_id: form.text("player_id"),
            player_name: form.text("player_name").unwrap_or_default(),
            password: form.text("password"),
        })
    }
}

pub async fn list_games(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<GameFilter>,
) -> Result<Json<Vec<BingoGame>>, ErrorResponse> {
    state
        .bingo
        .list_games(filter.archived)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error listing bingo games: {:?}", e);
            e.into()
        })
}

pub async fn create_game(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewGame>,
) -> Result<(StatusCode, Json<GameView>), ErrorResponse> {
    info!("{} is creating bingo game {}", operator.name, body.name);
    state
        .bingo
        .create_game(body)
        .await
        .map(|view| (StatusCode::CREATED, Json(view)))
        .map_err(|e| {
            error!("error creating bingo game: {:?}", e);
            e.into()
        })
}

pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<Json<GameView>, ErrorResponse> {
    state
        .bingo
        .get_game(game_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting bingo game {}: {:?}", game_id, e);
            e.into()
        })
}

pub async fn delete_game(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<StatusCode, ErrorResponse> {
    info!("{} is deleting bingo game {}", operator.name, game_id);
    state
        .bingo
        .delete_game(game_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| {
            error!("error deleting bingo game {}: {:?}", game_id, e);
            e.into()
        })
}

pub async fn set_game_active(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<BingoGame>, ErrorResponse> {
    state
        .bingo
        .set_active(game_id, body.is_active)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error updating bingo game {}: {:?}", game_id, e);
            e.into()
        })
}

pub async fn get_game_version(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<Json<GameVersion>, ErrorResponse> {
    state
        .bingo
        .game_version(game_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting version of bingo game {}: {:?}", game_id, e);
            e.into()
        })
}

pub async fn list_game_submissions(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    Query(filter): Query<BingoSubmissionFilter>,
) -> Result<Json<Vec<BingoSubmission>>, ErrorResponse> {
    state
        .bingo
        .list_submissions(game_id, filter.status)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error listing submissions of bingo game {}: {:?}", game_id, e);
            e.into()
        })
}

/// Player-facing multipart tile claim, gated by the game password when one is set
pub async fn submit_tile(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BingoSubmission>), ErrorResponse> {
    let submission = async {
        let mut form = MultipartForm::read(multipart, state.max_upload_bytes).await?;
        let proof = form.take_proof()?;
        let tile_form = TileSubmissionForm::try_from(&form)?;
        state.bingo.submit_tile(tile_form, proof).await
    }
    .await;

    submission
        .map(|submission| (StatusCode::CREATED, Json(submission)))
        .map_err(|e| {
            error!("error submitting bingo tile: {:?}", e);
            e.into()
        })
}

pub async fn review_bingo_submission(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<BingoReview>, ErrorResponse> {
    info!(
        "{} is reviewing bingo submission {} ({:?})",
        operator.name, submission_id, body.action
    );
    state
        .bingo
        .review_submission(submission_id, body.action)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error reviewing bingo submission {}: {:?}", submission_id, e);
            e.into()
        })
}

pub async fn remove_team_member(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path((team_id, player_name)): Path<(i64, String)>,
) -> Result<StatusCode, ErrorResponse> {
    info!(
        "{} is removing {} from team {}",
        operator.name, player_name, team_id
    );
    state
        .bingo
        .remove_member(team_id, &player_name)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| {
            error!("error removing {} from team {}: {:?}", player_name, team_id, e);
            e.into()
        })
}
