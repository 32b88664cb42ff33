use axum::{
    extract::{Path, State},
    response::ErrorResponse,
    Json,
};
use log::{error, info};
use std::sync::Arc;

use crate::{
    api::extractors::OperatorAuth,
    domain::{ClanSnapshot, PlayerSyncStep},
    startup::AppState,
};

pub async fn get_clan_snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClanSnapshot>, ErrorResponse> {
    state
        .clan
        .snapshot()
        .await
        .map(|snapshot| Json(snapshot.as_ref().clone()))
        .map_err(|e| {
            error!("error getting clan snapshot: {:?}", e);
            e.into()
        })
}

pub async fn refresh_clan(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClanSnapshot>, ErrorResponse> {
    info!("clan refresh requested by {}", operator.name);
    state
        .clan
        .refresh()
        .await
        .map(|snapshot| Json(snapshot.as_ref().clone()))
        .map_err(|e| {
            error!("error refreshing clan snapshot: {:?}", e);
            e.into()
        })
}

pub async fn sync_player(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<PlayerSyncStep>, ErrorResponse> {
    state
        .clan
        .sync_player_step(index)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error syncing player {}: {:?}", index, e);
            e.into()
        })
}
