use axum::{extract::State, response::ErrorResponse, Json};
use log::{error, info};
use std::sync::Arc;

use crate::{
    api::extractors::OperatorAuth,
    domain::{SettingsUpdate, SubmissionSettings},
    startup::AppState,
};

pub async fn get_settings(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmissionSettings>, ErrorResponse> {
    state.bounties.get_settings().await.map(Json).map_err(|e| {
        error!("error getting settings: {:?}", e);
        e.into()
    })
}

pub async fn update_settings(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SettingsUpdate>,
) -> Result<Json<SubmissionSettings>, ErrorResponse> {
    info!(
        "{} set require_password to {}",
        operator.name, body.require_password
    );
    state
        .bounties
        .update_settings(body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error updating settings: {:?}", e);
            e.into()
        })
}
