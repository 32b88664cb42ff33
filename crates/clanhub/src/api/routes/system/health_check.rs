use axum::{extract::State, http::StatusCode, response::ErrorResponse};
use log::error;
use std::sync::Arc;

use crate::startup::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<StatusCode, ErrorResponse> {
    futures::try_join!(state.bounties.ping(), state.bingo.ping())
        .map(|_| StatusCode::OK)
        .map_err(|e| {
            error!("error checking database health: {:?}", e);
            e.into()
        })
}
