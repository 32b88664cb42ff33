use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::ErrorResponse,
    Json,
};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    api::extractors::OperatorAuth,
    domain::{Bounty, BountyUpdate, NewBounty},
    startup::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct BountyFilter {
    #[serde(default)]
    pub active: bool,
}

pub async fn list_bounties(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BountyFilter>,
) -> Result<Json<Vec<Bounty>>, ErrorResponse> {
    state
        .bounties
        .list_bounties(filter.active)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error listing bounties: {:?}", e);
            e.into()
        })
}

pub async fn create_bounty(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBounty>,
) -> Result<(StatusCode, Json<Bounty>), ErrorResponse> {
    info!("{} is creating bounty {}", operator.name, body.name);
    state
        .bounties
        .create_bounty(body)
        .await
        .map(|bounty| (StatusCode::CREATED, Json(bounty)))
        .map_err(|e| {
            error!("error creating bounty: {:?}", e);
            e.into()
        })
}

pub async fn get_bounty(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
) -> Result<Json<Bounty>, ErrorResponse> {
    state
        .bounties
        .get_bounty(bounty_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting bounty {}: {:?}", bounty_id, e);
            e.into()
        })
}

pub async fn update_bounty(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
    Json(body): Json<BountyUpdate>,
) -> Result<Json<Bounty>, ErrorResponse> {
    state
        .bounties
        .update_bounty(bounty_id, body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error updating bounty {}: {:?}", bounty_id, e);
            e.into()
        })
}

pub async fn delete_bounty(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
) -> Result<StatusCode, ErrorResponse> {
    info!("{} is deleting bounty {}", operator.name, bounty_id);
    state
        .bounties
        .delete_bounty(bounty_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| {
            error!("error deleting bounty {}: {:?}", bounty_id, e);
            e.into()
        })
}
