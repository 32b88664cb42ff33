use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::ErrorResponse,
    Json,
};
use clanhub_core::{ReviewAction, ReviewStatus};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    api::{extractors::OperatorAuth, uploads::MultipartForm},
    domain::{Error, Submission, SubmissionForm, SubmissionReview},
    startup::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionFilter {
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
}

impl TryFrom<&MultipartForm> for SubmissionForm {
    type Error = Error;

    fn try_from(form: &MultipartForm) -> Result<Self, Self::Error> {
        Ok(SubmissionForm {
            player_name: form.text("player_name").unwrap_or_default(),
            player_id: form.text("player_id"),
            submission_type: form.parse("submission_type")?,
            bounty_name: form.text("bounty_name"),
            pb_category: form.text("pb_category"),
            pb_time: form.text("pb_time"),
            password: form.text("password"),
        })
    }
}

/// Player-facing multipart upload: text fields plus a `proof` image
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>), ErrorResponse> {
    let submission = async {
        let mut form = MultipartForm::read(multipart, state.max_upload_bytes).await?;
        let proof = form.take_proof()?;
        let submission_form = SubmissionForm::try_from(&form)?;
        state
            .bounties
            .create_submission(submission_form, proof)
            .await
    }
    .await;

    submission
        .map(|submission| (StatusCode::CREATED, Json(submission)))
        .map_err(|e| {
            error!("error creating submission: {:?}", e);
            e.into()
        })
}

pub async fn list_submissions(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SubmissionFilter>,
) -> Result<Json<Vec<Submission>>, ErrorResponse> {
    state
        .bounties
        .list_submissions(filter.status)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error listing submissions: {:?}", e);
            e.into()
        })
}

pub async fn get_submission(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<i64>,
) -> Result<Json<Submission>, ErrorResponse> {
    state
        .bounties
        .get_submission(submission_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting submission {}: {:?}", submission_id, e);
            e.into()
        })
}

pub async fn review_submission(
    OperatorAuth { operator }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<SubmissionReview>, ErrorResponse> {
    info!(
        "{} is reviewing submission {} ({:?})",
        operator.name, submission_id, body.action
    );
    state
        .bounties
        .review_submission(submission_id, body.action)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error reviewing submission {}: {:?}", submission_id, e);
            e.into()
        })
}

pub async fn attach_trade_proof(
    OperatorAuth { .. }: OperatorAuth,
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Submission>, ErrorResponse> {
    let submission = async {
        let mut form = MultipartForm::read(multipart, state.max_upload_bytes).await?;
        let proof = form.take_proof()?;
        state
            .bounties
            .attach_trade_proof(submission_id, proof)
            .await
    }
    .await;

    submission.map(Json).map_err(|e| {
        error!("error attaching trade proof to {}: {:?}", submission_id, e);
        e.into()
    })
}
