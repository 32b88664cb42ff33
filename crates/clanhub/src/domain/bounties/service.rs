use clanhub_core::{validate_required, ReviewAction, ReviewStatus, SubmissionType};
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    Bounty, BountyStore, BountyUpdate, NewBounty, NewSubmission, SettingsUpdate, Submission,
    SubmissionForm, SubmissionReview, SubmissionSettings,
};
use crate::{
    domain::{Error, ProofImage},
    infra::{
        blob::{BlobStore, Bucket},
        webhook::{Notification, Notifier},
    },
};

pub struct BountyService {
    store: BountyStore,
    blob: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
}

impl BountyService {
    pub fn new(store: BountyStore, blob: Arc<dyn BlobStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            blob,
            notifier,
        }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        self.store.ping().await.map_err(Error::DbError)
    }

    pub async fn create_bounty(&self, bounty: NewBounty) -> Result<Bounty, Error> {
        validate_required("name", &bounty.name)?;
        let bounty = self.store.create_bounty(bounty).await?;
        info!("created bounty {} ({})", bounty.name, bounty.tier);
        Ok(bounty)
    }

    pub async fn list_bounties(&self, active_only: bool) -> Result<Vec<Bounty>, Error> {
        self.store.list_bounties(active_only).await
    }

    pub async fn get_bounty(&self, id: i64) -> Result<Bounty, Error> {
        self.store.get_bounty(id).await
    }

    pub async fn update_bounty(&self, id: i64, update: BountyUpdate) -> Result<Bounty, Error> {
        if let Some(name) = &update.name {
            validate_required("name", name)?;
        }
        self.store.update_bounty(id, update).await
    }

    pub async fn delete_bounty(&self, id: i64) -> Result<(), Error> {
        self.store.delete_bounty(id).await?;
        info!("deleted bounty {}", id);
        Ok(())
    }

    /// Player-facing submission of a bounty claim or personal best
    pub async fn create_submission(
        &self,
        form: SubmissionForm,
        proof: ProofImage,
    ) -> Result<Submission, Error> {
        validate_required("player_name", &form.player_name)?;
        self.check_submission_password(form.password.as_deref())
            .await?;

        let submission_type = form.submission_type.unwrap_or(SubmissionType::Bounty);
        let bounty_name = form
            .bounty_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from);

        let (bounty_tier, pb_category, pb_time) = match submission_type {
            SubmissionType::Bounty => {
                let name = bounty_name.as_deref().ok_or_else(|| {
                    Error::BadRequest(String::from("bounty_name is required for bounty claims"))
                })?;
                let bounty = self.store.find_active_bounty(name).await?.ok_or_else(|| {
                    Error::BadRequest(format!("no active bounty named {}", name))
                })?;
                (Some(bounty.tier), None, None)
            }
            SubmissionType::PersonalBest => {
                let category = form.pb_category.unwrap_or_default();
                let time = form.pb_time.unwrap_or_default();
                validate_required("pb_category", &category)?;
                validate_required("pb_time", &time)?;
                (None, Some(category.trim().to_string()), Some(time.trim().to_string()))
            }
        };

        let object_name = format!("{}.{}", Uuid::now_v7(), proof.image_type.extension());
        let proof_url = self
            .blob
            .upload(Bucket::AchievementProofs, &object_name, proof.bytes)
            .await?;

        let submission = self
            .store
            .insert_submission(NewSubmission {
                player_name: form.player_name.trim().to_string(),
                player_id: form.player_id,
                submission_type,
                proof_url,
                bounty_name,
                bounty_tier,
                pb_category,
                pb_time,
            })
            .await?;
        info!(
            "new {} submission {} from {}",
            submission.submission_type, submission.id, submission.player_name
        );

        self.notify(submission_notification(&submission)).await;

        Ok(submission)
    }

    async fn check_submission_password(&self, provided: Option<&str>) -> Result<(), Error> {
        let settings = self.store.get_settings().await?;
        if !settings.require_password {
            return Ok(());
        }
        match (settings.submission_password.as_deref(), provided) {
            (Some(expected), Some(provided)) if expected == provided => Ok(()),
            _ => Err(Error::Unauthorized(String::from(
                "invalid submission password",
            ))),
        }
    }

    pub async fn get_submission(&self, id: i64) -> Result<Submission, Error> {
        self.store.get_submission(id).await
    }

    pub async fn list_submissions(
        &self,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<Submission>, Error> {
        self.store.list_submissions(status).await
    }

    pub async fn review_submission(
        &self,
        id: i64,
        action: ReviewAction,
    ) -> Result<SubmissionReview, Error> {
        let review = self.store.review_submission(id, action).await?;
        let submission = &review.submission;
        info!(
            "submission {} from {} is now {}",
            submission.id, submission.player_name, submission.status
        );

        if submission.status == ReviewStatus::Approved
            && submission.submission_type == SubmissionType::Bounty
        {
            match &review.archived_bounty {
                Some(bounty) => info!("archived bounty {} ({})", bounty.name, bounty.id),
                None => warn!(
                    "approved submission {} but no active bounty matched {:?}",
                    submission.id, submission.bounty_name
                ),
            }
        }

        Ok(review)
    }

    /// Attach the in-game trade screenshot to an approved bounty submission
    pub async fn attach_trade_proof(&self, id: i64, proof: ProofImage) -> Result<Submission, Error> {
        let submission = self.store.get_submission(id).await?;
        if submission.status != ReviewStatus::Approved
            || submission.submission_type != SubmissionType::Bounty
        {
            return Err(Error::BadRequest(format!(
                "submission {} is not an approved bounty submission",
                id
            )));
        }

        let object_name = format!("{}-{}.{}", id, Uuid::now_v7(), proof.image_type.extension());
        let url = self
            .blob
            .upload(Bucket::TradeProofs, &object_name, proof.bytes)
            .await?;

        self.store.set_trade_proof(id, url).await
    }

    pub async fn get_settings(&self) -> Result<SubmissionSettings, Error> {
        self.store.get_settings().await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SubmissionSettings, Error> {
        let password = update
            .submission_password
            .as_deref()
            .map(str::trim)
            .filter(|password| !password.is_empty())
            .map(String::from);
        if update.require_password && password.is_none() {
            return Err(Error::BadRequest(String::from(
                "a submission password is required when require_password is set",
            )));
        }

        self.store
            .update_settings(SettingsUpdate {
                require_password: update.require_password,
                submission_password: password,
            })
            .await
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            error!("failed to send submission notification: {}", e);
        }
    }
}

fn submission_notification(submission: &Submission) -> Notification {
    let notification = match submission.submission_type {
        SubmissionType::Bounty => Notification::new(
            "New bounty submission",
            format!(
                "{} claimed {}",
                submission.player_name,
                submission.bounty_name.as_deref().unwrap_or("a bounty")
            ),
        )
        .field(
            "Tier",
            submission
                .bounty_tier
                .map(|tier| tier.to_string())
                .unwrap_or_default(),
        ),
        SubmissionType::PersonalBest => Notification::new(
            "New personal best submission",
            format!(
                "{} submitted {}",
                submission.player_name,
                submission.pb_category.as_deref().unwrap_or_default()
            ),
        )
        .field("Time", submission.pb_time.clone().unwrap_or_default()),
    };

    notification.image(submission.proof_url.clone())
}
