use clanhub_core::{ReviewAction, ReviewStatus};
use sqlx::{sqlite::SqliteRow, Row};
use time::OffsetDateTime;

use super::{
    Bounty, BountyClaim, BountyUpdate, NewBounty, NewSubmission, SettingsUpdate, Submission,
    SubmissionReview, SubmissionSettings,
};
use crate::{
    domain::Error,
    infra::db::{format_datetime, parse_required_enum, DBConnection},
};

const BOUNTY_COLUMNS: &str = "id, name, tier, image_url, is_active, created_at";

const SUBMISSION_COLUMNS: &str = "id, player_name, player_id, submission_type, status, proof_url,
    bounty_name, bounty_tier, pb_category, pb_time, trade_proof_url, created_at, reviewed_at";

enum ReviewResult {
    Reviewed(SubmissionReview),
    Missing,
    AlreadyReviewed(ReviewStatus),
}

#[derive(Debug, Clone)]
pub struct BountyStore {
    db_connection: DBConnection,
}

impl BountyStore {
    pub fn new(db_connection: DBConnection) -> Self {
        Self { db_connection }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        self.db_connection.ping().await
    }

    pub async fn create_bounty(&self, bounty: NewBounty) -> Result<Bounty, Error> {
        let created_at = format_datetime(&OffsetDateTime::now_utc())?;

        let bounty = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, Bounty>(&format!(
                    "INSERT INTO bounties (name, tier, image_url, is_active, created_at)
                     VALUES (?, ?, ?, 1, ?)
                     RETURNING {}",
                    BOUNTY_COLUMNS
                ))
                .bind(bounty.name.trim())
                .bind(bounty.tier.as_str())
                .bind(bounty.image_url)
                .bind(created_at)
                .fetch_one(&pool)
                .await
            })
            .await?;

        Ok(bounty)
    }

    pub async fn list_bounties(&self, active_only: bool) -> Result<Vec<Bounty>, Error> {
        let bounties = sqlx::query_as::<_, Bounty>(&format!(
            "SELECT {} FROM bounties
             WHERE (? = 0 OR is_active = 1)
             ORDER BY created_at DESC, id DESC",
            BOUNTY_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(bounties)
    }

    pub async fn get_bounty(&self, id: i64) -> Result<Bounty, Error> {
        sqlx::query_as::<_, Bounty>(&format!(
            "SELECT {} FROM bounties WHERE id = ?",
            BOUNTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("bounty {} not found", id)))
    }

    /// Active bounty matching `name`, ignoring case
    pub async fn find_active_bounty(&self, name: &str) -> Result<Option<Bounty>, Error> {
        let bounty = sqlx::query_as::<_, Bounty>(&format!(
            "SELECT {} FROM bounties
             WHERE is_active = 1 AND lower(name) = lower(?)
             ORDER BY id
             LIMIT 1",
            BOUNTY_COLUMNS
        ))
        .bind(name.trim())
        .fetch_optional(self.db_connection.read())
        .await?;

        Ok(bounty)
    }

    pub async fn update_bounty(&self, id: i64, update: BountyUpdate) -> Result<Bounty, Error> {
        let bounty = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, Bounty>(&format!(
                    "UPDATE bounties
                     SET name = COALESCE(?, name),
                         image_url = COALESCE(?, image_url),
                         is_active = COALESCE(?, is_active)
                     WHERE id = ?
                     RETURNING {}",
                    BOUNTY_COLUMNS
                ))
                .bind(update.name.map(|name| name.trim().to_string()))
                .bind(update.image_url)
                .bind(update.is_active)
                .bind(id)
                .fetch_optional(&pool)
                .await
            })
            .await?;

        bounty.ok_or_else(|| Error::NotFound(format!("bounty {} not found", id)))
    }

    pub async fn delete_bounty(&self, id: i64) -> Result<(), Error> {
        let rows_affected = self
            .db_connection
            .execute_write(move |pool| async move {
                let result = sqlx::query("DELETE FROM bounties WHERE id = ?")
                    .bind(id)
                    .execute(&pool)
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("bounty {} not found", id)));
        }
        Ok(())
    }

    pub async fn insert_submission(&self, submission: NewSubmission) -> Result<Submission, Error> {
        let created_at = format_datetime(&OffsetDateTime::now_utc())?;

        let submission = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, Submission>(&format!(
                    "INSERT INTO submissions (
                        player_name,
                        player_id,
                        submission_type,
                        status,
                        proof_url,
                        bounty_name,
                        bounty_tier,
                        pb_category,
                        pb_time,
                        created_at
                    ) VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?)
                    RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(submission.player_name)
                .bind(submission.player_id)
                .bind(submission.submission_type.as_str())
                .bind(submission.proof_url)
                .bind(submission.bounty_name)
                .bind(submission.bounty_tier.map(|tier| tier.as_str()))
                .bind(submission.pb_category)
                .bind(submission.pb_time)
                .bind(created_at)
                .fetch_one(&pool)
                .await
            })
            .await?;

        Ok(submission)
    }

    pub async fn get_submission(&self, id: i64) -> Result<Submission, Error> {
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {} FROM submissions WHERE id = ?",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("submission {} not found", id)))
    }

    pub async fn list_submissions(
        &self,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<Submission>, Error> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {} FROM submissions
             WHERE (? IS NULL OR status = ?)
             ORDER BY created_at DESC, id DESC",
            SUBMISSION_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(submissions)
    }

    /// Move a pending submission to approved or rejected.
    ///
    /// Approving a bounty-type submission deactivates the active bounty with the same name
    /// in the same transaction.
    pub async fn review_submission(
        &self,
        id: i64,
        action: ReviewAction,
    ) -> Result<SubmissionReview, Error> {
        let reviewed_at = format_datetime(&OffsetDateTime::now_utc())?;
        let status = action.resulting_status();

        let result = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;

                let current = sqlx::query("SELECT status FROM submissions WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                let Some(current) = current else {
                    return Ok(ReviewResult::Missing);
                };
                let current: ReviewStatus = parse_required_enum(&current, "status")?;
                if current.is_final() {
                    return Ok(ReviewResult::AlreadyReviewed(current));
                }

                let submission = sqlx::query_as::<_, Submission>(&format!(
                    "UPDATE submissions
                     SET status = ?, reviewed_at = ?
                     WHERE id = ? AND status = 'pending'
                     RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(status.as_str())
                .bind(&reviewed_at)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

                let archived_bounty = match (&submission.bounty_name, status) {
                    (Some(bounty_name), ReviewStatus::Approved)
                        if submission.submission_type == clanhub_core::SubmissionType::Bounty =>
                    {
                        sqlx::query_as::<_, Bounty>(&format!(
                            "UPDATE bounties
                             SET is_active = 0
                             WHERE id = (
                                SELECT id FROM bounties
                                WHERE is_active = 1 AND lower(name) = lower(?)
                                ORDER BY id
                                LIMIT 1
                             )
                             RETURNING {}",
                            BOUNTY_COLUMNS
                        ))
                        .bind(bounty_name.trim())
                        .fetch_optional(&mut *tx)
                        .await?
                    }
                    _ => None,
                };

                tx.commit().await?;

                Ok(ReviewResult::Reviewed(SubmissionReview {
                    submission,
                    archived_bounty,
                }))
            })
            .await?;

        match result {
            ReviewResult::Reviewed(review) => Ok(review),
            ReviewResult::Missing => Err(Error::NotFound(format!("submission {} not found", id))),
            ReviewResult::AlreadyReviewed(status) => Err(Error::BadRequest(format!(
                "submission {} has already been {}",
                id, status
            ))),
        }
    }

    /// Record the trade proof on an approved bounty submission
    pub async fn set_trade_proof(&self, id: i64, trade_proof_url: String) -> Result<Submission, Error> {
        let submission = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, Submission>(&format!(
                    "UPDATE submissions
                     SET trade_proof_url = ?
                     WHERE id = ? AND status = 'approved' AND submission_type = 'bounty'
                     RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(trade_proof_url)
                .bind(id)
                .fetch_optional(&pool)
                .await
            })
            .await?;

        submission.ok_or_else(|| {
            Error::BadRequest(format!(
                "submission {} is not an approved bounty submission",
                id
            ))
        })
    }

    /// Player name and tier of every approved bounty-type submission
    pub async fn approved_bounty_submissions(&self) -> Result<Vec<BountyClaim>, Error> {
        let rows = sqlx::query(
            "SELECT player_name, bounty_tier
             FROM submissions
             WHERE status = 'approved'
               AND submission_type = 'bounty'
               AND bounty_tier IS NOT NULL",
        )
        .fetch_all(self.db_connection.read())
        .await?;

        let claims = rows
            .iter()
            .map(|row: &SqliteRow| {
                Ok(BountyClaim {
                    player_name: row.try_get("player_name")?,
                    tier: parse_required_enum(row, "bounty_tier")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(claims)
    }

    pub async fn get_settings(&self) -> Result<SubmissionSettings, Error> {
        sqlx::query_as::<_, SubmissionSettings>(
            "SELECT require_password, submission_password, updated_at FROM settings WHERE id = 1",
        )
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(String::from("settings row missing")))
    }

    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> Result<SubmissionSettings, Error> {
        let updated_at = format_datetime(&OffsetDateTime::now_utc())?;

        let settings = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, SubmissionSettings>(
                    "INSERT INTO settings (id, require_password, submission_password, updated_at)
                     VALUES (1, ?, ?, ?)
                     ON CONFLICT (id) DO UPDATE SET
                        require_password = excluded.require_password,
                        submission_password = excluded.submission_password,
                        updated_at = excluded.updated_at
                     RETURNING require_password, submission_password, updated_at",
                )
                .bind(update.require_password)
                .bind(update.submission_password)
                .bind(updated_at)
                .fetch_one(&pool)
                .await
            })
            .await?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use clanhub_core::{BountyTier, SubmissionType};
    use sqlx::SqlitePool;

    use super::*;

    fn create_store(pool: SqlitePool) -> BountyStore {
        let db = DBConnection::new_with_pools(
            "test".to_string(),
            ":memory:".to_string(),
            pool.clone(),
            pool,
        );
        BountyStore::new(db)
    }

    fn bounty_submission(player: &str, bounty: &str, tier: BountyTier) -> NewSubmission {
        NewSubmission {
            player_name: player.to_string(),
            player_id: None,
            submission_type: SubmissionType::Bounty,
            proof_url: String::from("http://localhost/media/achievement-proofs/p.png"),
            bounty_name: Some(bounty.to_string()),
            bounty_tier: Some(tier),
            pb_category: None,
            pb_time: None,
        }
    }

    fn pb_submission(player: &str) -> NewSubmission {
        NewSubmission {
            player_name: player.to_string(),
            player_id: Some(String::from("42")),
            submission_type: SubmissionType::PersonalBest,
            proof_url: String::from("http://localhost/media/achievement-proofs/pb.png"),
            bounty_name: Some(String::from("Zulrah")),
            bounty_tier: None,
            pb_category: Some(String::from("Theatre of Blood")),
            pb_time: Some(String::from("17:42")),
        }
    }

    async fn create_bounty(store: &BountyStore, name: &str, tier: BountyTier) -> Bounty {
        store
            .create_bounty(NewBounty {
                name: name.to_string(),
                tier,
                image_url: None,
            })
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_bounty_crud(pool: SqlitePool) {
        let store = create_store(pool);

        let bounty = create_bounty(&store, "Zulrah", BountyTier::Low).await;
        assert!(bounty.is_active);
        assert_eq!(store.get_bounty(bounty.id).await.unwrap(), bounty);

        let updated = store
            .update_bounty(
                bounty.id,
                BountyUpdate {
                    name: Some(String::from("Zulrah (any)")),
                    image_url: Some(String::from("http://img/zulrah.png")),
                    is_active: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Zulrah (any)");
        assert_eq!(updated.tier, BountyTier::Low);
        assert!(updated.is_active);

        store.delete_bounty(bounty.id).await.unwrap();
        assert!(matches!(
            store.get_bounty(bounty.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete_bounty(bounty.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_list_active_only(pool: SqlitePool) {
        let store = create_store(pool);
        let a = create_bounty(&store, "Vorkath", BountyTier::Medium).await;
        create_bounty(&store, "Nex", BountyTier::High).await;
        store
            .update_bounty(
                a.id,
                BountyUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.list_bounties(false).await.unwrap().len(), 2);
        let active = store.list_bounties(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Nex");
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_bounty_approval_archives_matching_bounty(pool: SqlitePool) {
        let store = create_store(pool);
        let bounty = create_bounty(&store, "Zulrah", BountyTier::Low).await;
        let submission = store
            .insert_submission(bounty_submission("Bob", "zulrah", BountyTier::Low))
            .await
            .unwrap();
        assert_eq!(submission.status, ReviewStatus::Pending);

        let review = store
            .review_submission(submission.id, ReviewAction::Approve)
            .await
            .unwrap();

        assert_eq!(review.submission.status, ReviewStatus::Approved);
        assert!(review.submission.reviewed_at.is_some());
        let archived = review.archived_bounty.unwrap();
        assert_eq!(archived.id, bounty.id);
        assert!(!archived.is_active);
        assert!(!store.get_bounty(bounty.id).await.unwrap().is_active);
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_personal_best_approval_never_touches_bounties(pool: SqlitePool) {
        let store = create_store(pool);
        let bounty = create_bounty(&store, "Zulrah", BountyTier::Low).await;
        let submission = store.insert_submission(pb_submission("Bob")).await.unwrap();

        let review = store
            .review_submission(submission.id, ReviewAction::Approve)
            .await
            .unwrap();

        assert_eq!(review.archived_bounty, None);
        assert!(store.get_bounty(bounty.id).await.unwrap().is_active);
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_rejection_has_no_side_effects(pool: SqlitePool) {
        let store = create_store(pool);
        let bounty = create_bounty(&store, "Zulrah", BountyTier::Low).await;
        let submission = store
            .insert_submission(bounty_submission("Bob", "Zulrah", BountyTier::Low))
            .await
            .unwrap();

        let review = store
            .review_submission(submission.id, ReviewAction::Reject)
            .await
            .unwrap();

        assert_eq!(review.submission.status, ReviewStatus::Rejected);
        assert_eq!(review.archived_bounty, None);
        assert!(store.get_bounty(bounty.id).await.unwrap().is_active);
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_status_is_one_way(pool: SqlitePool) {
        let store = create_store(pool);
        let submission = store.insert_submission(pb_submission("Bob")).await.unwrap();

        store
            .review_submission(submission.id, ReviewAction::Reject)
            .await
            .unwrap();

        for action in [ReviewAction::Approve, ReviewAction::Reject] {
            assert!(matches!(
                store.review_submission(submission.id, action).await,
                Err(Error::BadRequest(_))
            ));
        }
        assert_eq!(
            store.get_submission(submission.id).await.unwrap().status,
            ReviewStatus::Rejected
        );
        assert!(matches!(
            store.review_submission(9999, ReviewAction::Approve).await,
            Err(Error::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_approval_without_matching_bounty_still_succeeds(pool: SqlitePool) {
        let store = create_store(pool);
        let submission = store
            .insert_submission(bounty_submission("Bob", "Retired bounty", BountyTier::High))
            .await
            .unwrap();

        let review = store
            .review_submission(submission.id, ReviewAction::Approve)
            .await
            .unwrap();
        assert_eq!(review.submission.status, ReviewStatus::Approved);
        assert_eq!(review.archived_bounty, None);
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_approved_bounty_claims(pool: SqlitePool) {
        let store = create_store(pool);
        let approved = store
            .insert_submission(bounty_submission("Bob", "Zulrah", BountyTier::Low))
            .await
            .unwrap();
        let pending = store
            .insert_submission(bounty_submission("Alice", "Nex", BountyTier::High))
            .await
            .unwrap();
        let pb = store.insert_submission(pb_submission("Carol")).await.unwrap();
        store
            .review_submission(approved.id, ReviewAction::Approve)
            .await
            .unwrap();
        store
            .review_submission(pb.id, ReviewAction::Approve)
            .await
            .unwrap();

        let claims = store.approved_bounty_submissions().await.unwrap();
        assert_eq!(
            claims,
            vec![BountyClaim {
                player_name: String::from("Bob"),
                tier: BountyTier::Low,
            }]
        );

        let pending_list = store
            .list_submissions(Some(ReviewStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending_list.len(), 1);
        assert_eq!(pending_list[0].id, pending.id);
        assert_eq!(store.list_submissions(None).await.unwrap().len(), 3);
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_trade_proof_only_on_approved_bounties(pool: SqlitePool) {
        let store = create_store(pool);
        let submission = store
            .insert_submission(bounty_submission("Bob", "Zulrah", BountyTier::Low))
            .await
            .unwrap();

        assert!(matches!(
            store
                .set_trade_proof(submission.id, String::from("http://trade.png"))
                .await,
            Err(Error::BadRequest(_))
        ));

        store
            .review_submission(submission.id, ReviewAction::Approve)
            .await
            .unwrap();
        let updated = store
            .set_trade_proof(submission.id, String::from("http://trade.png"))
            .await
            .unwrap();
        assert_eq!(updated.trade_proof_url.as_deref(), Some("http://trade.png"));
    }

    #[sqlx::test(migrations = "./migrations/clan")]
    async fn test_settings_singleton(pool: SqlitePool) {
        let store = create_store(pool);
        let defaults = store.get_settings().await.unwrap();
        assert!(!defaults.require_password);
        assert_eq!(defaults.submission_password, None);

        let updated = store
            .update_settings(SettingsUpdate {
                require_password: true,
                submission_password: Some(String::from("hunter2")),
            })
            .await
            .unwrap();
        assert!(updated.require_password);
        assert_eq!(store.get_settings().await.unwrap(), updated);
    }
}
