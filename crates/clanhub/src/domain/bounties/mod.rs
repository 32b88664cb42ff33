mod service;
mod store;

pub use service::*;
pub use store::*;

use clanhub_core::{BountyTier, ReviewStatus, SubmissionType};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use time::OffsetDateTime;

use crate::infra::db::{
    parse_optional_datetime, parse_optional_enum, parse_required_datetime, parse_required_enum,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounty {
    pub id: i64,
    pub name: String,
    pub tier: BountyTier,
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl FromRow<'_, SqliteRow> for Bounty {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Bounty {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            tier: parse_required_enum(row, "tier")?,
            image_url: row.try_get("image_url")?,
            is_active: row.try_get("is_active")?,
            created_at: parse_required_datetime(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBounty {
    pub name: String,
    pub tier: BountyTier,
    pub image_url: Option<String>,
}

/// Editable bounty fields, the tier is fixed once created
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BountyUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub player_name: String,
    pub player_id: Option<String>,
    pub submission_type: SubmissionType,
    pub status: ReviewStatus,
    pub proof_url: String,
    pub bounty_name: Option<String>,
    pub bounty_tier: Option<BountyTier>,
    pub pb_category: Option<String>,
    pub pb_time: Option<String>,
    pub trade_proof_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl FromRow<'_, SqliteRow> for Submission {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Submission {
            id: row.try_get("id")?,
            player_name: row.try_get("player_name")?,
            player_id: row.try_get("player_id")?,
            submission_type: parse_required_enum(row, "submission_type")?,
            status: parse_required_enum(row, "status")?,
            proof_url: row.try_get("proof_url")?,
            bounty_name: row.try_get("bounty_name")?,
            bounty_tier: parse_optional_enum(row, "bounty_tier")?,
            pb_category: row.try_get("pb_category")?,
            pb_time: row.try_get("pb_time")?,
            trade_proof_url: row.try_get("trade_proof_url")?,
            created_at: parse_required_datetime(row, "created_at")?,
            reviewed_at: parse_optional_datetime(row, "reviewed_at")?,
        })
    }
}

/// Fields of the player-facing submission form, the proof image travels separately
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionForm {
    pub player_name: String,
    pub player_id: Option<String>,
    pub submission_type: Option<SubmissionType>,
    pub bounty_name: Option<String>,
    pub pb_category: Option<String>,
    pub pb_time: Option<String>,
    pub password: Option<String>,
}

/// A validated submission ready to be stored
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub player_name: String,
    pub player_id: Option<String>,
    pub submission_type: SubmissionType,
    pub proof_url: String,
    pub bounty_name: Option<String>,
    pub bounty_tier: Option<BountyTier>,
    pub pb_category: Option<String>,
    pub pb_time: Option<String>,
}

/// One approved bounty-type submission, the input to rank bounty counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BountyClaim {
    pub player_name: String,
    pub tier: BountyTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReview {
    pub submission: Submission,
    /// Bounty deactivated by this approval, if one matched by name
    pub archived_bounty: Option<Bounty>,
}

/// Singleton row gating player submissions behind a shared password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSettings {
    pub require_password: bool,
    pub submission_password: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl FromRow<'_, SqliteRow> for SubmissionSettings {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(SubmissionSettings {
            require_password: row.try_get("require_password")?,
            submission_password: row.try_get("submission_password")?,
            updated_at: parse_required_datetime(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub require_password: bool,
    pub submission_password: Option<String>,
}
