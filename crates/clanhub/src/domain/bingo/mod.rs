mod service;
mod store;

pub use service::*;
pub use store::*;

use clanhub_core::{GameMode, ReviewStatus, TileStatus};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::infra::db::{
    parse_optional_datetime, parse_required_datetime, parse_required_enum, parse_required_json,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoGame {
    pub id: i64,
    pub name: String,
    pub mode: GameMode,
    pub board_size: u32,
    pub tile_pool: Vec<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub requires_password: bool,
    pub is_active: bool,
    pub winner_team_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    pub duration_hours: Option<u32>,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl FromRow<'_, SqliteRow> for BingoGame {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let password: Option<String> = row.try_get("password")?;
        Ok(BingoGame {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            mode: parse_required_enum(row, "mode")?,
            board_size: row.try_get("board_size")?,
            tile_pool: parse_required_json(row, "tile_pool")?,
            requires_password: password.is_some(),
            password,
            is_active: row.try_get("is_active")?,
            winner_team_id: row.try_get("winner_team_id")?,
            start_time: parse_optional_datetime(row, "start_time")?,
            duration_hours: row.try_get("duration_hours")?,
            version: row.try_get("version")?,
            created_at: parse_required_datetime(row, "created_at")?,
            updated_at: parse_required_datetime(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoTeam {
    pub id: i64,
    pub game_id: i64,
    pub name: String,
    pub score: i64,
    pub members: Vec<String>,
}

impl FromRow<'_, SqliteRow> for BingoTeam {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(BingoTeam {
            id: row.try_get("id")?,
            game_id: row.try_get("game_id")?,
            name: row.try_get("name")?,
            score: row.try_get("score")?,
            members: vec![],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub position: u32,
    pub text: String,
    pub status: TileStatus,
    pub team_id: Option<i64>,
    pub player_name: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub claimed_at: Option<OffsetDateTime>,
    pub proof_url: Option<String>,
}

impl FromRow<'_, SqliteRow> for Tile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Tile {
            position: row.try_get("position")?,
            text: row.try_get("text")?,
            status: parse_required_enum(row, "status")?,
            team_id: row.try_get("team_id")?,
            player_name: row.try_get("player_name")?,
            claimed_at: parse_optional_datetime(row, "claimed_at")?,
            proof_url: row.try_get("proof_url")?,
        })
    }
}

/// A board and its tiles sorted by position. `team_id` is `None` for the shared lockout board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoBoard {
    pub id: i64,
    pub game_id: i64,
    pub team_id: Option<i64>,
    pub tiles: Vec<Tile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoSubmission {
    pub id: i64,
    pub game_id: i64,
    pub team_id: i64,
    pub tile_text: String,
    pub tile_position: u32,
    pub player_id: Option<String>,
    pub player_name: String,
    #[serde(skip_serializing)]
    pub proof_name: String,
    pub proof_url: String,
    pub status: ReviewStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl FromRow<'_, SqliteRow> for BingoSubmission {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(BingoSubmission {
            id: row.try_get("id")?,
            game_id: row.try_get("game_id")?,
            team_id: row.try_get("team_id")?,
            tile_text: row.try_get("tile_text")?,
            tile_position: row.try_get("tile_position")?,
            player_id: row.try_get("player_id")?,
            player_name: row.try_get("player_name")?,
            proof_name: row.try_get("proof_name")?,
            proof_url: row.try_get("proof_url")?,
            status: parse_required_enum(row, "status")?,
            created_at: parse_required_datetime(row, "created_at")?,
            reviewed_at: parse_optional_datetime(row, "reviewed_at")?,
        })
    }
}

/// Read model the game page renders from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub game: BingoGame,
    pub teams: Vec<BingoTeam>,
    /// Lockout games only
    pub shared_board: Option<BingoBoard>,
    /// Standard games only, keyed by team id
    pub team_boards: Option<BTreeMap<i64, BingoBoard>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTeam {
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGame {
    pub name: String,
    pub mode: GameMode,
    pub board_size: u32,
    /// Pasted pool, one tile per line
    pub tile_pool: String,
    pub password: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    pub duration_hours: Option<u32>,
    #[serde(default)]
    pub teams: Vec<NewTeam>,
}

/// A validated game with its drawn tiles, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDraft {
    pub name: String,
    pub mode: GameMode,
    pub board_size: u32,
    pub tile_pool: Vec<String>,
    pub password: Option<String>,
    pub start_time: Option<OffsetDateTime>,
    pub duration_hours: Option<u32>,
    /// Team name and roster, in creation order
    pub teams: Vec<(String, Vec<String>)>,
    /// Board tiles in position order
    pub tiles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileSubmissionForm {
    pub game_id: i64,
    pub team_id: i64,
    pub tile_text: String,
    pub tile_position: u32,
    pub player_id: Option<String>,
    pub player_name: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBingoSubmission {
    pub game_id: i64,
    pub team_id: i64,
    pub tile_text: String,
    pub tile_position: u32,
    pub player_id: Option<String>,
    pub player_name: String,
    pub proof_name: String,
    pub proof_url: String,
}

/// Result of reviewing a bingo submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BingoReview {
    pub submission: BingoSubmission,
    /// The claimed tile, set on approval
    pub tile: Option<Tile>,
    pub team_score: Option<i64>,
    pub winner_team_id: Option<i64>,
    /// True when this approval closed the game
    pub game_archived: bool,
}

/// Cheap freshness check for polling clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameVersion {
    pub game_id: i64,
    pub version: i64,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
