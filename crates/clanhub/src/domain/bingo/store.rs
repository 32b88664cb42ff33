use clanhub_core::{detect_winner, GameMode, ReviewStatus};
use log::debug;
use sqlx::{FromRow, Row, Sqlite, Transaction};
use std::collections::HashMap;
use time::OffsetDateTime;

use super::{
    BingoBoard, BingoGame, BingoReview, BingoSubmission, BingoTeam, GameDraft, GameVersion,
    NewBingoSubmission, Tile,
};
use crate::{
    domain::Error,
    infra::db::{format_datetime, parse_required_datetime, parse_required_enum, DBConnection},
};

const GAME_COLUMNS: &str = "id, name, mode, board_size, tile_pool, password, is_active,
    winner_team_id, start_time, duration_hours, version, created_at, updated_at";

const TILE_COLUMNS: &str =
    "position, text, status, team_id, player_name, claimed_at, proof_url";

const SUBMISSION_COLUMNS: &str = "id, game_id, team_id, tile_text, tile_position, player_id,
    player_name, proof_name, proof_url, status, created_at, reviewed_at";

enum ReviewResult {
    Reviewed(Box<BingoReview>),
    Missing,
    AlreadyReviewed(ReviewStatus),
    GameClosed,
    BoardMissing,
    TileTaken,
}

#[derive(Debug, Clone)]
pub struct BingoStore {
    db_connection: DBConnection,
}

impl BingoStore {
    pub fn new(db_connection: DBConnection) -> Self {
        Self { db_connection }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        self.db_connection.ping().await
    }

    /// Insert a game with its teams, rosters, boards and tiles in one transaction
    pub async fn create_game(&self, draft: GameDraft) -> Result<BingoGame, Error> {
        let now = format_datetime(&OffsetDateTime::now_utc())?;
        let start_time = draft.start_time.as_ref().map(format_datetime).transpose()?;
        let tile_pool = serde_json::to_string(&draft.tile_pool)?;

        let game = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;

                let game = sqlx::query_as::<_, BingoGame>(&format!(
                    "INSERT INTO bingo_games (
                        name,
                        mode,
                        board_size,
                        tile_pool,
                        password,
                        is_active,
                        start_time,
                        duration_hours,
                        version,
                        created_at,
                        updated_at
                    ) VALUES (?, ?, ?, ?, ?, 1, ?, ?, 1, ?, ?)
                    RETURNING {}",
                    GAME_COLUMNS
                ))
                .bind(&draft.name)
                .bind(draft.mode.as_str())
                .bind(draft.board_size)
                .bind(tile_pool)
                .bind(&draft.password)
                .bind(start_time)
                .bind(draft.duration_hours)
                .bind(&now)
                .bind(&now)
                .fetch_one(&mut *tx)
                .await?;

                let mut team_ids = Vec::with_capacity(draft.teams.len());
                for (name, members) in &draft.teams {
                    let team_id: i64 = sqlx::query_scalar(
                        "INSERT INTO bingo_teams (game_id, name, score) VALUES (?, ?, 0) RETURNING id",
                    )
                    .bind(game.id)
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;

                    for member in members {
                        sqlx::query(
                            "INSERT OR IGNORE INTO bingo_team_members (team_id, player_name)
                             VALUES (?, ?)",
                        )
                        .bind(team_id)
                        .bind(member)
                        .execute(&mut *tx)
                        .await?;
                    }
                    team_ids.push(team_id);
                }

                let board_owners: Vec<Option<i64>> = match draft.mode {
                    GameMode::Standard => team_ids.iter().copied().map(Some).collect(),
                    GameMode::Lockout => vec![None],
                };
                for team_id in board_owners {
                    let board_id: i64 = sqlx::query_scalar(
                        "INSERT INTO bingo_boards (game_id, team_id) VALUES (?, ?) RETURNING id",
                    )
                    .bind(game.id)
                    .bind(team_id)
                    .fetch_one(&mut *tx)
                    .await?;

                    for (position, text) in draft.tiles.iter().enumerate() {
                        sqlx::query(
                            "INSERT INTO bingo_tiles (board_id, position, text, status)
                             VALUES (?, ?, ?, 'incomplete')",
                        )
                        .bind(board_id)
                        .bind(position as u32)
                        .bind(text)
                        .execute(&mut *tx)
                        .await?;
                    }
                }

                tx.commit().await?;
                Ok(game)
            })
            .await?;

        Ok(game)
    }

    pub async fn get_game(&self, game_id: i64) -> Result<BingoGame, Error> {
        sqlx::query_as::<_, BingoGame>(&format!(
            "SELECT {} FROM bingo_games WHERE id = ?",
            GAME_COLUMNS
        ))
        .bind(game_id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("bingo game {} not found", game_id)))
    }

    pub async fn list_games(&self, archived: bool) -> Result<Vec<BingoGame>, Error> {
        let games = sqlx::query_as::<_, BingoGame>(&format!(
            "SELECT {} FROM bingo_games
             WHERE is_active = ?
             ORDER BY created_at DESC, id DESC",
            GAME_COLUMNS
        ))
        .bind(!archived)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(games)
    }

    /// Teams of a game with their rosters, in creation order
    pub async fn get_teams(&self, game_id: i64) -> Result<Vec<BingoTeam>, Error> {
        let mut teams = sqlx::query_as::<_, BingoTeam>(
            "SELECT id, game_id, name, score FROM bingo_teams WHERE game_id = ? ORDER BY id",
        )
        .bind(game_id)
        .fetch_all(self.db_connection.read())
        .await?;

        let rows = sqlx::query(
            "SELECT m.team_id, m.player_name
             FROM bingo_team_members m
             JOIN bingo_teams t ON t.id = m.team_id
             WHERE t.game_id = ?
             ORDER BY m.player_name",
        )
        .bind(game_id)
        .fetch_all(self.db_connection.read())
        .await?;

        let mut rosters: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            rosters
                .entry(row.try_get("team_id")?)
                .or_default()
                .push(row.try_get("player_name")?);
        }
        for team in teams.iter_mut() {
            team.members = rosters.remove(&team.id).unwrap_or_default();
        }

        Ok(teams)
    }

    pub async fn get_team(&self, team_id: i64) -> Result<BingoTeam, Error> {
        let mut team = sqlx::query_as::<_, BingoTeam>(
            "SELECT id, game_id, name, score FROM bingo_teams WHERE id = ?",
        )
        .bind(team_id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("bingo team {} not found", team_id)))?;

        team.members = sqlx::query_scalar(
            "SELECT player_name FROM bingo_team_members WHERE team_id = ? ORDER BY player_name",
        )
        .bind(team_id)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(team)
    }

    /// Boards of a game with tiles in position order
    pub async fn get_boards(&self, game_id: i64) -> Result<Vec<BingoBoard>, Error> {
        let boards = sqlx::query(
            "SELECT id, game_id, team_id FROM bingo_boards WHERE game_id = ? ORDER BY id",
        )
        .bind(game_id)
        .fetch_all(self.db_connection.read())
        .await?;

        let tile_rows = sqlx::query(
            "SELECT t.board_id, t.position, t.text, t.status, t.team_id, t.player_name,
                    t.claimed_at, t.proof_url
             FROM bingo_tiles t
             JOIN bingo_boards b ON b.id = t.board_id
             WHERE b.game_id = ?
             ORDER BY t.board_id, t.position",
        )
        .bind(game_id)
        .fetch_all(self.db_connection.read())
        .await?;

        let mut tiles: HashMap<i64, Vec<Tile>> = HashMap::new();
        for row in tile_rows {
            let board_id: i64 = row.try_get("board_id")?;
            tiles
                .entry(board_id)
                .or_default()
                .push(Tile::from_row(&row)?);
        }

        boards
            .into_iter()
            .map(|row| -> Result<BingoBoard, Error> {
                let id: i64 = row.try_get("id")?;
                Ok(BingoBoard {
                    id,
                    game_id: row.try_get("game_id")?,
                    team_id: row.try_get("team_id")?,
                    tiles: tiles.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Tile at `position` on the shared board (`team_id = None`) or on a team's board
    pub async fn board_tile(
        &self,
        game_id: i64,
        team_id: Option<i64>,
        position: u32,
    ) -> Result<Option<Tile>, Error> {
        let tile = sqlx::query_as::<_, Tile>(&format!(
            "SELECT {}
             FROM bingo_tiles
             WHERE position = ?
               AND board_id = (
                  SELECT id FROM bingo_boards
                  WHERE game_id = ? AND team_id IS ?
                  ORDER BY id
                  LIMIT 1
               )",
            TILE_COLUMNS
        ))
        .bind(position)
        .bind(game_id)
        .bind(team_id)
        .fetch_optional(self.db_connection.read())
        .await?;

        Ok(tile)
    }

    pub async fn insert_submission(
        &self,
        submission: NewBingoSubmission,
    ) -> Result<BingoSubmission, Error> {
        let created_at = format_datetime(&OffsetDateTime::now_utc())?;

        let submission = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, BingoSubmission>(&format!(
                    "INSERT INTO bingo_submissions (
                        game_id,
                        team_id,
                        tile_text,
                        tile_position,
                        player_id,
                        player_name,
                        proof_name,
                        proof_url,
                        status,
                        created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
                    RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(submission.game_id)
                .bind(submission.team_id)
                .bind(submission.tile_text)
                .bind(submission.tile_position)
                .bind(submission.player_id)
                .bind(submission.player_name)
                .bind(submission.proof_name)
                .bind(submission.proof_url)
                .bind(created_at)
                .fetch_one(&pool)
                .await
            })
            .await?;

        Ok(submission)
    }

    pub async fn get_submission(&self, id: i64) -> Result<BingoSubmission, Error> {
        sqlx::query_as::<_, BingoSubmission>(&format!(
            "SELECT {} FROM bingo_submissions WHERE id = ?",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("bingo submission {} not found", id)))
    }

    pub async fn list_submissions(
        &self,
        game_id: i64,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<BingoSubmission>, Error> {
        let submissions = sqlx::query_as::<_, BingoSubmission>(&format!(
            "SELECT {} FROM bingo_submissions
             WHERE game_id = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC, id DESC",
            SUBMISSION_COLUMNS
        ))
        .bind(game_id)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(submissions)
    }

    pub async fn reject_submission(&self, id: i64) -> Result<BingoSubmission, Error> {
        let reviewed_at = format_datetime(&OffsetDateTime::now_utc())?;

        let result = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;
                let Some(status) = submission_status(&mut tx, id).await? else {
                    return Ok(ReviewResult::Missing);
                };
                if status.is_final() {
                    return Ok(ReviewResult::AlreadyReviewed(status));
                }

                let submission = sqlx::query_as::<_, BingoSubmission>(&format!(
                    "UPDATE bingo_submissions
                     SET status = 'rejected', reviewed_at = ?
                     WHERE id = ? AND status = 'pending'
                     RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(reviewed_at)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(ReviewResult::Reviewed(Box::new(BingoReview {
                    submission,
                    tile: None,
                    team_score: None,
                    winner_team_id: None,
                    game_archived: false,
                })))
            })
            .await?;

        review_outcome(id, result).map(|review| review.submission)
    }

    /// Claim the submitted tile for the submitting team and check for a winner.
    ///
    /// Tile claim, submission status, score increment, version bump and archive happen in one
    /// transaction. A tile is only ever claimed once, a second approval for it fails.
    pub async fn approve_submission(&self, id: i64) -> Result<BingoReview, Error> {
        let now = format_datetime(&OffsetDateTime::now_utc())?;

        let result = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;

                let Some(status) = submission_status(&mut tx, id).await? else {
                    return Ok(ReviewResult::Missing);
                };
                if status.is_final() {
                    return Ok(ReviewResult::AlreadyReviewed(status));
                }
                let pending = sqlx::query_as::<_, BingoSubmission>(&format!(
                    "SELECT {} FROM bingo_submissions WHERE id = ?",
                    SUBMISSION_COLUMNS
                ))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

                let game = sqlx::query(
                    "SELECT mode, board_size, is_active FROM bingo_games WHERE id = ?",
                )
                .bind(pending.game_id)
                .fetch_one(&mut *tx)
                .await?;
                let mode: GameMode = parse_required_enum(&game, "mode")?;
                let board_size: u32 = game.try_get("board_size")?;
                let is_active: bool = game.try_get("is_active")?;
                if !is_active {
                    return Ok(ReviewResult::GameClosed);
                }

                let board_team = match mode {
                    GameMode::Standard => Some(pending.team_id),
                    GameMode::Lockout => None,
                };
                let board_id: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM bingo_boards
                     WHERE game_id = ? AND team_id IS ?
                     ORDER BY id
                     LIMIT 1",
                )
                .bind(pending.game_id)
                .bind(board_team)
                .fetch_optional(&mut *tx)
                .await?;
                let Some(board_id) = board_id else {
                    return Ok(ReviewResult::BoardMissing);
                };

                let tile = sqlx::query_as::<_, Tile>(&format!(
                    "UPDATE bingo_tiles
                     SET status = 'approved',
                         team_id = ?,
                         player_name = ?,
                         claimed_at = ?,
                         proof_url = ?
                     WHERE board_id = ? AND position = ? AND status = 'incomplete'
                     RETURNING {}",
                    TILE_COLUMNS
                ))
                .bind(pending.team_id)
                .bind(&pending.player_name)
                .bind(&now)
                .bind(&pending.proof_url)
                .bind(board_id)
                .bind(pending.tile_position)
                .fetch_optional(&mut *tx)
                .await?;
                let Some(tile) = tile else {
                    return Ok(ReviewResult::TileTaken);
                };

                let submission = sqlx::query_as::<_, BingoSubmission>(&format!(
                    "UPDATE bingo_submissions
                     SET status = 'approved', reviewed_at = ?
                     WHERE id = ? AND status = 'pending'
                     RETURNING {}",
                    SUBMISSION_COLUMNS
                ))
                .bind(&now)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

                let team_score: i64 = sqlx::query_scalar(
                    "UPDATE bingo_teams SET score = score + 1 WHERE id = ? RETURNING score",
                )
                .bind(submission.team_id)
                .fetch_one(&mut *tx)
                .await?;

                // claimed tiles carry the claiming team on both board kinds
                let counts: Vec<(i64, u32)> = sqlx::query(
                    "SELECT t.team_id AS team_id, COUNT(*) AS approved
                     FROM bingo_tiles t
                     JOIN bingo_boards b ON b.id = t.board_id
                     WHERE b.game_id = ? AND t.status = 'approved' AND t.team_id IS NOT NULL
                     GROUP BY t.team_id
                     ORDER BY t.team_id",
                )
                .bind(submission.game_id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| -> Result<(i64, u32), sqlx::Error> {
                    Ok((row.try_get("team_id")?, row.try_get("approved")?))
                })
                .collect::<Result<_, _>>()?;

                let winner = detect_winner(mode, board_size, &counts);
                let game_archived = match winner {
                    Some(winner_team_id) => {
                        let archived = sqlx::query(
                            "UPDATE bingo_games
                             SET is_active = 0,
                                 winner_team_id = ?,
                                 version = version + 1,
                                 updated_at = ?
                             WHERE id = ? AND is_active = 1",
                        )
                        .bind(winner_team_id)
                        .bind(&now)
                        .bind(submission.game_id)
                        .execute(&mut *tx)
                        .await?;
                        archived.rows_affected() == 1
                    }
                    None => {
                        sqlx::query(
                            "UPDATE bingo_games
                             SET version = version + 1, updated_at = ?
                             WHERE id = ?",
                        )
                        .bind(&now)
                        .bind(submission.game_id)
                        .execute(&mut *tx)
                        .await?;
                        false
                    }
                };

                tx.commit().await?;

                Ok(ReviewResult::Reviewed(Box::new(BingoReview {
                    submission,
                    tile: Some(tile),
                    team_score: Some(team_score),
                    winner_team_id: winner,
                    game_archived,
                })))
            })
            .await?;

        review_outcome(id, result)
    }

    /// Close or reopen a game, a game that already has a winner stays closed
    pub async fn set_active(&self, game_id: i64, is_active: bool) -> Result<BingoGame, Error> {
        let updated_at = format_datetime(&OffsetDateTime::now_utc())?;

        let game = self
            .db_connection
            .execute_write(move |pool| async move {
                sqlx::query_as::<_, BingoGame>(&format!(
                    "UPDATE bingo_games
                     SET is_active = ?, version = version + 1, updated_at = ?
                     WHERE id = ? AND (? = 0 OR winner_team_id IS NULL)
                     RETURNING {}",
                    GAME_COLUMNS
                ))
                .bind(is_active)
                .bind(updated_at)
                .bind(game_id)
                .bind(is_active)
                .fetch_optional(&pool)
                .await
            })
            .await?;

        match game {
            Some(game) => Ok(game),
            None => {
                let existing = self.get_game(game_id).await?;
                Err(Error::BadRequest(format!(
                    "bingo game {} was won by team {} and cannot be reopened",
                    game_id,
                    existing.winner_team_id.unwrap_or_default()
                )))
            }
        }
    }

    /// Delete a game and everything it owns, returning the proof object names it referenced
    pub async fn delete_game(&self, game_id: i64) -> Result<Vec<String>, Error> {
        let deleted = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;

                let proof_names: Vec<String> = sqlx::query_scalar(
                    "SELECT proof_name FROM bingo_submissions WHERE game_id = ?",
                )
                .bind(game_id)
                .fetch_all(&mut *tx)
                .await?;

                let result = sqlx::query("DELETE FROM bingo_games WHERE id = ?")
                    .bind(game_id)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Ok(None);
                }

                tx.commit().await?;
                Ok(Some(proof_names))
            })
            .await?;

        deleted.ok_or_else(|| Error::NotFound(format!("bingo game {} not found", game_id)))
    }

    /// Drop a player from a team roster, matching the name case-insensitively
    pub async fn remove_member(&self, team_id: i64, player_name: &str) -> Result<(), Error> {
        let updated_at = format_datetime(&OffsetDateTime::now_utc())?;
        let player_name = player_name.trim().to_string();
        let player = player_name.clone();

        let removed = self
            .db_connection
            .execute_write(move |pool| async move {
                let mut tx = pool.begin().await?;

                let result = sqlx::query(
                    "DELETE FROM bingo_team_members WHERE team_id = ? AND player_name = ?",
                )
                .bind(team_id)
                .bind(&player)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Ok(false);
                }

                sqlx::query(
                    "UPDATE bingo_games
                     SET version = version + 1, updated_at = ?
                     WHERE id = (SELECT game_id FROM bingo_teams WHERE id = ?)",
                )
                .bind(updated_at)
                .bind(team_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(true)
            })
            .await?;

        if !removed {
            return Err(Error::NotFound(format!(
                "{} is not on bingo team {}",
                player_name, team_id
            )));
        }
        debug!("removed {} from bingo team {}", player_name, team_id);
        Ok(())
    }

    pub async fn game_version(&self, game_id: i64) -> Result<GameVersion, Error> {
        let row = sqlx::query(
            "SELECT id, version, is_active, updated_at FROM bingo_games WHERE id = ?",
        )
        .bind(game_id)
        .fetch_optional(self.db_connection.read())
        .await?
        .ok_or_else(|| Error::NotFound(format!("bingo game {} not found", game_id)))?;

        Ok(GameVersion {
            game_id: row.try_get("id")?,
            version: row.try_get("version")?,
            is_active: row.try_get("is_active")?,
            updated_at: parse_required_datetime(&row, "updated_at")?,
        })
    }
}

async fn submission_status(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
) -> Result<Option<ReviewStatus>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM bingo_submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    row.map(|row| parse_required_enum(&row, "status"))
        .transpose()
}

fn review_outcome(id: i64, result: ReviewResult) -> Result<BingoReview, Error> {
    match result {
        ReviewResult::Reviewed(review) => Ok(*review),
        ReviewResult::Missing => Err(Error::NotFound(format!(
            "bingo submission {} not found",
            id
        ))),
        ReviewResult::AlreadyReviewed(status) => Err(Error::BadRequest(format!(
            "bingo submission {} has already been {}",
            id, status
        ))),
        ReviewResult::GameClosed => Err(Error::BadRequest(format!(
            "bingo submission {} belongs to a game that is no longer active",
            id
        ))),
        ReviewResult::BoardMissing => Err(Error::NotFound(format!(
            "no board found for bingo submission {}",
            id
        ))),
        ReviewResult::TileTaken => Err(Error::BadRequest(format!(
            "the tile for bingo submission {} has already been claimed",
            id
        ))),
    }
}
