use clanhub_core::{
    draw_board_tiles, parse_tile_pool, total_tiles, validate_required, GameMode, ReviewAction,
    ReviewStatus, TileStatus,
};
use log::{error, info, warn};
use rand::Rng;
use std::{collections::BTreeMap, sync::Arc};
use time::OffsetDateTime;

use super::{
    BingoGame, BingoReview, BingoStore, BingoSubmission, GameDraft, GameVersion, GameView,
    NewBingoSubmission, NewGame, TileSubmissionForm,
};
use crate::{
    domain::{Error, ProofImage},
    infra::{
        blob::{BlobStore, Bucket},
        webhook::{Notification, Notifier},
    },
};

const TEAMS_PER_GAME: usize = 2;

pub struct BingoService {
    store: BingoStore,
    blob: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
}

/// Validate a game request and draw its board
pub fn draft_game<R: Rng + ?Sized>(new_game: NewGame, rng: &mut R) -> Result<GameDraft, Error> {
    validate_required("name", &new_game.name)?;
    if new_game.teams.len() > TEAMS_PER_GAME {
        return Err(Error::BadRequest(format!(
            "a bingo game has exactly {} teams, got {}",
            TEAMS_PER_GAME,
            new_game.teams.len()
        )));
    }

    let tile_pool = parse_tile_pool(&new_game.tile_pool);
    let tiles = draw_board_tiles(&tile_pool, new_game.board_size, rng)?;

    let mut requested = new_game.teams.into_iter();
    let teams: Vec<(String, Vec<String>)> = (1..=TEAMS_PER_GAME)
        .map(|number| {
            let team = requested.next().unwrap_or_default();
            let name = team
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("Team {}", number));
            let members: Vec<String> = team
                .members
                .iter()
                .map(|member| member.trim())
                .filter(|member| !member.is_empty())
                .map(String::from)
                .collect();
            (name, members)
        })
        .collect();

    let password = new_game
        .password
        .map(|password| password.trim().to_string())
        .filter(|password| !password.is_empty());

    Ok(GameDraft {
        name: new_game.name.trim().to_string(),
        mode: new_game.mode,
        board_size: new_game.board_size,
        tile_pool,
        password,
        start_time: new_game.start_time,
        duration_hours: new_game.duration_hours,
        teams,
        tiles,
    })
}

impl BingoService {
    pub fn new(store: BingoStore, blob: Arc<dyn BlobStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            blob,
            notifier,
        }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        self.store.ping().await.map_err(Error::DbError)
    }

    pub async fn create_game(&self, new_game: NewGame) -> Result<GameView, Error> {
        let draft = {
            let mut rng = rand::rng();
            draft_game(new_game, &mut rng)?
        };
        self.create_from_draft(draft).await
    }

    pub async fn create_from_draft(&self, draft: GameDraft) -> Result<GameView, Error> {
        let game = self.store.create_game(draft).await?;
        info!(
            "created {} bingo game {} ({}x{})",
            game.mode, game.id, game.board_size, game.board_size
        );
        self.get_game(game.id).await
    }

    /// Game, teams and boards, split by mode into one shared board or one board per team
    pub async fn get_game(&self, game_id: i64) -> Result<GameView, Error> {
        let game = self.store.get_game(game_id).await?;
        let teams = self.store.get_teams(game_id).await?;
        let boards = self.store.get_boards(game_id).await?;

        let (shared_board, team_boards) = match game.mode {
            GameMode::Lockout => (
                boards.into_iter().find(|board| board.team_id.is_none()),
                None,
            ),
            GameMode::Standard => (
                None,
                Some(
                    boards
                        .into_iter()
                        .filter_map(|board| board.team_id.map(|team_id| (team_id, board)))
                        .collect::<BTreeMap<_, _>>(),
                ),
            ),
        };

        Ok(GameView {
            game,
            teams,
            shared_board,
            team_boards,
        })
    }

    pub async fn list_games(&self, archived: bool) -> Result<Vec<BingoGame>, Error> {
        self.store.list_games(archived).await
    }

    pub async fn game_version(&self, game_id: i64) -> Result<GameVersion, Error> {
        self.store.game_version(game_id).await
    }

    pub async fn set_active(&self, game_id: i64, is_active: bool) -> Result<BingoGame, Error> {
        let game = self.store.set_active(game_id, is_active).await?;
        info!(
            "bingo game {} is now {}",
            game.id,
            if game.is_active { "open" } else { "closed" }
        );
        Ok(game)
    }

    pub async fn remove_member(&self, team_id: i64, player_name: &str) -> Result<(), Error> {
        validate_required("player_name", player_name)?;
        self.store.remove_member(team_id, player_name).await
    }

    /// Delete a game, then clean up its proof images without failing on leftovers
    pub async fn delete_game(&self, game_id: i64) -> Result<(), Error> {
        let proof_names = self.store.delete_game(game_id).await?;
        info!(
            "deleted bingo game {} with {} submissions",
            game_id,
            proof_names.len()
        );

        for name in proof_names {
            if let Err(e) = self.blob.delete(Bucket::BingoProofs, &name).await {
                warn!("failed to remove bingo proof {}: {}", name, e);
            }
        }
        Ok(())
    }

    pub async fn list_submissions(
        &self,
        game_id: i64,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<BingoSubmission>, Error> {
        self.store.get_game(game_id).await?;
        self.store.list_submissions(game_id, status).await
    }

    /// Player-facing tile claim, stored as pending until an operator reviews it
    pub async fn submit_tile(
        &self,
        form: TileSubmissionForm,
        proof: ProofImage,
    ) -> Result<BingoSubmission, Error> {
        validate_required("player_name", &form.player_name)?;
        validate_required("tile_text", &form.tile_text)?;

        let game = self.store.get_game(form.game_id).await?;
        if !game.is_active {
            return Err(Error::BadRequest(format!(
                "bingo game {} is no longer active",
                game.id
            )));
        }
        if let Some(expected) = &game.password {
            if form.password.as_deref() != Some(expected.as_str()) {
                return Err(Error::Unauthorized(String::from("invalid game password")));
            }
        }

        let team = self.store.get_team(form.team_id).await?;
        if team.game_id != game.id {
            return Err(Error::BadRequest(format!(
                "team {} does not play in game {}",
                team.id, game.id
            )));
        }

        if form.tile_position >= total_tiles(game.board_size) {
            return Err(Error::BadRequest(format!(
                "tile position {} is outside the {}x{} board",
                form.tile_position, game.board_size, game.board_size
            )));
        }
        let board_team = match game.mode {
            GameMode::Standard => Some(team.id),
            GameMode::Lockout => None,
        };
        let tile = self
            .store
            .board_tile(game.id, board_team, form.tile_position)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("no tile at position {}", form.tile_position))
            })?;
        let tile_text = form.tile_text.trim();
        if tile.text != tile_text {
            return Err(Error::BadRequest(format!(
                "tile {} is {:?}, not {:?}",
                tile.position, tile.text, tile_text
            )));
        }
        if tile.status == TileStatus::Approved {
            return Err(Error::BadRequest(format!(
                "tile {:?} has already been completed",
                tile.text
            )));
        }

        let unix_millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let proof_name = format!(
            "{}-{}-{}.{}",
            game.id,
            team.id,
            unix_millis,
            proof.image_type.extension()
        );
        let proof_url = self
            .blob
            .upload(Bucket::BingoProofs, &proof_name, proof.bytes)
            .await?;

        let submission = self
            .store
            .insert_submission(NewBingoSubmission {
                game_id: game.id,
                team_id: team.id,
                tile_text: tile.text.clone(),
                tile_position: tile.position,
                player_id: form.player_id,
                player_name: form.player_name.trim().to_string(),
                proof_name,
                proof_url,
            })
            .await?;
        info!(
            "bingo submission {} for {:?} from {} ({})",
            submission.id, submission.tile_text, submission.player_name, team.name
        );

        let notification = Notification::new(
            format!("New bingo submission in {}", game.name),
            format!(
                "{} ({}) completed {}",
                submission.player_name, team.name, submission.tile_text
            ),
        )
        .image(submission.proof_url.clone());
        if let Err(e) = self.notifier.notify(notification).await {
            error!("failed to send bingo notification: {}", e);
        }

        Ok(submission)
    }

    pub async fn review_submission(
        &self,
        id: i64,
        action: ReviewAction,
    ) -> Result<BingoReview, Error> {
        let review = match action {
            ReviewAction::Reject => {
                let submission = self.store.reject_submission(id).await?;
                BingoReview {
                    submission,
                    tile: None,
                    team_score: None,
                    winner_team_id: None,
                    game_archived: false,
                }
            }
            ReviewAction::Approve => self.store.approve_submission(id).await?,
        };
        info!(
            "bingo submission {} is now {}",
            review.submission.id, review.submission.status
        );

        if let Some(winner) = review.winner_team_id {
            if review.game_archived {
                info!(
                    "team {} won bingo game {}",
                    winner, review.submission.game_id
                );
                let notification = Notification::new(
                    "Bingo game finished",
                    format!(
                        "team {} won game {}",
                        winner, review.submission.game_id
                    ),
                );
                if let Err(e) = self.notifier.notify(notification).await {
                    error!("failed to send bingo winner notification: {}", e);
                }
            }
        }

        Ok(review)
    }
}
