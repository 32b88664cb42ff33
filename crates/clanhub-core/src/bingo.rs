//! Bingo board rules: drawing a board from a tile pool and deciding when a team has won.

use rand::{seq::SliceRandom, Rng};

use crate::{validate_board_size, CoreError, GameMode};

/// Number of tiles on an N x N board
pub fn total_tiles(board_size: u32) -> u32 {
    board_size * board_size
}

/// Approved tiles a single team needs to win.
///
/// - `Standard`: every tile on the team's own board
/// - `Lockout`: a strict majority of the shared board
pub fn tiles_to_win(mode: GameMode, board_size: u32) -> u32 {
    let total = total_tiles(board_size);
    match mode {
        GameMode::Standard => total,
        GameMode::Lockout => total / 2 + 1,
    }
}

/// Shuffle the pool and keep the first N² tiles, in board position order
pub fn draw_board_tiles<R: Rng + ?Sized>(
    pool: &[String],
    board_size: u32,
    rng: &mut R,
) -> Result<Vec<String>, CoreError> {
    let required = validate_board_size(board_size, pool.len())?;

    let mut tiles = pool.to_vec();
    tiles.shuffle(rng);
    tiles.truncate(required);

    Ok(tiles)
}

/// Find the first team whose approved tile count reaches the win threshold.
///
/// `approved_counts` holds, per team, the approved tiles on that team's board (standard) or the
/// tiles that team has claimed on the shared board (lockout).
pub fn detect_winner<T: Copy>(
    mode: GameMode,
    board_size: u32,
    approved_counts: &[(T, u32)],
) -> Option<T> {
    let threshold = tiles_to_win(mode, board_size);
    approved_counts
        .iter()
        .find(|(_, count)| *count >= threshold)
        .map(|(team, _)| *team)
}
