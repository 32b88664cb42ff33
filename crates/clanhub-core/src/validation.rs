//! Input validation shared by the bingo and submission workflows

use crate::CoreError;

/// Largest board the engine accepts (N x N)
pub const MAX_BOARD_SIZE: u32 = 10;

/// Split a pasted tile pool into trimmed, non-empty lines
pub fn parse_tile_pool(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Check that a board of `board_size` x `board_size` can be drawn from `pool_len` tiles
pub fn validate_board_size(board_size: u32, pool_len: usize) -> Result<usize, CoreError> {
    if board_size == 0 || board_size > MAX_BOARD_SIZE {
        return Err(CoreError::InvalidBoard(format!(
            "board size must be between 1 and {}, got {}",
            MAX_BOARD_SIZE, board_size
        )));
    }

    let required = (board_size * board_size) as usize;
    if pool_len < required {
        return Err(CoreError::InvalidBoard(format!(
            "a {}x{} board needs at least {} tiles, only {} provided",
            board_size, board_size, required, pool_len
        )));
    }

    Ok(required)
}

pub fn validate_required(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
