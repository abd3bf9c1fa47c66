// Errors surfaced by the scouting engine's public operations.

use thiserror::Error;

use crate::model::PlayerId;

/// The only hard failures a caller of the engine sees. Missing or thin data
/// is never an error: it degrades to zero, empty, or default results.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("player {0} not found")]
    NotFound(PlayerId),

    #[error("invalid argument `{field}`: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type ScoutResult<T> = Result<T, ScoutError>;

/// Reject non-positive player ids before touching storage.
pub(crate) fn check_player_id(player_id: PlayerId) -> ScoutResult<()> {
    if player_id <= 0 {
        return Err(ScoutError::InvalidArgument {
            field: "player_id",
            message: format!("must be a positive integer, got {player_id}"),
        });
    }
    Ok(())
}
