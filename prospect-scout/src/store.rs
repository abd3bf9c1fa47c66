// Storage seams: where the engine reads players and stat rows from, and
// where it writes computed features, ratings, and level weights to.

use anyhow::Result;
use serde::Serialize;

use crate::engine::calibration::LevelWeights;
use crate::engine::features::FeatureVector;
use crate::engine::ratings::RatingProfile;
use crate::model::{PlayerId, PlayerRecord, StatCategory, StatLine};

/// Population size, used to decide whether fitted state is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationCounts {
    pub players: u64,
    pub stat_rows: u64,
}

/// What an idempotent upsert actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// The stored row already held identical content; nothing was written.
    Unchanged,
}

/// Read side: players and their per-season stat rows.
pub trait StatSource {
    fn player(&self, id: PlayerId) -> Result<Option<PlayerRecord>>;

    /// All players, ordered by id.
    fn players(&self) -> Result<Vec<PlayerRecord>>;

    /// Stat rows of one category for a player, ordered by season then team.
    /// `season = None` returns every season.
    fn stat_lines(
        &self,
        player_id: PlayerId,
        category: StatCategory,
        season: Option<i32>,
    ) -> Result<Vec<StatLine>>;

    fn population_counts(&self) -> Result<PopulationCounts>;
}

/// Write side: denormalized caches keyed by player id plus the single
/// current level-weight row.
pub trait ResultSink {
    fn upsert_features(&self, player_id: PlayerId, features: &FeatureVector)
        -> Result<UpsertOutcome>;

    fn upsert_rating(&self, player_id: PlayerId, profile: &RatingProfile) -> Result<UpsertOutcome>;

    fn save_level_weights(&self, weights: &LevelWeights) -> Result<UpsertOutcome>;

    fn load_level_weights(&self) -> Result<Option<LevelWeights>>;
}
