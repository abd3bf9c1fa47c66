// Borrowed view over one model snapshot, shared by the rating and projection
// code paths so they see a single consistent state for a whole request.

use anyhow::Result;

use crate::config::EngineConfig;
use crate::engine::features::{extract_raw, FeatureVector, Mode};
use crate::engine::session::ModelSnapshot;
use crate::engine::similarity::{PoolKind, SimilarityNeighbor};
use crate::model::PlayerRecord;
use crate::store::StatSource;

pub struct EngineContext<'a, S: ?Sized> {
    pub source: &'a S,
    pub snapshot: &'a ModelSnapshot,
    pub config: &'a EngineConfig,
}

impl<'a, S: StatSource + ?Sized> EngineContext<'a, S> {
    pub fn new(source: &'a S, snapshot: &'a ModelSnapshot, config: &'a EngineConfig) -> Self {
        Self {
            source,
            snapshot,
            config,
        }
    }

    pub fn current_season(&self) -> i32 {
        self.config.projection.current_season()
    }

    /// Normalized feature vector under this snapshot's weights and anchors.
    pub fn vector(
        &self,
        player: &PlayerRecord,
        mode: Mode,
        season: Option<i32>,
    ) -> Result<FeatureVector> {
        let raw = extract_raw(
            self.source,
            player,
            mode,
            season,
            &self.snapshot.weights,
            self.current_season(),
        )?;
        Ok(raw.into_vector(&self.snapshot.anchors))
    }

    /// Comparables for `player` from the pool matching its archetype. Empty
    /// when that pool is unfit.
    pub fn similar(&self, player: &PlayerRecord, k: usize) -> Result<Vec<SimilarityNeighbor>> {
        let kind = PoolKind::for_archetype(player.archetype());
        let Some(pool) = self.snapshot.index.pool(kind) else {
            return Ok(Vec::new());
        };
        let vector = self.vector(player, kind.mode(), None)?;
        Ok(pool.query(player.id, &vector.normalized, k))
    }
}
