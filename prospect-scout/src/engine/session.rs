// Long-lived engine session: owns the current model snapshot and exposes the
// request-level operations.
//
// A snapshot (level weights, normalization anchors, similarity pools) is
// immutable once built. Refits build a complete replacement off to the side
// and install it with a single pointer swap, so a request that cloned the
// previous `Arc` keeps a consistent view until it finishes.

use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::batch::{self, BatchReport};
use crate::engine::calibration::{calibrate, LevelWeights};
use crate::engine::context::EngineContext;
use crate::engine::features::{extract_raw, FeatureVector, Mode, RawFeatures};
use crate::engine::normalize::Anchors;
use crate::engine::projection::{self, CareerProjection};
use crate::engine::ratings::{self, RatingProfile};
use crate::engine::similarity::{PoolKind, SimilarityIndex, SimilarityNeighbor, SimilarityPool};
use crate::error::{check_player_id, ScoutError, ScoutResult};
use crate::model::{Level, PlayerId, PlayerRecord};
use crate::store::{PopulationCounts, ResultSink, StatSource};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub weights: LevelWeights,
    pub anchors: Anchors,
    pub index: SimilarityIndex,
    /// Population the anchors and pools were fit against. `None` until the
    /// first fit.
    pub fingerprint: Option<PopulationCounts>,
}

impl ModelSnapshot {
    /// Unfitted snapshot: fallback anchors and no pools.
    pub fn initial(weights: LevelWeights) -> Self {
        Self {
            weights,
            anchors: Anchors::fallback(),
            index: SimilarityIndex::default(),
            fingerprint: None,
        }
    }
}

fn fit_pool<S: StatSource + ?Sized>(
    source: &S,
    kind: PoolKind,
    population: &[(PlayerRecord, RawFeatures)],
    weights: &LevelWeights,
    anchors: &Anchors,
    cfg: &EngineConfig,
) -> Option<SimilarityPool> {
    let season = cfg.projection.current_season();
    let mut entries = Vec::new();
    for (player, _) in population {
        if player.level != Level::Mlb || !kind.admits(player.archetype()) {
            continue;
        }
        match extract_raw(source, player, kind.mode(), None, weights, season) {
            Ok(raw) => {
                let vector = raw.into_vector(anchors);
                if !vector.is_all_zero() {
                    entries.push((player.id, vector.normalized));
                }
            }
            Err(e) => warn!("Skipping player {} in {:?} pool: {:#}", player.id, kind, e),
        }
    }
    SimilarityPool::fit(kind, entries, cfg.similarity.min_pool_size)
}

/// Fit anchors and similarity pools against the current population under
/// `weights`. Players whose rows fail to load are skipped.
pub fn fit_snapshot<S: StatSource + ?Sized>(
    source: &S,
    weights: LevelWeights,
    cfg: &EngineConfig,
) -> Result<ModelSnapshot> {
    let fingerprint = source.population_counts()?;
    let season = cfg.projection.current_season();

    let mut population = Vec::new();
    for player in source.players()? {
        match extract_raw(source, &player, Mode::All, None, &weights, season) {
            Ok(raw) => population.push((player, raw)),
            Err(e) => warn!("Skipping player {} during fit: {:#}", player.id, e),
        }
    }

    let raws: Vec<RawFeatures> = population.iter().map(|(_, raw)| raw.clone()).collect();
    let anchors = Anchors::fit(&raws, &cfg.normalization);

    let index = SimilarityIndex {
        hitters: fit_pool(source, PoolKind::Hitters, &population, &weights, &anchors, cfg),
        pitchers: fit_pool(source, PoolKind::Pitchers, &population, &weights, &anchors, cfg),
    };

    info!(
        "Fitted model over {} players: {} data-driven anchors, hitter pool {}, pitcher pool {}",
        population.len(),
        anchors.data_driven_count(),
        index.hitters.as_ref().map_or(0, SimilarityPool::len),
        index.pitchers.as_ref().map_or(0, SimilarityPool::len),
    );

    Ok(ModelSnapshot {
        weights,
        anchors,
        index,
        fingerprint: Some(fingerprint),
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct ScoutSession<S> {
    source: S,
    config: EngineConfig,
    snapshot: RwLock<Arc<ModelSnapshot>>,
    /// Serializes refits and recalibrations.
    refit_lock: Mutex<()>,
}

impl<S: StatSource + ResultSink> ScoutSession<S> {
    /// Start a session with the persisted level weights, or the default
    /// table when none are stored or they cannot be read.
    pub fn new(source: S, config: EngineConfig) -> Self {
        let weights = match source.load_level_weights() {
            Ok(Some(weights)) => weights,
            Ok(None) => LevelWeights::defaults(),
            Err(e) => {
                warn!("Could not load stored level weights, using defaults: {:#}", e);
                LevelWeights::defaults()
            }
        };
        Self {
            source,
            config,
            snapshot: RwLock::new(Arc::new(ModelSnapshot::initial(weights))),
            refit_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The currently installed snapshot.
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn install(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        snapshot
    }

    /// Snapshot fit against the current population, refitting first if the
    /// population changed since the last fit. While another caller holds the
    /// refit lock the installed snapshot is returned as is, stale or not.
    pub fn ensure_fitted(&self) -> Result<Arc<ModelSnapshot>> {
        let counts = self.source.population_counts()?;
        let current = self.snapshot();
        if current.fingerprint == Some(counts) {
            return Ok(current);
        }

        // Only the first fit waits. Afterwards a request arriving mid-refit
        // is served the previous snapshot.
        let _guard = if current.fingerprint.is_some() {
            match self.refit_lock.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    debug!("Refit already running; serving the previous snapshot");
                    return Ok(current);
                }
            }
        } else {
            self.refit_lock.lock().unwrap_or_else(PoisonError::into_inner)
        };
        let current = self.snapshot();
        if current.fingerprint == Some(counts) {
            return Ok(current);
        }
        debug!("Population changed ({:?} -> {:?}); refitting", current.fingerprint, counts);
        let fitted = fit_snapshot(&self.source, current.weights.clone(), &self.config)?;
        Ok(self.install(fitted))
    }

    /// Unconditionally refit anchors and pools under the current weights.
    pub fn refit(&self) -> Result<Arc<ModelSnapshot>> {
        let _guard = self.refit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let weights = self.snapshot().weights.clone();
        let fitted = fit_snapshot(&self.source, weights, &self.config)?;
        Ok(self.install(fitted))
    }

    /// Learn level weights from the population and refit everything derived
    /// from them.
    ///
    /// Calibrated weights already in use are kept unless `force` is set. A
    /// calibration failure falls back to the default table; a failure to
    /// persist the result is logged and does not fail the call.
    pub fn calibrate_levels(&self, force: bool) -> ScoutResult<LevelWeights> {
        let _guard = self.refit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        if !force && current.weights.is_calibrated() {
            info!("Level weights already calibrated; pass force to recompute");
            return Ok(current.weights.clone());
        }

        let weights = match calibrate(&self.source, &self.config.calibration) {
            Ok(weights) => weights,
            Err(e) => {
                warn!("Level calibration failed, using default weights: {:#}", e);
                LevelWeights::defaults()
            }
        };
        if let Err(e) = self.source.save_level_weights(&weights) {
            warn!("Failed to persist level weights: {:#}", e);
        }

        let fitted = fit_snapshot(&self.source, weights.clone(), &self.config)?;
        self.install(fitted);
        Ok(weights)
    }

    fn lookup(&self, player_id: PlayerId) -> ScoutResult<PlayerRecord> {
        check_player_id(player_id)?;
        self.source
            .player(player_id)?
            .ok_or(ScoutError::NotFound(player_id))
    }

    pub fn extract_features(
        &self,
        player_id: PlayerId,
        mode: Mode,
        season: Option<i32>,
    ) -> ScoutResult<FeatureVector> {
        let player = self.lookup(player_id)?;
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(ctx.vector(&player, mode, season)?)
    }

    /// Up to `k` most similar top-tier players. Empty when the player has no
    /// data or the matching pool is too small.
    pub fn get_similar(&self, player_id: PlayerId, k: usize) -> ScoutResult<Vec<SimilarityNeighbor>> {
        if k == 0 {
            return Err(ScoutError::InvalidArgument {
                field: "k",
                message: "must be at least 1".to_string(),
            });
        }
        let player = self.lookup(player_id)?;
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(ctx.similar(&player, k)?)
    }

    pub fn rate(&self, player_id: PlayerId) -> ScoutResult<RatingProfile> {
        let player = self.lookup(player_id)?;
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(ratings::rate(&ctx, &player)?)
    }

    pub fn project_career(&self, player_id: PlayerId) -> ScoutResult<CareerProjection> {
        let player = self.lookup(player_id)?;
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(projection::project_career(&ctx, &player)?)
    }

    /// Store the `all`-mode feature vector of every player.
    pub fn populate_features(&self) -> ScoutResult<BatchReport> {
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(batch::populate_features(&ctx)?)
    }

    /// Store the rating profile of every player.
    pub fn populate_ratings(&self) -> ScoutResult<BatchReport> {
        let snapshot = self.ensure_fitted()?;
        let ctx = EngineContext::new(&self.source, &snapshot, &self.config);
        Ok(batch::populate_ratings(&ctx)?)
    }
}
