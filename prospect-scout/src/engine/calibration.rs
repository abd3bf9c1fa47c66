// Level weight calibration: learns one scalar per competition tier from how
// each tier's qualifying players perform relative to the top tier.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CalibrationConfig;
use crate::engine::tables::{default_level_factor, LEVEL_WEIGHT_MAX, LEVEL_WEIGHT_MIN};
use crate::model::{Level, StatBlock, StatCategory, StatLine};
use crate::store::StatSource;

// ---------------------------------------------------------------------------
// LevelWeights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// The static default table.
    Defaults,
    /// Learned from population statistics.
    Calibrated,
}

/// Per-tier multipliers applied by the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelWeights {
    pub source: WeightSource,
    pub factors: BTreeMap<Level, f64>,
}

impl Default for LevelWeights {
    fn default() -> Self {
        Self::defaults()
    }
}

impl LevelWeights {
    pub fn defaults() -> Self {
        let factors = Level::ALL
            .into_iter()
            .map(|level| (level, default_level_factor(level)))
            .collect();
        Self {
            source: WeightSource::Defaults,
            factors,
        }
    }

    /// Factor for `level`, always within [0.1, 1.0] and exactly 1.0 for the
    /// top tier. Tiers missing from a stored set use the default table.
    pub fn factor(&self, level: Level) -> f64 {
        if level.is_top_tier() {
            return LEVEL_WEIGHT_MAX;
        }
        let raw = self
            .factors
            .get(&level)
            .copied()
            .filter(|f| f.is_finite())
            .unwrap_or_else(|| default_level_factor(level));
        raw.clamp(LEVEL_WEIGHT_MIN, LEVEL_WEIGHT_MAX)
    }

    pub fn is_calibrated(&self) -> bool {
        self.source == WeightSource::Calibrated
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Metrics compared between a tier and the top tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Metric {
    BattingAverage,
    OnBase,
    Slugging,
    HomeRuns,
    BattingWalks,
    BattingStrikeouts,
    StolenBases,
    Era,
    PitchingStrikeouts,
    PitchingWalks,
    EraPlus,
    Whip,
}

impl Metric {
    /// Lower values mean better performance, so the tier ratio is inverted.
    fn lower_is_better(self) -> bool {
        matches!(
            self,
            Metric::BattingStrikeouts | Metric::Era | Metric::PitchingWalks | Metric::Whip
        )
    }
}

fn batting_metrics(line: &StatLine) -> Vec<(Metric, Option<f64>)> {
    match &line.stats {
        StatBlock::StandardBatting(s) => vec![
            (Metric::BattingAverage, s.ba),
            (Metric::OnBase, s.obp),
            (Metric::Slugging, s.slg),
            (Metric::HomeRuns, s.hr),
            (Metric::BattingWalks, s.bb),
            (Metric::BattingStrikeouts, s.so),
            (Metric::StolenBases, s.sb),
        ],
        _ => Vec::new(),
    }
}

fn pitching_metrics(line: &StatLine) -> Vec<(Metric, Option<f64>)> {
    match &line.stats {
        StatBlock::StandardPitching(s) => vec![
            (Metric::Era, s.era),
            (Metric::PitchingStrikeouts, s.so),
            (Metric::PitchingWalks, s.bb),
            (Metric::EraPlus, s.era_plus),
            (Metric::Whip, s.whip),
        ],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Running per-metric sums of non-zero values for one tier.
#[derive(Debug, Clone, Default)]
pub struct TierAggregate {
    sums: BTreeMap<Metric, (f64, usize)>,
    players: usize,
}

impl TierAggregate {
    fn add(&mut self, metrics: Vec<(Metric, Option<f64>)>) {
        self.players += 1;
        for (metric, value) in metrics {
            let Some(v) = value.filter(|v| v.is_finite() && *v != 0.0) else {
                continue;
            };
            let entry = self.sums.entry(metric).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    fn mean(&self, metric: Metric) -> Option<f64> {
        self.sums
            .get(&metric)
            .filter(|(_, n)| *n > 0)
            .map(|(sum, n)| sum / *n as f64)
    }

    pub fn qualifying_players(&self) -> usize {
        self.players
    }
}

/// Most recent season's row, preferring the one with the most playing time
/// when a player appeared for several teams that season.
fn latest_row<'a>(lines: &'a [StatLine], playing_time: impl Fn(&StatLine) -> f64) -> Option<&'a StatLine> {
    let latest = lines.iter().map(|l| l.season).max()?;
    lines
        .iter()
        .filter(|l| l.season == latest)
        .max_by(|a, b| {
            playing_time(a)
                .partial_cmp(&playing_time(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn plate_appearances(line: &StatLine) -> f64 {
    match &line.stats {
        StatBlock::StandardBatting(s) => s.pa.unwrap_or(0.0),
        _ => 0.0,
    }
}

fn innings(line: &StatLine) -> f64 {
    match &line.stats {
        StatBlock::StandardPitching(s) => s.ip.unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Collect tier aggregates from every player whose tier is known.
pub fn collect_aggregates<S: StatSource + ?Sized>(
    source: &S,
    cfg: &CalibrationConfig,
) -> Result<BTreeMap<Level, TierAggregate>> {
    let mut tiers: BTreeMap<Level, TierAggregate> = BTreeMap::new();

    for player in source.players()? {
        if player.level == Level::Unknown {
            continue;
        }

        let batting = source.stat_lines(player.id, StatCategory::StandardBatting, None)?;
        if let Some(row) = latest_row(&batting, plate_appearances) {
            if plate_appearances(row) > cfg.min_plate_appearances {
                tiers
                    .entry(player.level)
                    .or_default()
                    .add(batting_metrics(row));
            }
        }

        let pitching = source.stat_lines(player.id, StatCategory::StandardPitching, None)?;
        if let Some(row) = latest_row(&pitching, innings) {
            if innings(row) > cfg.min_innings {
                tiers
                    .entry(player.level)
                    .or_default()
                    .add(pitching_metrics(row));
            }
        }
    }

    Ok(tiers)
}

// ---------------------------------------------------------------------------
// Weight computation
// ---------------------------------------------------------------------------

const ALL_METRICS: [Metric; 12] = [
    Metric::BattingAverage,
    Metric::OnBase,
    Metric::Slugging,
    Metric::HomeRuns,
    Metric::BattingWalks,
    Metric::BattingStrikeouts,
    Metric::StolenBases,
    Metric::Era,
    Metric::PitchingStrikeouts,
    Metric::PitchingWalks,
    Metric::EraPlus,
    Metric::Whip,
];

/// Turn tier aggregates into a bounded weight set.
///
/// With no top-tier population the whole default table is returned. A lower
/// tier with no usable ratio keeps its default factor.
pub fn weights_from_aggregates(tiers: &BTreeMap<Level, TierAggregate>) -> LevelWeights {
    let Some(top) = tiers.get(&Level::Mlb) else {
        debug!("no qualifying top-tier players; using default level weights");
        return LevelWeights::defaults();
    };

    let mut factors = BTreeMap::new();
    factors.insert(Level::Mlb, LEVEL_WEIGHT_MAX);

    for level in Level::ALL {
        if level.is_top_tier() {
            continue;
        }
        let learned = match (level, tiers.get(&level)) {
            (Level::Unknown, _) | (_, None) => None,
            (_, Some(agg)) => tier_factor(agg, top),
        };
        let factor = learned.unwrap_or_else(|| default_level_factor(level));
        factors.insert(level, factor.clamp(LEVEL_WEIGHT_MIN, LEVEL_WEIGHT_MAX));
    }

    LevelWeights {
        source: WeightSource::Calibrated,
        factors,
    }
}

/// Unweighted mean of every metric ratio available for a tier.
fn tier_factor(tier: &TierAggregate, top: &TierAggregate) -> Option<f64> {
    let ratios: Vec<f64> = ALL_METRICS
        .iter()
        .filter_map(|&metric| {
            let level_avg = tier.mean(metric)?;
            let top_avg = top.mean(metric)?;
            let ratio = if metric.lower_is_better() {
                top_avg / level_avg
            } else {
                level_avg / top_avg
            };
            ratio.is_finite().then_some(ratio)
        })
        .collect();

    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
}

/// Full calibration pass over the population.
pub fn calibrate<S: StatSource + ?Sized>(
    source: &S,
    cfg: &CalibrationConfig,
) -> Result<LevelWeights> {
    let tiers = collect_aggregates(source, cfg)?;
    let weights = weights_from_aggregates(&tiers);
    info!(
        "Level calibration over {} tiers ({} top-tier players): {:?}",
        tiers.len(),
        tiers.get(&Level::Mlb).map_or(0, TierAggregate::qualifying_players),
        weights.factors
    );
    Ok(weights)
}
