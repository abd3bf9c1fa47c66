// Career trajectory projection: cumulative top-tier value, outcome bands,
// risk, success probability, and arrival timing.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::context::EngineContext;
use crate::engine::features::player_age;
use crate::engine::similarity::SimilarityNeighbor;
use crate::engine::tables::{
    age_bracket, career_label, FALLBACK_ETA_YEARS, HIGH_RISK_SPREAD, HITTER_SUCCESS_CURVE,
    MEDIUM_RISK_SPREAD, NO_COMP_CEILING_MULTIPLE, NO_COMP_FLOOR_MULTIPLE, PITCHER_SUCCESS_CURVE,
    RECENT_RATE_SEASONS,
};
use crate::model::{Archetype, Level, PlayerId, PlayerRecord, StatCategory, StatLine};
use crate::store::StatSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Low,
    Medium,
    High,
}

impl RiskClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskClass::Low => "low",
            RiskClass::Medium => "medium",
            RiskClass::High => "high",
        }
    }
}

/// Ceiling or floor outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeBand {
    pub label: String,
    pub value: f64,
    /// Comparable that defines this outcome, when there were comps.
    pub comp_name: Option<String>,
    pub comparison: String,
}

impl OutcomeBand {
    fn new(value: f64, comp_name: Option<String>) -> Self {
        let label = career_label(value).to_string();
        let comparison = match &comp_name {
            Some(name) => format!("{label} ({name}, {value:.1} WAR)"),
            None => format!("{label} ({value:.1} WAR)"),
        };
        Self {
            label,
            value,
            comp_name,
            comparison,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerProjection {
    pub player_id: PlayerId,
    pub graduated: bool,
    /// Cumulative top-tier value to date.
    pub current_value: f64,
    pub projected_value: f64,
    pub ceiling: OutcomeBand,
    pub floor: OutcomeBand,
    pub risk: RiskClass,
    /// [0, 0.99]
    pub success_probability: f64,
    /// First top-tier season, for graduated players.
    pub debut_year: Option<i32>,
    /// Expected arrival season, for prospects.
    pub eta_year: Option<i32>,
    pub comparables: Vec<SimilarityNeighbor>,
}

// ---------------------------------------------------------------------------
// Career value
// ---------------------------------------------------------------------------

/// Top-tier WAR per season, summed across teams and both standard tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CareerLedger {
    pub by_season: BTreeMap<i32, f64>,
}

impl CareerLedger {
    pub fn from_lines<'a>(player: &PlayerRecord, lines: impl IntoIterator<Item = &'a StatLine>) -> Self {
        let mut by_season = BTreeMap::new();
        for line in lines {
            if !line.level_or(player.level).is_top_tier() {
                continue;
            }
            let Some(war) = line.standard_war().filter(|w| w.is_finite()) else {
                continue;
            };
            *by_season.entry(line.season).or_insert(0.0) += war;
        }
        Self { by_season }
    }

    pub fn total(&self) -> f64 {
        self.by_season.values().sum()
    }

    pub fn debut_season(&self) -> Option<i32> {
        self.by_season.keys().next().copied()
    }

    /// Mean seasonal value over the most recent seasons.
    pub fn recent_rate(&self) -> f64 {
        let recent: Vec<f64> = self
            .by_season
            .values()
            .rev()
            .take(RECENT_RATE_SEASONS)
            .copied()
            .collect();
        if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        }
    }
}

fn standard_lines<S: StatSource + ?Sized>(source: &S, player: &PlayerRecord) -> Result<Vec<StatLine>> {
    let mut lines = source.stat_lines(player.id, StatCategory::StandardBatting, None)?;
    lines.extend(source.stat_lines(player.id, StatCategory::StandardPitching, None)?);
    Ok(lines)
}

// ---------------------------------------------------------------------------
// Pure projection rules
// ---------------------------------------------------------------------------

/// Value still to come for an established player at `age`.
pub fn remaining_value(recent_rate: f64, age: u32) -> f64 {
    let bracket = age_bracket(age);
    recent_rate.max(0.0) * bracket.remaining_years * bracket.decay
}

/// Spread-based risk, raised for anyone currently below the top tier. A
/// player sent down keeps the bump even with top-tier value on record.
pub fn risk_class(ceiling: f64, floor: f64, level: Level) -> RiskClass {
    let spread = ceiling - floor;
    let base = if spread > HIGH_RISK_SPREAD {
        RiskClass::High
    } else if spread > MEDIUM_RISK_SPREAD {
        RiskClass::Medium
    } else {
        RiskClass::Low
    };
    match level {
        Level::A | Level::HighA | Level::Rookie | Level::Ncaa | Level::HighSchool => RiskClass::High,
        Level::Aa if base == RiskClass::Low => RiskClass::Medium,
        _ => base,
    }
}

pub fn success_probability(archetype: Archetype, projected: f64) -> f64 {
    match archetype {
        Archetype::Pitcher => PITCHER_SUCCESS_CURVE.probability(projected),
        Archetype::PositionPlayer | Archetype::TwoWay => HITTER_SUCCESS_CURVE.probability(projected),
    }
}

/// A comparable's career summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CompCareer {
    pub name: String,
    pub value: f64,
    pub debut_age: Option<u32>,
}

/// Ceiling and floor from comps, or multiples of `projected` without them.
pub fn outcome_bands(comps: &[CompCareer], projected: f64) -> (OutcomeBand, OutcomeBand) {
    let best = comps
        .iter()
        .max_by(|a, b| a.value.total_cmp(&b.value));
    let worst = comps
        .iter()
        .min_by(|a, b| a.value.total_cmp(&b.value));
    match (best, worst) {
        (Some(best), Some(worst)) => (
            OutcomeBand::new(best.value, Some(best.name.clone())),
            OutcomeBand::new(worst.value, Some(worst.name.clone())),
        ),
        _ => (
            OutcomeBand::new(projected * NO_COMP_CEILING_MULTIPLE, None),
            OutcomeBand::new(projected * NO_COMP_FLOOR_MULTIPLE, None),
        ),
    }
}

/// Arrival season from the comps' debut ages relative to `age`.
pub fn eta_year(comps: &[CompCareer], age: u32, current_season: i32) -> i32 {
    let gaps: Vec<f64> = comps
        .iter()
        .filter_map(|c| c.debut_age)
        .map(|debut| (f64::from(debut) - f64::from(age)).max(0.0))
        .collect();
    if gaps.is_empty() {
        return current_season + FALLBACK_ETA_YEARS;
    }
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    current_season + mean.round() as i32
}

// ---------------------------------------------------------------------------
// Engine entry point
// ---------------------------------------------------------------------------

fn comp_career<S: StatSource + ?Sized>(
    ctx: &EngineContext<'_, S>,
    neighbor: &SimilarityNeighbor,
) -> Result<Option<CompCareer>> {
    let Some(comp) = ctx.source.player(neighbor.player_id)? else {
        return Ok(None);
    };
    let lines = standard_lines(ctx.source, &comp)?;
    let ledger = CareerLedger::from_lines(&comp, &lines);
    let debut_age = ledger
        .debut_season()
        .and_then(|season| player_age(&comp, &lines, season));
    Ok(Some(CompCareer {
        name: comp.name,
        value: ledger.total(),
        debut_age,
    }))
}

pub fn project_career<S: StatSource + ?Sized>(
    ctx: &EngineContext<'_, S>,
    player: &PlayerRecord,
) -> Result<CareerProjection> {
    let cfg = &ctx.config.projection;
    let season = ctx.current_season();
    let archetype = player.archetype();

    let lines = standard_lines(ctx.source, player)?;
    let ledger = CareerLedger::from_lines(player, &lines);
    let current_value = ledger.total();
    let graduated = player.level.is_top_tier() || current_value != 0.0;
    let age = player_age(player, &lines, season).unwrap_or(cfg.default_age);

    let comparables = ctx.similar(player, cfg.comp_count)?;
    let mut comps = Vec::with_capacity(comparables.len());
    for neighbor in &comparables {
        if let Some(c) = comp_career(ctx, neighbor)? {
            comps.push(c);
        }
    }

    let (projected_value, debut_year, eta) = if graduated {
        let projected = current_value + remaining_value(ledger.recent_rate(), age);
        (projected, ledger.debut_season(), None)
    } else {
        let base = if comps.is_empty() {
            cfg.fallback_comp_value
        } else {
            comps.iter().map(|c| c.value).sum::<f64>() / comps.len() as f64
        };
        (
            base * cfg.prospect_optimism,
            None,
            Some(eta_year(&comps, age, season)),
        )
    };

    let (ceiling, floor) = outcome_bands(&comps, projected_value);
    let risk = risk_class(ceiling.value, floor.value, player.level);

    Ok(CareerProjection {
        player_id: player.id,
        graduated,
        current_value,
        projected_value,
        ceiling,
        floor,
        risk,
        success_probability: success_probability(archetype, projected_value),
        debut_year,
        eta_year: eta,
        comparables,
    })
}
