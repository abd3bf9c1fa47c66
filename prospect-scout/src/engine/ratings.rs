// Rating synthesis: tool grades, overall, potential, and confidence from
// normalized feature vectors.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::context::EngineContext;
use crate::engine::features::{Direction, Feature, FeatureVector, Mode};
use crate::engine::tables::{
    CONFIDENCE_MAX, DEFAULT_TOOL_GRADE, GRADE_MAX, HITTER_WEIGHTS, MIN_GROWTH_SEASONS,
    PITCHER_WEIGHTS, TWO_WAY_PRIMARY_SHARE, TWO_WAY_SECONDARY_SHARE,
};
use crate::model::{Archetype, PlayerId, PlayerRecord, StatCategory};
use crate::store::StatSource;

// ---------------------------------------------------------------------------
// Profile types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HittingGrades {
    pub contact_left: f64,
    pub contact_right: f64,
    pub power_left: f64,
    pub power_right: f64,
    pub vision: f64,
    pub discipline: f64,
    pub fielding: f64,
    pub arm_strength: f64,
    pub arm_accuracy: f64,
    pub speed: f64,
    pub stealing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingGrades {
    pub k_rating: f64,
    pub bb_rating: f64,
    pub gb_rating: f64,
    pub hr_rating: f64,
    pub command_rating: f64,
    pub fielding: f64,
    pub arm_strength: f64,
    pub speed: f64,
    pub stealing: f64,
}

/// Grade blocks present for the player's archetype. Two-way players carry
/// both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolGrades {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hitting: Option<HittingGrades>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitching: Option<PitchingGrades>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonOverall {
    pub season: i32,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingProfile {
    pub player_id: PlayerId,
    pub archetype: Archetype,
    pub grades: ToolGrades,
    /// [0, 99]
    pub overall: f64,
    /// [0, 99]
    pub potential: f64,
    /// [0, 100]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hitting_overall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitching_overall: Option<f64>,
    /// Oldest season first.
    pub history: Vec<SeasonOverall>,
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

fn clip_grade(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, GRADE_MAX)
    } else {
        DEFAULT_TOOL_GRADE
    }
}

/// Normalized value of `feature` oriented so that higher is better.
fn oriented(vector: &FeatureVector, feature: Feature) -> Option<f64> {
    let v = vector.normalized_value(feature)?;
    Some(match feature.def().direction {
        Direction::HigherIsBetter => v,
        Direction::LowerIsBetter => 100.0 - v,
    })
}

fn grade(vector: &FeatureVector, feature: Feature) -> f64 {
    oriented(vector, feature).map_or(DEFAULT_TOOL_GRADE, clip_grade)
}

const COMMAND_FEATURES: [Feature; 9] = [
    Feature::Era,
    Feature::Fip,
    Feature::Whip,
    Feature::EraMinus,
    Feature::FipMinus,
    Feature::XfipMinus,
    Feature::Siera,
    Feature::PitchingWar,
    Feature::PitchingRaa,
];

impl HittingGrades {
    pub fn from_vector(v: &FeatureVector) -> Self {
        let contact = grade(v, Feature::BattingAverage);
        let power = grade(v, Feature::Slugging);
        let arm = grade(v, Feature::Assists);
        let wheels = grade(v, Feature::StolenBases);
        Self {
            contact_left: contact,
            contact_right: contact,
            power_left: power,
            power_right: power,
            vision: grade(v, Feature::WalkPct),
            discipline: grade(v, Feature::StrikeoutPct),
            fielding: grade(v, Feature::FieldingPct),
            arm_strength: arm,
            arm_accuracy: arm,
            speed: wheels,
            stealing: wheels,
        }
    }

    pub fn overall(&self) -> f64 {
        let w = HITTER_WEIGHTS;
        clip_grade(
            self.contact_left * w.contact_left
                + self.contact_right * w.contact_right
                + self.power_left * w.power_left
                + self.power_right * w.power_right
                + self.vision * w.vision
                + self.discipline * w.discipline
                + self.fielding * w.fielding
                + self.arm_strength * w.arm_strength
                + self.arm_accuracy * w.arm_accuracy
                + self.speed * w.speed
                + self.stealing * w.stealing,
        )
    }
}

impl PitchingGrades {
    pub fn from_vector(v: &FeatureVector) -> Self {
        let command: Vec<f64> = COMMAND_FEATURES
            .iter()
            .filter_map(|f| oriented(v, *f))
            .collect();
        let command_rating = if command.is_empty() {
            DEFAULT_TOOL_GRADE
        } else {
            clip_grade(command.iter().sum::<f64>() / command.len() as f64)
        };
        let wheels = grade(v, Feature::StolenBases);

        Self {
            k_rating: grade(v, Feature::PitcherStrikeoutPct),
            bb_rating: grade(v, Feature::PitcherWalkPct),
            gb_rating: grade(v, Feature::LeftOnBasePct),
            hr_rating: grade(v, Feature::PitcherHomeRunPct),
            command_rating,
            fielding: grade(v, Feature::FieldingPct),
            arm_strength: grade(v, Feature::Assists),
            speed: wheels,
            stealing: wheels,
        }
    }

    pub fn overall(&self) -> f64 {
        let w = PITCHER_WEIGHTS;
        clip_grade(
            self.k_rating * w.k_rating
                + self.bb_rating * w.bb_rating
                + self.gb_rating * w.gb_rating
                + self.hr_rating * w.hr_rating
                + self.command_rating * w.command_rating
                + self.fielding * w.fielding
                + self.arm_strength * w.arm_strength
                + self.speed * w.speed
                + self.stealing * w.stealing,
        )
    }
}

/// `0.6 * max + 0.4 * min` of the two sides.
pub fn two_way_overall(hitting: f64, pitching: f64) -> f64 {
    clip_grade(
        TWO_WAY_PRIMARY_SHARE * hitting.max(pitching)
            + TWO_WAY_SECONDARY_SHARE * hitting.min(pitching),
    )
}

/// `100 - stdev` of the normalized values, or 0 when no feature is present.
pub fn confidence(vectors: &[&FeatureVector]) -> f64 {
    if !vectors.iter().any(|v| v.has_data()) {
        return 0.0;
    }
    let values: Vec<f64> = vectors
        .iter()
        .flat_map(|v| v.normalized.iter().copied())
        .collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (CONFIDENCE_MAX - var.sqrt()).clamp(0.0, CONFIDENCE_MAX)
}

/// Current-form grades and overall for one archetype.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub grades: ToolGrades,
    pub overall: f64,
    pub hitting_overall: Option<f64>,
    pub pitching_overall: Option<f64>,
    pub confidence: f64,
}

/// Build grades from whichever vectors the archetype calls for.
pub fn synthesize(
    archetype: Archetype,
    hitting: Option<&FeatureVector>,
    pitching: Option<&FeatureVector>,
) -> Synthesis {
    let hit = hitting
        .filter(|_| archetype.hits())
        .map(HittingGrades::from_vector);
    let pit = pitching
        .filter(|_| archetype.pitches())
        .map(PitchingGrades::from_vector);
    let hit_overall = hit.as_ref().map(HittingGrades::overall);
    let pit_overall = pit.as_ref().map(PitchingGrades::overall);

    let overall = match (hit_overall, pit_overall) {
        (Some(h), Some(p)) => two_way_overall(h, p),
        (Some(h), None) => h,
        (None, Some(p)) => p,
        (None, None) => DEFAULT_TOOL_GRADE,
    };

    let used: Vec<&FeatureVector> = [
        hitting.filter(|_| archetype.hits()),
        pitching.filter(|_| archetype.pitches()),
    ]
    .into_iter()
    .flatten()
    .collect();

    Synthesis {
        grades: ToolGrades {
            hitting: hit,
            pitching: pit,
        },
        overall,
        hitting_overall: hit_overall.filter(|_| archetype == Archetype::TwoWay),
        pitching_overall: pit_overall.filter(|_| archetype == Archetype::TwoWay),
        confidence: confidence(&used),
    }
}

// ---------------------------------------------------------------------------
// Potential
// ---------------------------------------------------------------------------

/// Trend-based potential from an oldest-first overall series.
///
/// Needs at least two points. A non-negative trend projects
/// `last + multiplier * trend`; a declining player keeps the best of their
/// history and current overall. Always capped at 99.
pub fn potential_from_history(history: &[f64], current: f64, multiplier: f64) -> Option<f64> {
    let (first, last) = match history {
        [first, .., last] => (*first, *last),
        _ => return None,
    };
    let trend = (last - first) / (history.len() - 1) as f64;
    let potential = if trend >= 0.0 {
        last + multiplier * trend
    } else {
        history.iter().copied().fold(current, f64::max)
    };
    Some(clip_grade(potential))
}

/// First-to-peak improvement of a series, when it has enough seasons and
/// actually improved.
pub fn first_to_peak_growth(history: &[f64]) -> Option<f64> {
    if history.len() < MIN_GROWTH_SEASONS {
        return None;
    }
    let first = history[0];
    let peak = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let growth = peak - first;
    (growth > 0.0).then_some(growth)
}

// ---------------------------------------------------------------------------
// Engine entry points
// ---------------------------------------------------------------------------

fn blended(hit: Option<f64>, pit: Option<f64>) -> Option<f64> {
    match (hit, pit) {
        (Some(h), Some(p)) => Some(two_way_overall(h, p)),
        (h, p) => h.or(p),
    }
}

/// Overall rating per season over the last `history_seasons` seasons found in
/// the archetype's standard tables, oldest first. A side with no data in a
/// season does not contribute to that season's overall.
pub fn season_history<S: StatSource + ?Sized>(
    ctx: &EngineContext<'_, S>,
    player: &PlayerRecord,
) -> Result<Vec<SeasonOverall>> {
    let archetype = player.archetype();
    let mut seasons = BTreeSet::new();
    if archetype.hits() {
        for line in ctx.source.stat_lines(player.id, StatCategory::StandardBatting, None)? {
            seasons.insert(line.season);
        }
    }
    if archetype.pitches() {
        for line in ctx.source.stat_lines(player.id, StatCategory::StandardPitching, None)? {
            seasons.insert(line.season);
        }
    }

    let keep = ctx.config.ratings.history_seasons;
    let skip = seasons.len().saturating_sub(keep);

    let mut history = Vec::new();
    for season in seasons.into_iter().skip(skip) {
        let hit = if archetype.hits() {
            let v = ctx.vector(player, Mode::Hitting, Some(season))?;
            v.has_data().then(|| HittingGrades::from_vector(&v).overall())
        } else {
            None
        };
        let pit = if archetype.pitches() {
            let v = ctx.vector(player, Mode::Pitching, Some(season))?;
            v.has_data().then(|| PitchingGrades::from_vector(&v).overall())
        } else {
            None
        };
        if let Some(overall) = blended(hit, pit) {
            history.push(SeasonOverall { season, overall });
        }
    }
    Ok(history)
}

/// Mean first-to-peak growth among the player's comparables.
fn comp_growth<S: StatSource + ?Sized>(
    ctx: &EngineContext<'_, S>,
    player: &PlayerRecord,
) -> Result<Option<f64>> {
    let comps = ctx.similar(player, ctx.config.ratings.comp_count)?;
    let mut growths = Vec::new();
    for comp in comps {
        let Some(comp_player) = ctx.source.player(comp.player_id)? else {
            continue;
        };
        let series: Vec<f64> = season_history(ctx, &comp_player)?
            .into_iter()
            .map(|s| s.overall)
            .collect();
        if let Some(g) = first_to_peak_growth(&series) {
            growths.push(g);
        }
    }
    if growths.is_empty() {
        return Ok(None);
    }
    Ok(Some(growths.iter().sum::<f64>() / growths.len() as f64))
}

/// Full rating profile for `player`.
pub fn rate<S: StatSource + ?Sized>(
    ctx: &EngineContext<'_, S>,
    player: &PlayerRecord,
) -> Result<RatingProfile> {
    let archetype = player.archetype();
    let hitting = if archetype.hits() {
        Some(ctx.vector(player, Mode::Hitting, None)?)
    } else {
        None
    };
    let pitching = if archetype.pitches() {
        Some(ctx.vector(player, Mode::Pitching, None)?)
    } else {
        None
    };

    let synthesis = synthesize(archetype, hitting.as_ref(), pitching.as_ref());
    let history = season_history(ctx, player)?;
    let series: Vec<f64> = history.iter().map(|s| s.overall).collect();

    let potential = match potential_from_history(
        &series,
        synthesis.overall,
        ctx.config.ratings.trend_multiplier,
    ) {
        Some(p) => p,
        None => match comp_growth(ctx, player)? {
            Some(growth) => clip_grade(synthesis.overall + growth),
            None => synthesis.overall,
        },
    };

    Ok(RatingProfile {
        player_id: player.id,
        archetype,
        grades: synthesis.grades,
        overall: synthesis.overall,
        potential,
        confidence: synthesis.confidence,
        hitting_overall: synthesis.hitting_overall,
        pitching_overall: synthesis.pitching_overall,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{self, vector_with};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn all_zero_vector_gives_default_grades_and_zero_confidence() {
        let hit = vector_with(Mode::Hitting, &[]);
        let pit = vector_with(Mode::Pitching, &[]);
        assert!(hit.raw.iter().all(|v| *v == 0.0));

        let s = synthesize(Archetype::TwoWay, Some(&hit), Some(&pit));
        let h = s.grades.hitting.unwrap();
        let p = s.grades.pitching.unwrap();
        for g in [
            h.contact_left,
            h.contact_right,
            h.power_left,
            h.power_right,
            h.vision,
            h.discipline,
            h.fielding,
            h.arm_strength,
            h.arm_accuracy,
            h.speed,
            h.stealing,
            p.k_rating,
            p.bb_rating,
            p.gb_rating,
            p.hr_rating,
            p.command_rating,
        ] {
            assert!(approx_eq(g, DEFAULT_TOOL_GRADE));
        }
        assert!(approx_eq(s.confidence, 0.0));
    }

    #[test]
    fn example_ace_grades_above_default() {
        let v = vector_with(
            Mode::Pitching,
            &[
                (Feature::Era, 2.80),
                (Feature::PitcherStrikeoutPct, 28.0),
                (Feature::PitcherWalkPct, 6.0),
                (Feature::Whip, 1.05),
                (Feature::PitchingWar, 4.2),
            ],
        );
        let s = synthesize(Archetype::Pitcher, None, Some(&v));
        let p = s.grades.pitching.unwrap();
        assert!(p.k_rating > DEFAULT_TOOL_GRADE, "k_rating {}", p.k_rating);
        assert!(p.command_rating > DEFAULT_TOOL_GRADE, "command {}", p.command_rating);
        assert!(p.bb_rating > DEFAULT_TOOL_GRADE);
        assert!(s.grades.hitting.is_none());
        assert!(s.hitting_overall.is_none());
    }

    #[test]
    fn lower_is_better_features_are_inverted() {
        let good = vector_with(Mode::Pitching, &[(Feature::Era, 2.0)]);
        let bad = vector_with(Mode::Pitching, &[(Feature::Era, 6.5)]);
        let g = PitchingGrades::from_vector(&good).command_rating;
        let b = PitchingGrades::from_vector(&bad).command_rating;
        assert!(g > b);
    }

    #[test]
    fn two_way_overall_blends_sides() {
        let hit = vector_with(
            Mode::Hitting,
            &[(Feature::BattingAverage, 0.320), (Feature::Slugging, 0.600)],
        );
        let pit = vector_with(Mode::Pitching, &[(Feature::PitcherStrikeoutPct, 30.0)]);
        let s = synthesize(Archetype::TwoWay, Some(&hit), Some(&pit));

        let h = s.hitting_overall.unwrap();
        let p = s.pitching_overall.unwrap();
        let expected = 0.6 * h.max(p) + 0.4 * h.min(p);
        assert!(approx_eq(s.overall, expected));
        assert!(s.grades.hitting.is_some());
        assert!(s.grades.pitching.is_some());
    }

    #[test]
    fn grades_are_bounded() {
        let v = vector_with(
            Mode::Hitting,
            &[
                (Feature::BattingAverage, 0.500),
                (Feature::StrikeoutPct, 50.0),
                (Feature::StolenBases, 500.0),
            ],
        );
        let h = HittingGrades::from_vector(&v);
        assert!(approx_eq(h.contact_left, 99.0));
        assert!(approx_eq(h.discipline, 0.0));
        assert!(approx_eq(h.speed, 99.0));
        let overall = h.overall();
        assert!((0.0..=99.0).contains(&overall));
    }

    #[test]
    fn potential_projects_rising_trend() {
        let p = potential_from_history(&[45.0, 52.0, 60.0], 60.0, 2.0).unwrap();
        assert!(p > 60.0);
        assert!(approx_eq(p, 75.0));
    }

    #[test]
    fn potential_is_capped() {
        let p = potential_from_history(&[70.0, 85.0, 97.0], 97.0, 2.0).unwrap();
        assert!(approx_eq(p, 99.0));
    }

    #[test]
    fn declining_player_keeps_best_of_history() {
        let p = potential_from_history(&[70.0, 60.0, 50.0], 50.0, 2.0).unwrap();
        assert!(approx_eq(p, 70.0));
    }

    #[test]
    fn short_history_has_no_trend_potential() {
        assert!(potential_from_history(&[55.0], 55.0, 2.0).is_none());
        assert!(potential_from_history(&[], 55.0, 2.0).is_none());
    }

    #[test]
    fn growth_needs_three_improving_seasons() {
        assert_eq!(first_to_peak_growth(&[40.0, 50.0]), None);
        assert_eq!(first_to_peak_growth(&[50.0, 45.0, 40.0]), None);
        let g = first_to_peak_growth(&[40.0, 55.0, 50.0]).unwrap();
        assert!(approx_eq(g, 15.0));
    }

    #[test]
    fn confidence_drops_with_spread() {
        let flat = vector_with(Mode::Hitting, &[(Feature::BattingAverage, 0.275)]);
        let c = confidence(&[&flat]);
        assert!(c > 0.0 && c <= 100.0);
        assert!(approx_eq(confidence(&[]), 0.0));
    }

    #[test]
    fn rate_reads_history_from_storage() {
        let pop = fixtures::TestPopulation::new();
        let id = pop.add_player("Riser", crate::model::Level::Mlb, "Outfielder", Some(24));
        for (season, ba) in [(2022, 0.230), (2023, 0.265), (2024, 0.300)] {
            pop.add_line(
                id,
                season,
                None,
                fixtures::batting(crate::model::stats::StandardBatting {
                    pa: Some(500.0),
                    ba: Some(ba),
                    slg: Some(ba + 0.150),
                    ..Default::default()
                }),
            );
        }

        let config = fixtures::config();
        let snapshot = pop.snapshot(&config);
        let ctx = EngineContext::new(&pop.db, &snapshot, &config);
        let profile = rate(&ctx, &pop.player(id)).unwrap();

        assert_eq!(profile.archetype, Archetype::PositionPlayer);
        assert_eq!(profile.history.len(), 3);
        assert_eq!(profile.history[0].season, 2022);
        assert!(profile.history[0].overall < profile.history[2].overall);
        assert!(profile.potential > profile.history[2].overall);
        assert!(profile.potential <= 99.0);
        assert!(profile.grades.pitching.is_none());
    }
}
