// Feature extraction: aggregates a player's per-season stat rows into a
// fixed-length, level-adjusted vector for one mode.
//
// Features are addressed by name. The position of a feature inside a vector
// is derived from the mode's layout and never hard-coded by consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::calibration::LevelWeights;
use crate::engine::normalize::Anchors;
use crate::engine::tables::age_factor;
use crate::model::{Level, PlayerRecord, StatBlock, StatCategory, StatLine};
use crate::store::StatSource;

// ---------------------------------------------------------------------------
// Feature catalogue
// ---------------------------------------------------------------------------

/// Every feature, declared in the order of the `all` layout: hitting,
/// fielding, pitching, then the two derived features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    // Hitting
    BattingAverage,
    OnBasePct,
    ExitVelocity,
    HardHitPct,
    LineDrivePct,
    Slugging,
    IsolatedPower,
    BarrelPct,
    HomeRuns,
    WalkPct,
    StrikeoutPct,
    Walks,
    Strikeouts,
    StolenBases,
    BaserunningRuns,
    // Fielding
    FieldingPct,
    DefensiveRunsSaved,
    TotalZoneRuns,
    Assists,
    DoublePlays,
    // Pitching
    PitcherStrikeoutPct,
    PitcherWalkPct,
    PitcherHomeRunPct,
    Era,
    Fip,
    Whip,
    EraPlus,
    PitchingWar,
    PitchingWaa,
    PitchingRaa,
    PitcherStrikeouts,
    PitcherWalks,
    InningsPitched,
    GamesStarted,
    StrikeoutsPerNine,
    WalksPerNine,
    HomeRunsPerNine,
    HitsPerNine,
    Babip,
    LeftOnBasePct,
    EraMinus,
    FipMinus,
    XfipMinus,
    Siera,
    WinProbabilityAdded,
    Re24,
    ChampionshipWpa,
    // Derived
    LevelFactor,
    AgeFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    Hitting,
    Fielding,
    Pitching,
    Derived,
}

/// How the level factor is applied to a feature's season average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    /// Rate stat: only the deviation from a league baseline is scaled.
    Rate { baseline: f64 },
    /// Counting or value stat: multiplied by the level factor.
    Counting,
    /// Computed by the extractor, never read from a stat row.
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Static metadata for one feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureDef {
    pub group: FeatureGroup,
    pub category: Option<StatCategory>,
    pub scaling: Scaling,
    pub direction: Direction,
    /// Normalization range used when the population is too thin.
    pub fallback: (f64, f64),
}

const fn sourced(
    group: FeatureGroup,
    category: StatCategory,
    scaling: Scaling,
    direction: Direction,
    min: f64,
    max: f64,
) -> FeatureDef {
    FeatureDef {
        group,
        category: Some(category),
        scaling,
        direction,
        fallback: (min, max),
    }
}

const fn rate(baseline: f64) -> Scaling {
    Scaling::Rate { baseline }
}

impl Feature {
    pub const ALL: [Feature; 49] = [
        Feature::BattingAverage,
        Feature::OnBasePct,
        Feature::ExitVelocity,
        Feature::HardHitPct,
        Feature::LineDrivePct,
        Feature::Slugging,
        Feature::IsolatedPower,
        Feature::BarrelPct,
        Feature::HomeRuns,
        Feature::WalkPct,
        Feature::StrikeoutPct,
        Feature::Walks,
        Feature::Strikeouts,
        Feature::StolenBases,
        Feature::BaserunningRuns,
        Feature::FieldingPct,
        Feature::DefensiveRunsSaved,
        Feature::TotalZoneRuns,
        Feature::Assists,
        Feature::DoublePlays,
        Feature::PitcherStrikeoutPct,
        Feature::PitcherWalkPct,
        Feature::PitcherHomeRunPct,
        Feature::Era,
        Feature::Fip,
        Feature::Whip,
        Feature::EraPlus,
        Feature::PitchingWar,
        Feature::PitchingWaa,
        Feature::PitchingRaa,
        Feature::PitcherStrikeouts,
        Feature::PitcherWalks,
        Feature::InningsPitched,
        Feature::GamesStarted,
        Feature::StrikeoutsPerNine,
        Feature::WalksPerNine,
        Feature::HomeRunsPerNine,
        Feature::HitsPerNine,
        Feature::Babip,
        Feature::LeftOnBasePct,
        Feature::EraMinus,
        Feature::FipMinus,
        Feature::XfipMinus,
        Feature::Siera,
        Feature::WinProbabilityAdded,
        Feature::Re24,
        Feature::ChampionshipWpa,
        Feature::LevelFactor,
        Feature::AgeFactor,
    ];

    pub fn def(self) -> FeatureDef {
        use Direction::{HigherIsBetter as Up, LowerIsBetter as Down};
        use FeatureGroup::{Fielding, Hitting, Pitching};
        use Scaling::Counting;
        use StatCategory as C;

        match self {
            Feature::BattingAverage => sourced(Hitting, C::StandardBatting, rate(0.250), Up, 0.2, 0.35),
            Feature::OnBasePct => sourced(Hitting, C::StandardBatting, rate(0.320), Up, 0.25, 0.45),
            Feature::ExitVelocity => sourced(Hitting, C::AdvancedBatting, rate(88.0), Up, 80.0, 100.0),
            Feature::HardHitPct => sourced(Hitting, C::AdvancedBatting, rate(35.0), Up, 20.0, 55.0),
            Feature::LineDrivePct => sourced(Hitting, C::AdvancedBatting, rate(20.0), Up, 10.0, 35.0),
            Feature::Slugging => sourced(Hitting, C::StandardBatting, rate(0.400), Up, 0.3, 0.7),
            Feature::IsolatedPower => sourced(Hitting, C::AdvancedBatting, rate(0.150), Up, 0.1, 0.35),
            Feature::BarrelPct => sourced(Hitting, C::AdvancedBatting, rate(7.0), Up, 0.0, 20.0),
            Feature::HomeRuns => sourced(Hitting, C::StandardBatting, Counting, Up, 0.0, 60.0),
            Feature::WalkPct => sourced(Hitting, C::AdvancedBatting, rate(8.5), Up, 5.0, 18.0),
            Feature::StrikeoutPct => sourced(Hitting, C::AdvancedBatting, rate(22.0), Down, 10.0, 35.0),
            Feature::Walks => sourced(Hitting, C::StandardBatting, Counting, Up, 10.0, 150.0),
            Feature::Strikeouts => sourced(Hitting, C::StandardBatting, Counting, Down, 50.0, 250.0),
            Feature::StolenBases => sourced(Hitting, C::StandardBatting, Counting, Up, 0.0, 60.0),
            Feature::BaserunningRuns => sourced(Hitting, C::ValueBatting, Counting, Up, -10.0, 10.0),

            Feature::FieldingPct => sourced(Fielding, C::StandardFielding, rate(0.980), Up, 0.95, 1.0),
            Feature::DefensiveRunsSaved => sourced(Fielding, C::StandardFielding, Counting, Up, -20.0, 20.0),
            Feature::TotalZoneRuns => sourced(Fielding, C::StandardFielding, Counting, Up, -20.0, 20.0),
            Feature::Assists => sourced(Fielding, C::StandardFielding, Counting, Up, 0.0, 50.0),
            Feature::DoublePlays => sourced(Fielding, C::StandardFielding, Counting, Up, 0.0, 50.0),

            Feature::PitcherStrikeoutPct => sourced(Pitching, C::AdvancedPitching, rate(22.0), Up, 10.0, 50.0),
            Feature::PitcherWalkPct => sourced(Pitching, C::AdvancedPitching, rate(8.5), Down, 2.0, 15.0),
            Feature::PitcherHomeRunPct => sourced(Pitching, C::AdvancedPitching, rate(3.0), Down, 0.0, 10.0),
            Feature::Era => sourced(Pitching, C::StandardPitching, rate(4.20), Down, 1.5, 7.0),
            Feature::Fip => sourced(Pitching, C::StandardPitching, rate(4.20), Down, 1.5, 5.0),
            Feature::Whip => sourced(Pitching, C::StandardPitching, rate(1.30), Down, 0.8, 2.5),
            Feature::EraPlus => sourced(Pitching, C::StandardPitching, rate(100.0), Up, 50.0, 250.0),
            Feature::PitchingWar => sourced(Pitching, C::ValuePitching, Counting, Up, 0.0, 12.0),
            Feature::PitchingWaa => sourced(Pitching, C::ValuePitching, Counting, Up, -5.0, 10.0),
            Feature::PitchingRaa => sourced(Pitching, C::ValuePitching, Counting, Up, -20.0, 20.0),
            Feature::PitcherStrikeouts => sourced(Pitching, C::StandardPitching, Counting, Up, 0.0, 350.0),
            Feature::PitcherWalks => sourced(Pitching, C::StandardPitching, Counting, Down, 0.0, 100.0),
            Feature::InningsPitched => sourced(Pitching, C::StandardPitching, Counting, Up, 0.0, 250.0),
            Feature::GamesStarted => sourced(Pitching, C::StandardPitching, Counting, Up, 0.0, 40.0),
            Feature::StrikeoutsPerNine => sourced(Pitching, C::StandardPitching, rate(8.5), Up, 3.0, 15.0),
            Feature::WalksPerNine => sourced(Pitching, C::StandardPitching, rate(3.2), Down, 1.0, 7.0),
            Feature::HomeRunsPerNine => sourced(Pitching, C::StandardPitching, rate(1.2), Down, 0.5, 3.0),
            Feature::HitsPerNine => sourced(Pitching, C::StandardPitching, rate(8.5), Down, 5.0, 12.0),
            Feature::Babip => sourced(Pitching, C::AdvancedPitching, rate(0.300), Down, 0.2, 0.35),
            Feature::LeftOnBasePct => sourced(Pitching, C::AdvancedPitching, rate(72.0), Up, 60.0, 90.0),
            Feature::EraMinus => sourced(Pitching, C::AdvancedPitching, rate(100.0), Down, 40.0, 80.0),
            Feature::FipMinus => sourced(Pitching, C::AdvancedPitching, rate(100.0), Down, 40.0, 80.0),
            Feature::XfipMinus => sourced(Pitching, C::AdvancedPitching, rate(100.0), Down, 40.0, 80.0),
            Feature::Siera => sourced(Pitching, C::AdvancedPitching, rate(4.20), Down, 2.0, 6.0),
            Feature::WinProbabilityAdded => sourced(Pitching, C::AdvancedPitching, Counting, Up, -5.0, 10.0),
            Feature::Re24 => sourced(Pitching, C::AdvancedPitching, Counting, Up, -20.0, 40.0),
            Feature::ChampionshipWpa => sourced(Pitching, C::AdvancedPitching, Counting, Up, -5.0, 10.0),

            Feature::LevelFactor | Feature::AgeFactor => FeatureDef {
                group: FeatureGroup::Derived,
                category: None,
                scaling: Scaling::Derived,
                direction: Up,
                fallback: (0.0, 100.0),
            },
        }
    }

    /// Read this feature's source column from a stat row. Rows of a
    /// different category yield `None`.
    pub fn read(self, block: &StatBlock) -> Option<f64> {
        match (self, block) {
            (Feature::BattingAverage, StatBlock::StandardBatting(s)) => s.ba,
            (Feature::OnBasePct, StatBlock::StandardBatting(s)) => s.obp,
            (Feature::Slugging, StatBlock::StandardBatting(s)) => s.slg,
            (Feature::HomeRuns, StatBlock::StandardBatting(s)) => s.hr,
            (Feature::Walks, StatBlock::StandardBatting(s)) => s.bb,
            (Feature::Strikeouts, StatBlock::StandardBatting(s)) => s.so,
            (Feature::StolenBases, StatBlock::StandardBatting(s)) => s.sb,

            (Feature::ExitVelocity, StatBlock::AdvancedBatting(s)) => s.ev,
            (Feature::HardHitPct, StatBlock::AdvancedBatting(s)) => s.hardh_pct,
            (Feature::LineDrivePct, StatBlock::AdvancedBatting(s)) => s.ld_pct,
            (Feature::IsolatedPower, StatBlock::AdvancedBatting(s)) => s.iso,
            (Feature::BarrelPct, StatBlock::AdvancedBatting(s)) => s.barrel_pct,
            (Feature::WalkPct, StatBlock::AdvancedBatting(s)) => s.bb_pct,
            (Feature::StrikeoutPct, StatBlock::AdvancedBatting(s)) => s.so_pct,

            (Feature::BaserunningRuns, StatBlock::ValueBatting(s)) => s.rbaser,

            (Feature::FieldingPct, StatBlock::StandardFielding(s)) => s.fld_pct,
            (Feature::DefensiveRunsSaved, StatBlock::StandardFielding(s)) => s.rdrs,
            (Feature::TotalZoneRuns, StatBlock::StandardFielding(s)) => s.rtot,
            (Feature::Assists, StatBlock::StandardFielding(s)) => s.a,
            (Feature::DoublePlays, StatBlock::StandardFielding(s)) => s.dp,

            (Feature::Era, StatBlock::StandardPitching(s)) => s.era,
            (Feature::Fip, StatBlock::StandardPitching(s)) => s.fip,
            (Feature::Whip, StatBlock::StandardPitching(s)) => s.whip,
            (Feature::EraPlus, StatBlock::StandardPitching(s)) => s.era_plus,
            (Feature::PitcherStrikeouts, StatBlock::StandardPitching(s)) => s.so,
            (Feature::PitcherWalks, StatBlock::StandardPitching(s)) => s.bb,
            (Feature::InningsPitched, StatBlock::StandardPitching(s)) => s.ip,
            (Feature::GamesStarted, StatBlock::StandardPitching(s)) => s.gs,
            (Feature::StrikeoutsPerNine, StatBlock::StandardPitching(s)) => s.so9,
            (Feature::WalksPerNine, StatBlock::StandardPitching(s)) => s.bb9,
            (Feature::HomeRunsPerNine, StatBlock::StandardPitching(s)) => s.hr9,
            (Feature::HitsPerNine, StatBlock::StandardPitching(s)) => s.h9,

            (Feature::PitchingWar, StatBlock::ValuePitching(s)) => s.war,
            (Feature::PitchingWaa, StatBlock::ValuePitching(s)) => s.waa,
            (Feature::PitchingRaa, StatBlock::ValuePitching(s)) => s.raa,

            (Feature::PitcherStrikeoutPct, StatBlock::AdvancedPitching(s)) => s.k_pct,
            (Feature::PitcherWalkPct, StatBlock::AdvancedPitching(s)) => s.bb_pct,
            (Feature::PitcherHomeRunPct, StatBlock::AdvancedPitching(s)) => s.hr_pct,
            (Feature::Babip, StatBlock::AdvancedPitching(s)) => s.babip,
            (Feature::LeftOnBasePct, StatBlock::AdvancedPitching(s)) => s.lob_pct,
            (Feature::EraMinus, StatBlock::AdvancedPitching(s)) => s.era_minus,
            (Feature::FipMinus, StatBlock::AdvancedPitching(s)) => s.fip_minus,
            (Feature::XfipMinus, StatBlock::AdvancedPitching(s)) => s.xfip_minus,
            (Feature::Siera, StatBlock::AdvancedPitching(s)) => s.siera,
            (Feature::WinProbabilityAdded, StatBlock::AdvancedPitching(s)) => s.wpa,
            (Feature::Re24, StatBlock::AdvancedPitching(s)) => s.re24,
            (Feature::ChampionshipWpa, StatBlock::AdvancedPitching(s)) => s.cwpa,

            _ => None,
        }
    }

    /// Apply a level factor to a season average.
    pub fn level_adjust(self, mean: f64, factor: f64) -> f64 {
        match self.def().scaling {
            Scaling::Rate { baseline } => baseline + (mean - baseline) * factor,
            Scaling::Counting => mean * factor,
            Scaling::Derived => mean,
        }
    }
}

// ---------------------------------------------------------------------------
// Modes and layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Hitting,
    Pitching,
    All,
}

fn layout_of(groups: &[FeatureGroup]) -> Vec<Feature> {
    groups
        .iter()
        .flat_map(|group| {
            Feature::ALL
                .into_iter()
                .filter(move |f| f.def().group == *group)
        })
        .collect()
}

static HITTING_LAYOUT: LazyLock<Vec<Feature>> = LazyLock::new(|| {
    layout_of(&[
        FeatureGroup::Hitting,
        FeatureGroup::Fielding,
        FeatureGroup::Derived,
    ])
});

static PITCHING_LAYOUT: LazyLock<Vec<Feature>> = LazyLock::new(|| {
    layout_of(&[
        FeatureGroup::Pitching,
        FeatureGroup::Fielding,
        FeatureGroup::Derived,
    ])
});

impl Mode {
    /// Ordered features for this mode. `all` is the declaration order of
    /// `Feature`.
    pub fn layout(self) -> &'static [Feature] {
        match self {
            Mode::Hitting => &HITTING_LAYOUT,
            Mode::Pitching => &PITCHING_LAYOUT,
            Mode::All => &Feature::ALL,
        }
    }

    pub fn len(self) -> usize {
        self.layout().len()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Hitting => "hitting",
            Mode::Pitching => "pitching",
            Mode::All => "all",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hitting" => Ok(Mode::Hitting),
            "pitching" => Ok(Mode::Pitching),
            "all" => Ok(Mode::All),
            other => Err(format!(
                "unknown mode '{other}' (expected hitting, pitching, or all)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

/// Level-adjusted feature values before normalization. `None` marks a
/// feature with no source data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeatures {
    pub mode: Mode,
    pub season: Option<i32>,
    pub values: Vec<Option<f64>>,
    pub level: Level,
    pub level_factor: f64,
}

impl RawFeatures {
    pub fn value(&self, feature: Feature) -> Option<f64> {
        let idx = self.mode.layout().iter().position(|f| *f == feature)?;
        self.values[idx]
    }

    /// Normalize against `anchors`, producing the complete vector.
    pub fn into_vector(self, anchors: &Anchors) -> FeatureVector {
        let layout = self.mode.layout();
        let len = layout.len();

        let raw: Vec<f64> = self.values.iter().map(|v| v.unwrap_or(0.0)).collect();
        let present: Vec<bool> = self.values.iter().map(Option::is_some).collect();
        let normalized: Vec<f64> = layout
            .iter()
            .zip(&self.values)
            .map(|(feature, value)| value.map_or(0.0, |v| anchors.normalize(*feature, v)))
            .collect();

        let present_count = present.iter().filter(|p| **p).count();
        let confidence = if len == 0 {
            0.0
        } else {
            100.0 * present_count as f64 / len as f64
        };

        FeatureVector {
            mode: self.mode,
            season: self.season,
            raw,
            normalized,
            present,
            confidence,
            level: self.level,
            level_factor: self.level_factor,
        }
    }
}

/// A player's feature vector for one mode.
///
/// `raw`, `normalized`, and `present` always have `mode.len()` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub mode: Mode,
    pub season: Option<i32>,
    pub raw: Vec<f64>,
    /// Each value in [0, 100]; absent features are 0.
    pub normalized: Vec<f64>,
    pub present: Vec<bool>,
    /// Percentage of features with source data.
    pub confidence: f64,
    pub level: Level,
    pub level_factor: f64,
}

impl FeatureVector {
    pub fn layout(&self) -> &'static [Feature] {
        self.mode.layout()
    }

    fn position(&self, feature: Feature) -> Option<usize> {
        self.layout().iter().position(|f| *f == feature)
    }

    /// Normalized value of `feature`, or `None` when it is absent or not part
    /// of this mode.
    pub fn normalized_value(&self, feature: Feature) -> Option<f64> {
        let idx = self.position(feature)?;
        self.present[idx].then(|| self.normalized[idx])
    }

    pub fn raw_value(&self, feature: Feature) -> Option<f64> {
        let idx = self.position(feature)?;
        self.present[idx].then(|| self.raw[idx])
    }

    pub fn has_data(&self) -> bool {
        self.present.iter().any(|p| *p)
    }

    pub fn is_all_zero(&self) -> bool {
        self.normalized.iter().all(|v| *v == 0.0)
    }

    /// Name-keyed view used for reporting.
    pub fn named(&self) -> BTreeMap<Feature, Option<f64>> {
        self.layout()
            .iter()
            .map(|f| (*f, self.raw_value(*f)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Best-known age for `player` during `season`: birth date first, then the
/// most recent stat row that reports an age, carried forward.
pub fn player_age<'a>(
    player: &PlayerRecord,
    rows: impl IntoIterator<Item = &'a StatLine>,
    season: i32,
) -> Option<u32> {
    if let Some(age) = player.age_in_season(season) {
        return Some(age);
    }
    let latest = rows
        .into_iter()
        .filter(|l| l.age.is_some())
        .max_by_key(|l| l.season)?;
    let age = i64::from(latest.age?) + i64::from(season) - i64::from(latest.season);
    u32::try_from(age).ok()
}

/// Extract un-normalized features for `player`.
///
/// `as_of_season` is the season used for the age feature when no season
/// filter is given.
pub fn extract_raw<S: StatSource + ?Sized>(
    source: &S,
    player: &PlayerRecord,
    mode: Mode,
    season: Option<i32>,
    weights: &LevelWeights,
    as_of_season: i32,
) -> Result<RawFeatures> {
    let layout = mode.layout();
    let level_factor = weights.factor(player.level);

    let mut rows: BTreeMap<StatCategory, Vec<StatLine>> = BTreeMap::new();
    for category in layout.iter().filter_map(|f| f.def().category) {
        if !rows.contains_key(&category) {
            rows.insert(category, source.stat_lines(player.id, category, season)?);
        }
    }

    let mut values: Vec<Option<f64>> = layout
        .iter()
        .map(|feature| {
            let category = feature.def().category?;
            let lines = rows.get(&category)?;
            let samples: Vec<f64> = lines
                .iter()
                .filter_map(|line| feature.read(&line.stats))
                .filter(|v| v.is_finite())
                .collect();
            if samples.is_empty() {
                return None;
            }
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            Some(feature.level_adjust(mean, level_factor))
        })
        .collect();

    // Derived features only describe a player who has data.
    if values.iter().any(Option::is_some) {
        let age = player_age(player, rows.values().flatten(), season.unwrap_or(as_of_season));
        for (idx, feature) in layout.iter().enumerate() {
            values[idx] = match feature {
                Feature::LevelFactor => Some(level_factor * 100.0),
                Feature::AgeFactor => age.map(|a| age_factor(a) * 100.0),
                _ => values[idx],
            };
        }
    }

    Ok(RawFeatures {
        mode,
        season,
        values,
        level: player.level,
        level_factor,
    })
}
