// Shared test population builders.

use std::cell::Cell;

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::engine::calibration::LevelWeights;
use crate::engine::features::{Feature, FeatureVector, Mode, RawFeatures};
use crate::engine::normalize::Anchors;
use crate::engine::session::{fit_snapshot, ModelSnapshot};
use crate::model::stats::{
    AdvancedBatting, AdvancedPitching, StandardBatting, StandardFielding, StandardPitching,
    ValuePitching,
};
use crate::model::{Level, PlayerId, PlayerRecord, StatBlock, StatLine};
use crate::store::StatSource;

/// Season the fixtures treat as current.
pub const SEASON: i32 = 2024;

/// Engine config pinned to `SEASON` so ages are stable.
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.projection.as_of_season = Some(SEASON);
    config
}

pub fn batting(s: StandardBatting) -> StatBlock {
    StatBlock::StandardBatting(s)
}

pub fn advanced_batting(s: AdvancedBatting) -> StatBlock {
    StatBlock::AdvancedBatting(s)
}

pub fn pitching(s: StandardPitching) -> StatBlock {
    StatBlock::StandardPitching(s)
}

pub fn value_pitching(s: ValuePitching) -> StatBlock {
    StatBlock::ValuePitching(s)
}

pub fn advanced_pitching(s: AdvancedPitching) -> StatBlock {
    StatBlock::AdvancedPitching(s)
}

pub fn fielding(s: StandardFielding) -> StatBlock {
    StatBlock::StandardFielding(s)
}

/// Vector for `mode` with only the given raw values present, normalized
/// against the fallback ranges at a top-tier factor.
pub fn vector_with(mode: Mode, values: &[(Feature, f64)]) -> FeatureVector {
    let values = mode
        .layout()
        .iter()
        .map(|f| values.iter().find(|(g, _)| g == f).map(|(_, v)| *v))
        .collect();
    RawFeatures {
        mode,
        season: None,
        values,
        level: Level::Mlb,
        level_factor: 1.0,
    }
    .into_vector(&Anchors::fallback())
}

/// An in-memory database with helpers for adding players and rows.
pub struct TestPopulation {
    pub db: Database,
    next_id: Cell<PlayerId>,
}

impl TestPopulation {
    pub fn new() -> Self {
        Self {
            db: Database::open(":memory:").expect("in-memory database should open"),
            next_id: Cell::new(1),
        }
    }

    /// Add a player whose age in `SEASON` is `age`.
    pub fn add_player(&self, name: &str, level: Level, position: &str, age: Option<u32>) -> PlayerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let birth_date = age.and_then(|a| NaiveDate::from_ymd_opt(SEASON - a as i32, 1, 1));
        self.db
            .upsert_player(&PlayerRecord {
                id,
                name: name.to_string(),
                level,
                position: position.to_string(),
                birth_date,
            })
            .expect("player insert");
        id
    }

    pub fn add_line(&self, player_id: PlayerId, season: i32, level: Option<Level>, stats: StatBlock) {
        self.db
            .upsert_stat_line(&StatLine {
                player_id,
                season,
                team: "Club".to_string(),
                level,
                age: None,
                stats,
            })
            .expect("stat line insert");
    }

    pub fn player(&self, id: PlayerId) -> PlayerRecord {
        self.db.player(id).unwrap().expect("player exists")
    }

    pub fn snapshot(&self, config: &EngineConfig) -> ModelSnapshot {
        fit_snapshot(&self.db, LevelWeights::defaults(), config).expect("snapshot fit")
    }
}

/// Ids of a seeded top-tier population.
pub struct League {
    pub hitters: Vec<PlayerId>,
    pub pitchers: Vec<PlayerId>,
}

/// Twelve top-tier hitters and twelve top-tier pitchers with three seasons
/// each and a spread of skill.
pub fn seed_league(pop: &TestPopulation) -> League {
    let mut hitters = Vec::new();
    let mut pitchers = Vec::new();

    for i in 0..12u32 {
        let x = f64::from(i);
        let id = pop.add_player(&format!("Hitter {i}"), Level::Mlb, "Outfielder", Some(24 + i % 9));
        for (n, season) in (SEASON - 2..=SEASON).enumerate() {
            let bump = n as f64 * 0.004;
            pop.add_line(
                id,
                season,
                None,
                batting(StandardBatting {
                    pa: Some(520.0 + 5.0 * x),
                    ab: Some(470.0),
                    hr: Some(8.0 + 2.0 * x),
                    bb: Some(35.0 + 3.0 * x),
                    so: Some(150.0 - 5.0 * x),
                    sb: Some(3.0 + (i % 4) as f64 * 7.0),
                    ba: Some(0.228 + 0.005 * x + bump),
                    obp: Some(0.295 + 0.006 * x + bump),
                    slg: Some(0.360 + 0.015 * x + bump),
                    war: Some(0.5 + 0.3 * x + n as f64 * 0.2),
                }),
            );
            pop.add_line(
                id,
                season,
                None,
                advanced_batting(AdvancedBatting {
                    ev: Some(86.0 + 0.4 * x),
                    hardh_pct: Some(30.0 + 1.2 * x),
                    bb_pct: Some(6.0 + 0.5 * x),
                    so_pct: Some(28.0 - 0.9 * x),
                    iso: Some(0.120 + 0.012 * x),
                    ..Default::default()
                }),
            );
            pop.add_line(
                id,
                season,
                None,
                fielding(StandardFielding {
                    fld_pct: Some(0.970 + 0.002 * (i % 5) as f64),
                    a: Some(4.0 + (i % 6) as f64 * 2.0),
                    ..Default::default()
                }),
            );
        }
        hitters.push(id);
    }

    for i in 0..12u32 {
        let x = f64::from(i);
        let id = pop.add_player(&format!("Pitcher {i}"), Level::Mlb, "Pitcher", Some(25 + i % 10));
        for (n, season) in (SEASON - 2..=SEASON).enumerate() {
            let trim = n as f64 * 0.05;
            pop.add_line(
                id,
                season,
                None,
                pitching(StandardPitching {
                    ip: Some(140.0 + 4.0 * x),
                    gs: Some(24.0 + (i % 6) as f64),
                    so: Some(120.0 + 8.0 * x),
                    bb: Some(60.0 - 2.0 * x),
                    era: Some(5.10 - 0.22 * x - trim),
                    fip: Some(4.90 - 0.18 * x - trim),
                    whip: Some(1.45 - 0.03 * x),
                    era_plus: Some(85.0 + 6.0 * x),
                    so9: Some(7.0 + 0.4 * x),
                    bb9: Some(3.9 - 0.15 * x),
                    war: Some(0.4 + 0.35 * x + n as f64 * 0.1),
                    ..Default::default()
                }),
            );
            pop.add_line(
                id,
                season,
                None,
                value_pitching(ValuePitching {
                    war: Some(0.4 + 0.35 * x + n as f64 * 0.1),
                    waa: Some(-1.0 + 0.3 * x),
                    raa: Some(-8.0 + 1.5 * x),
                }),
            );
            pop.add_line(
                id,
                season,
                None,
                advanced_pitching(AdvancedPitching {
                    k_pct: Some(18.0 + 0.9 * x),
                    bb_pct: Some(10.0 - 0.4 * x),
                    hr_pct: Some(3.8 - 0.15 * x),
                    lob_pct: Some(66.0 + 0.8 * x),
                    era_minus: Some(118.0 - 4.0 * x),
                    ..Default::default()
                }),
            );
        }
        pitchers.push(id);
    }

    League { hitters, pitchers }
}

/// A handful of minor-league and amateur players across tiers, performing
/// a notch below the top tier.
pub fn seed_prospects(pop: &TestPopulation) -> Vec<PlayerId> {
    let tiers = [
        (Level::Aaa, 0.92),
        (Level::Aa, 0.85),
        (Level::HighA, 0.78),
        (Level::A, 0.72),
    ];
    let mut ids = Vec::new();
    for (t, (level, scale)) in tiers.into_iter().enumerate() {
        for j in 0..2u32 {
            let y = f64::from(j);
            let bat = pop.add_player(
                &format!("{level} Bat {j}"),
                level,
                "Shortstop",
                Some(20 + t as u32 + j),
            );
            pop.add_line(
                bat,
                SEASON,
                None,
                batting(StandardBatting {
                    pa: Some(380.0 + 20.0 * y),
                    hr: Some((12.0 + 2.0 * y) * scale),
                    bb: Some(40.0 * scale),
                    so: Some(110.0 / scale),
                    sb: Some(10.0 + 4.0 * y),
                    ba: Some((0.255 + 0.01 * y) * scale),
                    obp: Some((0.325 + 0.01 * y) * scale),
                    slg: Some((0.420 + 0.02 * y) * scale),
                    ..Default::default()
                }),
            );
            ids.push(bat);

            let arm = pop.add_player(
                &format!("{level} Arm {j}"),
                level,
                "Pitcher",
                Some(21 + t as u32 + j),
            );
            pop.add_line(
                arm,
                SEASON,
                None,
                pitching(StandardPitching {
                    ip: Some(90.0 + 10.0 * y),
                    so: Some(95.0 * scale),
                    bb: Some(35.0 / scale),
                    era: Some((3.90 - 0.2 * y) / scale),
                    whip: Some(1.28 / scale),
                    era_plus: Some(100.0 * scale),
                    ..Default::default()
                }),
            );
            ids.push(arm);
        }
    }
    ids
}
