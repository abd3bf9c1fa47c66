// Player identity, competition tier, and archetype types.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::engine::classifier;

/// Primary key of a player row. Always positive for real players.
pub type PlayerId = i64;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// A rung in the player development hierarchy.
///
/// Ordered from the top tier downwards so that `BTreeMap<Level, _>` iterates
/// MLB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "MLB")]
    Mlb,
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "A+")]
    HighA,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "Rk")]
    Rookie,
    #[serde(rename = "NCAA")]
    Ncaa,
    #[serde(rename = "HS")]
    HighSchool,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Level {
    /// Every tier, top tier first.
    pub const ALL: [Level; 9] = [
        Level::Mlb,
        Level::Aaa,
        Level::Aa,
        Level::HighA,
        Level::A,
        Level::Rookie,
        Level::Ncaa,
        Level::HighSchool,
        Level::Unknown,
    ];

    /// Parse tier text leniently. Unrecognized or empty text maps to
    /// `Level::Unknown` rather than failing.
    pub fn parse(text: &str) -> Level {
        match text.trim().to_ascii_uppercase().as_str() {
            "MLB" | "MAJORS" => Level::Mlb,
            "AAA" => Level::Aaa,
            "AA" => Level::Aa,
            "A+" | "HIGH-A" | "HIGH A" => Level::HighA,
            "A" | "LOW-A" | "SINGLE-A" => Level::A,
            "RK" | "ROK" | "ROOKIE" => Level::Rookie,
            "NCAA" | "COLLEGE" => Level::Ncaa,
            "HS" | "HIGH SCHOOL" => Level::HighSchool,
            _ => Level::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Mlb => "MLB",
            Level::Aaa => "AAA",
            Level::Aa => "AA",
            Level::HighA => "A+",
            Level::A => "A",
            Level::Rookie => "Rk",
            Level::Ncaa => "NCAA",
            Level::HighSchool => "HS",
            Level::Unknown => "Unknown",
        }
    }

    pub fn is_top_tier(&self) -> bool {
        matches!(self, Level::Mlb)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Archetype
// ---------------------------------------------------------------------------

/// Functional player classification derived from position text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Pitcher,
    TwoWay,
    PositionPlayer,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Pitcher => "pitcher",
            Archetype::TwoWay => "two_way",
            Archetype::PositionPlayer => "position_player",
        }
    }

    pub fn pitches(&self) -> bool {
        matches!(self, Archetype::Pitcher | Archetype::TwoWay)
    }

    pub fn hits(&self) -> bool {
        matches!(self, Archetype::PositionPlayer | Archetype::TwoWay)
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// A player as supplied by the storage layer. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub level: Level,
    /// Free-form position text, e.g. "Pitcher, First Baseman".
    pub position: String,
    pub birth_date: Option<NaiveDate>,
}

impl PlayerRecord {
    pub fn archetype(&self) -> Archetype {
        classifier::classify(&self.position)
    }

    /// Age at July 1 of `season`, the conventional baseball age cutoff.
    pub fn age_in_season(&self, season: i32) -> Option<u32> {
        let born = self.birth_date?;
        let cutoff = NaiveDate::from_ymd_opt(season, 7, 1)?;
        let mut age = cutoff.year() - born.year();
        if (born.month(), born.day()) > (cutoff.month(), cutoff.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse_accepts_aliases() {
        assert_eq!(Level::parse("mlb"), Level::Mlb);
        assert_eq!(Level::parse(" A+ "), Level::HighA);
        assert_eq!(Level::parse("ROK"), Level::Rookie);
        assert_eq!(Level::parse("Rookie"), Level::Rookie);
        assert_eq!(Level::parse("hs"), Level::HighSchool);
        assert_eq!(Level::parse("Independent"), Level::Unknown);
        assert_eq!(Level::parse(""), Level::Unknown);
    }

    #[test]
    fn level_display_round_trips_through_parse() {
        for level in Level::ALL {
            assert_eq!(Level::parse(level.as_str()), level);
        }
    }

    #[test]
    fn level_serializes_with_display_names() {
        let json = serde_json::to_string(&Level::HighA).unwrap();
        assert_eq!(json, "\"A+\"");
        let back: Level = serde_json::from_str("\"Rk\"").unwrap();
        assert_eq!(back, Level::Rookie);
    }

    #[test]
    fn age_in_season_respects_july_cutoff() {
        let mut p = PlayerRecord {
            id: 1,
            name: "Test".into(),
            level: Level::Mlb,
            position: "Catcher".into(),
            birth_date: NaiveDate::from_ymd_opt(2000, 6, 30),
        };
        assert_eq!(p.age_in_season(2024), Some(24));

        p.birth_date = NaiveDate::from_ymd_opt(2000, 7, 2);
        assert_eq!(p.age_in_season(2024), Some(23));

        p.birth_date = None;
        assert_eq!(p.age_in_season(2024), None);
    }
}
