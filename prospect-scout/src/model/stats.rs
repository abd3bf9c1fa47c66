// Typed per-season statistic rows, one struct per stat category.
//
// Every numeric field is optional: a blank cell or a column the source never
// reported is `None`, which the feature extractor treats as "not present".

use serde::{Deserialize, Serialize};

use super::player::{Level, PlayerId};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatCategory {
    StandardBatting,
    ValueBatting,
    AdvancedBatting,
    StandardPitching,
    ValuePitching,
    AdvancedPitching,
    StandardFielding,
}

impl StatCategory {
    pub const ALL: [StatCategory; 7] = [
        StatCategory::StandardBatting,
        StatCategory::ValueBatting,
        StatCategory::AdvancedBatting,
        StatCategory::StandardPitching,
        StatCategory::ValuePitching,
        StatCategory::AdvancedPitching,
        StatCategory::StandardFielding,
    ];

    /// Storage key, also the CSV file stem used by the importer.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatCategory::StandardBatting => "standard_batting",
            StatCategory::ValueBatting => "value_batting",
            StatCategory::AdvancedBatting => "advanced_batting",
            StatCategory::StandardPitching => "standard_pitching",
            StatCategory::ValuePitching => "value_pitching",
            StatCategory::AdvancedPitching => "advanced_pitching",
            StatCategory::StandardFielding => "standard_fielding",
        }
    }

    pub fn parse(text: &str) -> Option<StatCategory> {
        StatCategory::ALL.into_iter().find(|c| c.as_str() == text)
    }
}

// ---------------------------------------------------------------------------
// Category records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardBatting {
    pub pa: Option<f64>,
    pub ab: Option<f64>,
    pub hr: Option<f64>,
    pub bb: Option<f64>,
    pub so: Option<f64>,
    pub sb: Option<f64>,
    pub ba: Option<f64>,
    pub obp: Option<f64>,
    pub slg: Option<f64>,
    pub war: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueBatting {
    /// Baserunning runs above average.
    pub rbaser: Option<f64>,
    pub waa: Option<f64>,
    pub war: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedBatting {
    /// Average exit velocity (mph).
    pub ev: Option<f64>,
    pub hardh_pct: Option<f64>,
    pub ld_pct: Option<f64>,
    pub iso: Option<f64>,
    pub barrel_pct: Option<f64>,
    pub bb_pct: Option<f64>,
    pub so_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardPitching {
    pub ip: Option<f64>,
    pub gs: Option<f64>,
    pub so: Option<f64>,
    pub bb: Option<f64>,
    pub era: Option<f64>,
    pub fip: Option<f64>,
    pub whip: Option<f64>,
    pub era_plus: Option<f64>,
    pub so9: Option<f64>,
    pub bb9: Option<f64>,
    pub hr9: Option<f64>,
    pub h9: Option<f64>,
    pub war: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuePitching {
    pub war: Option<f64>,
    pub waa: Option<f64>,
    pub raa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedPitching {
    pub k_pct: Option<f64>,
    pub bb_pct: Option<f64>,
    pub hr_pct: Option<f64>,
    pub babip: Option<f64>,
    pub lob_pct: Option<f64>,
    pub era_minus: Option<f64>,
    pub fip_minus: Option<f64>,
    pub xfip_minus: Option<f64>,
    pub siera: Option<f64>,
    pub wpa: Option<f64>,
    pub re24: Option<f64>,
    pub cwpa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardFielding {
    pub fld_pct: Option<f64>,
    /// Defensive runs saved.
    pub rdrs: Option<f64>,
    /// Total zone runs.
    pub rtot: Option<f64>,
    /// Assists.
    pub a: Option<f64>,
    /// Double plays turned.
    pub dp: Option<f64>,
}

// ---------------------------------------------------------------------------
// StatBlock / StatLine
// ---------------------------------------------------------------------------

/// The category-specific payload of one stat row.
#[derive(Debug, Clone, PartialEq)]
pub enum StatBlock {
    StandardBatting(StandardBatting),
    ValueBatting(ValueBatting),
    AdvancedBatting(AdvancedBatting),
    StandardPitching(StandardPitching),
    ValuePitching(ValuePitching),
    AdvancedPitching(AdvancedPitching),
    StandardFielding(StandardFielding),
}

impl StatBlock {
    pub fn category(&self) -> StatCategory {
        match self {
            StatBlock::StandardBatting(_) => StatCategory::StandardBatting,
            StatBlock::ValueBatting(_) => StatCategory::ValueBatting,
            StatBlock::AdvancedBatting(_) => StatCategory::AdvancedBatting,
            StatBlock::StandardPitching(_) => StatCategory::StandardPitching,
            StatBlock::ValuePitching(_) => StatCategory::ValuePitching,
            StatBlock::AdvancedPitching(_) => StatCategory::AdvancedPitching,
            StatBlock::StandardFielding(_) => StatCategory::StandardFielding,
        }
    }

    /// Decode a stored JSON object into the record for `category`.
    pub fn from_json(
        category: StatCategory,
        value: serde_json::Value,
    ) -> Result<StatBlock, serde_json::Error> {
        Ok(match category {
            StatCategory::StandardBatting => StatBlock::StandardBatting(serde_json::from_value(value)?),
            StatCategory::ValueBatting => StatBlock::ValueBatting(serde_json::from_value(value)?),
            StatCategory::AdvancedBatting => StatBlock::AdvancedBatting(serde_json::from_value(value)?),
            StatCategory::StandardPitching => {
                StatBlock::StandardPitching(serde_json::from_value(value)?)
            }
            StatCategory::ValuePitching => StatBlock::ValuePitching(serde_json::from_value(value)?),
            StatCategory::AdvancedPitching => {
                StatBlock::AdvancedPitching(serde_json::from_value(value)?)
            }
            StatCategory::StandardFielding => {
                StatBlock::StandardFielding(serde_json::from_value(value)?)
            }
        })
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            StatBlock::StandardBatting(s) => serde_json::to_value(s),
            StatBlock::ValueBatting(s) => serde_json::to_value(s),
            StatBlock::AdvancedBatting(s) => serde_json::to_value(s),
            StatBlock::StandardPitching(s) => serde_json::to_value(s),
            StatBlock::ValuePitching(s) => serde_json::to_value(s),
            StatBlock::AdvancedPitching(s) => serde_json::to_value(s),
            StatBlock::StandardFielding(s) => serde_json::to_value(s),
        }
    }
}

/// One category x season x team row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub player_id: PlayerId,
    pub season: i32,
    pub team: String,
    /// Tier the row was recorded at, when the source reports it.
    pub level: Option<Level>,
    /// Player age during the season, when the source reports it.
    pub age: Option<u32>,
    pub stats: StatBlock,
}

impl StatLine {
    pub fn category(&self) -> StatCategory {
        self.stats.category()
    }

    /// Tier for this row, falling back to the player's current tier.
    pub fn level_or(&self, player_level: Level) -> Level {
        self.level.unwrap_or(player_level)
    }

    /// WAR carried by a standard batting or standard pitching row.
    pub fn standard_war(&self) -> Option<f64> {
        match &self.stats {
            StatBlock::StandardBatting(s) => s.war,
            StatBlock::StandardPitching(s) => s.war,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_parse_matches_as_str() {
        for cat in StatCategory::ALL {
            assert_eq!(StatCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(StatCategory::parse("pitch_tracking"), None);
    }

    #[test]
    fn from_json_fills_missing_fields_with_none() {
        let block =
            StatBlock::from_json(StatCategory::StandardPitching, json!({"era": 2.8, "whip": 1.05}))
                .unwrap();
        match block {
            StatBlock::StandardPitching(s) => {
                assert_eq!(s.era, Some(2.8));
                assert_eq!(s.whip, Some(1.05));
                assert_eq!(s.so, None);
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn standard_war_only_reads_standard_tables() {
        let line = StatLine {
            player_id: 1,
            season: 2024,
            team: "NYY".into(),
            level: None,
            age: None,
            stats: StatBlock::ValuePitching(ValuePitching {
                war: Some(3.0),
                ..Default::default()
            }),
        };
        assert_eq!(line.standard_war(), None);
        assert_eq!(line.level_or(Level::Aa), Level::Aa);
    }
}
