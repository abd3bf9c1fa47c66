// CSV import of players and per-category stat rows into the database.
//
// A data directory holds `players.csv` plus one optional file per stat
// category, named after the category (e.g. `standard_batting.csv`). Stat
// headers are matched to record fields after normalization, so source-style
// headers such as `HardH%`, `ERA+` or `xFIP-` load without renaming.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::model::{Level, PlayerId, PlayerRecord, StatBlock, StatCategory, StatLine};
use crate::store::StatSource;

pub const PLAYERS_FILE: &str = "players.csv";

/// Columns of a stat file that describe the row rather than the stats.
const ROW_COLUMNS: [&str; 5] = ["player_id", "season", "team", "level", "age"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub players: usize,
    pub stat_rows: usize,
    pub skipped_rows: usize,
}

// ---------------------------------------------------------------------------
// Raw CSV structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: PlayerId,
    name: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    birth_date: String,
}

/// Lowercase a header and spell out the symbol suffixes used by stat
/// sources: `%` becomes `_pct`, `+` becomes `_plus`, `-` becomes `_minus`.
pub fn normalize_header(header: &str) -> String {
    let mut out = String::new();
    for c in header.trim().chars() {
        match c {
            '%' => out.push_str("_pct"),
            '+' => out.push_str("_plus"),
            '-' => out.push_str("_minus"),
            ' ' => out.push('_'),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_players_from_reader<R: Read>(rdr: R) -> Result<(Vec<PlayerRecord>, usize), csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    let mut skipped = 0;
    for result in reader.deserialize::<RawPlayer>() {
        match result {
            Ok(raw) => {
                if raw.id <= 0 {
                    warn!("skipping player '{}': non-positive id {}", raw.name.trim(), raw.id);
                    skipped += 1;
                    continue;
                }
                let birth = raw.birth_date.trim();
                let birth_date = if birth.is_empty() {
                    None
                } else {
                    match NaiveDate::parse_from_str(birth, "%Y-%m-%d") {
                        Ok(date) => Some(date),
                        Err(_) => {
                            warn!("player {}: ignoring unparseable birth date '{}'", raw.id, birth);
                            None
                        }
                    }
                };
                players.push(PlayerRecord {
                    id: raw.id,
                    name: raw.name.trim().to_string(),
                    level: Level::parse(&raw.level),
                    position: raw.position.trim().to_string(),
                    birth_date,
                });
            }
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
                skipped += 1;
            }
        }
    }
    Ok((players, skipped))
}

fn optional_cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn load_stat_lines_from_reader<R: Read>(
    rdr: R,
    category: StatCategory,
) -> Result<(Vec<StatLine>, usize), csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (player_col, season_col) = (column("player_id"), column("season"));
    let (team_col, level_col, age_col) = (column("team"), column("level"), column("age"));

    let mut lines = Vec::new();
    let mut skipped = 0;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed {} row: {}", category.as_str(), e);
                skipped += 1;
                continue;
            }
        };

        let player_id = optional_cell(&record, player_col).and_then(|s| s.parse::<PlayerId>().ok());
        let season = optional_cell(&record, season_col).and_then(|s| s.parse::<i32>().ok());
        let (Some(player_id), Some(season)) = (player_id, season) else {
            warn!(
                "skipping {} row {:?}: missing player_id or season",
                category.as_str(),
                record.position().map(|p| p.line())
            );
            skipped += 1;
            continue;
        };

        let mut stats = serde_json::Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            if ROW_COLUMNS.contains(&header.as_str()) || cell.is_empty() {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    stats.insert(header.clone(), serde_json::Value::from(v));
                }
                _ => debug!("player {player_id} {season}: ignoring non-numeric {header}='{cell}'"),
            }
        }

        let stats = match StatBlock::from_json(category, serde_json::Value::Object(stats)) {
            Ok(block) => block,
            Err(e) => {
                warn!(
                    "skipping {} row for player {} season {}: {}",
                    category.as_str(),
                    player_id,
                    season,
                    e
                );
                skipped += 1;
                continue;
            }
        };

        lines.push(StatLine {
            player_id,
            season,
            team: optional_cell(&record, team_col).unwrap_or_default().to_string(),
            level: optional_cell(&record, level_col).map(Level::parse),
            age: optional_cell(&record, age_col).and_then(|s| s.parse().ok()),
            stats,
        });
    }
    Ok((lines, skipped))
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, ImportError> {
    std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_players(path: &Path) -> Result<(Vec<PlayerRecord>, usize), ImportError> {
    load_players_from_reader(open(path)?).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_stat_lines(
    path: &Path,
    category: StatCategory,
) -> Result<(Vec<StatLine>, usize), ImportError> {
    load_stat_lines_from_reader(open(path)?, category).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Import a data directory into `db` in one transaction. Stat rows for
/// players that are neither in the file nor already stored are skipped.
pub fn import_dir(db: &Database, dir: &Path) -> Result<ImportSummary, ImportError> {
    let (players, mut skipped_rows) = load_players(&dir.join(PLAYERS_FILE))?;
    let mut known: HashSet<PlayerId> = players.iter().map(|p| p.id).collect();
    known.extend(db.players()?.into_iter().map(|p| p.id));

    let mut lines = Vec::new();
    for category in StatCategory::ALL {
        let path = dir.join(format!("{}.csv", category.as_str()));
        if !path.exists() {
            debug!("no {} file in {}", category.as_str(), dir.display());
            continue;
        }
        let (loaded, skipped) = load_stat_lines(&path, category)?;
        skipped_rows += skipped;
        for line in loaded {
            if known.contains(&line.player_id) {
                lines.push(line);
            } else {
                warn!(
                    "skipping {} row for unknown player {}",
                    category.as_str(),
                    line.player_id
                );
                skipped_rows += 1;
            }
        }
    }

    db.import(&players, &lines)?;
    let summary = ImportSummary {
        players: players.len(),
        stat_rows: lines.len(),
        skipped_rows,
    };
    info!(
        "Imported {} players and {} stat rows from {} ({} skipped)",
        summary.players,
        summary.stat_rows,
        dir.display(),
        summary.skipped_rows
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stats::{AdvancedPitching, StandardPitching};

    #[test]
    fn headers_normalize_symbols() {
        assert_eq!(normalize_header("HardH%"), "hardh_pct");
        assert_eq!(normalize_header("ERA+"), "era_plus");
        assert_eq!(normalize_header("xFIP-"), "xfip_minus");
        assert_eq!(normalize_header(" Player_ID "), "player_id");
        assert_eq!(normalize_header("Fld%"), "fld_pct");
    }

    #[test]
    fn players_parse_with_lenient_fields() {
        let csv = "\
id,name,level,position,birth_date
1,Ace Arm,MLB,Pitcher,1996-04-12
2,Two Way,AA,\"Pitcher, Outfielder\",
3,Odd Date,rookie,Catcher,sometime
0,Bad Id,AAA,Catcher,
x,Broken,AAA,Catcher,
";
        let (players, skipped) = load_players_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 3);
        assert_eq!(skipped, 2);
        assert_eq!(players[0].level, Level::Mlb);
        assert_eq!(players[0].birth_date, NaiveDate::from_ymd_opt(1996, 4, 12));
        assert_eq!(players[1].position, "Pitcher, Outfielder");
        assert_eq!(players[1].birth_date, None);
        assert_eq!(players[2].level, Level::Rookie);
        assert_eq!(players[2].birth_date, None);
    }

    #[test]
    fn stat_rows_map_source_headers_to_fields() {
        let csv = "\
player_id,season,team,level,age,IP,ERA,ERA+,WHIP,SO9
1,2024,Club,,28,180.1,2.80,150,1.05,10.2
1,2023,Club,AAA,27,60,,,1.30,
";
        let (lines, skipped) =
            load_stat_lines_from_reader(csv.as_bytes(), StatCategory::StandardPitching).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, None);
        assert_eq!(lines[0].age, Some(28));
        assert_eq!(
            lines[0].stats,
            StatBlock::StandardPitching(StandardPitching {
                ip: Some(180.1),
                era: Some(2.80),
                era_plus: Some(150.0),
                whip: Some(1.05),
                so9: Some(10.2),
                ..Default::default()
            })
        );
        assert_eq!(lines[1].level, Some(Level::Aaa));
        match &lines[1].stats {
            StatBlock::StandardPitching(s) => {
                assert_eq!(s.era, None);
                assert_eq!(s.whip, Some(1.30));
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn advanced_headers_with_symbols() {
        let csv = "player_id,season,K%,BB%,LOB%,ERA-,xFIP-\n4,2024,27.5,6.1,75.0,80,85\n";
        let (lines, _) =
            load_stat_lines_from_reader(csv.as_bytes(), StatCategory::AdvancedPitching).unwrap();
        assert_eq!(
            lines[0].stats,
            StatBlock::AdvancedPitching(AdvancedPitching {
                k_pct: Some(27.5),
                bb_pct: Some(6.1),
                lob_pct: Some(75.0),
                era_minus: Some(80.0),
                xfip_minus: Some(85.0),
                ..Default::default()
            })
        );
        assert_eq!(lines[0].team, "");
    }

    #[test]
    fn rows_without_keys_are_skipped() {
        let csv = "player_id,season,BA\n,2024,.250\n5,,.260\n6,2024,.270\n";
        let (lines, skipped) =
            load_stat_lines_from_reader(csv.as_bytes(), StatCategory::StandardBatting).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(skipped, 2);
        assert_eq!(lines[0].player_id, 6);
    }

    #[test]
    fn import_dir_skips_rows_for_unknown_players() {
        let dir = std::env::temp_dir().join("scout_import_unknown");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(PLAYERS_FILE),
            "id,name,level,position,birth_date\n1,Known,AA,Shortstop,2001-05-05\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("standard_batting.csv"),
            "player_id,season,team,PA,BA\n1,2024,Club,300,.280\n9,2024,Club,300,.300\n",
        )
        .unwrap();

        let db = Database::open(":memory:").unwrap();
        let summary = import_dir(&db, &dir).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                players: 1,
                stat_rows: 1,
                skipped_rows: 1
            }
        );
        assert_eq!(db.population_counts().unwrap().stat_rows, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_players_file_is_an_io_error() {
        let db = Database::open(":memory:").unwrap();
        let result = import_dir(&db, Path::new("/nonexistent/scout-data"));
        assert!(matches!(result, Err(ImportError::Io { .. })));
    }
}
