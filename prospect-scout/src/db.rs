// SQLite persistence layer for players, stat rows, and computed results.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::engine::calibration::LevelWeights;
use crate::engine::features::FeatureVector;
use crate::engine::ratings::RatingProfile;
use crate::model::{Level, PlayerId, PlayerRecord, StatBlock, StatCategory, StatLine};
use crate::store::{PopulationCounts, ResultSink, StatSource, UpsertOutcome};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The single row id of the `level_weights` table.
const LEVEL_WEIGHTS_ROW: i64 = 1;

/// SQLite-backed storage for the scouting population and the engine's
/// denormalized result caches.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id         INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                level      TEXT NOT NULL,
                position   TEXT NOT NULL,
                birth_date TEXT
            );

            CREATE TABLE IF NOT EXISTS stat_lines (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL REFERENCES players(id),
                category  TEXT NOT NULL,
                season    INTEGER NOT NULL,
                team      TEXT NOT NULL,
                level     TEXT,
                age       INTEGER,
                stats     TEXT NOT NULL,
                UNIQUE(player_id, category, season, team)
            );

            CREATE INDEX IF NOT EXISTS idx_stat_lines_player
                ON stat_lines(player_id, category, season);

            CREATE TABLE IF NOT EXISTS player_features (
                player_id  INTEGER PRIMARY KEY REFERENCES players(id),
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS player_ratings (
                player_id  INTEGER PRIMARY KEY REFERENCES players(id),
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS level_weights (
                id         INTEGER PRIMARY KEY CHECK (id = 1),
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a player or overwrite the existing row with the same id.
    pub fn upsert_player(&self, player: &PlayerRecord) -> Result<()> {
        let conn = self.conn();
        write_player(&conn, player)
    }

    /// Insert a stat row or replace the row for the same
    /// `(player, category, season, team)`.
    pub fn upsert_stat_line(&self, line: &StatLine) -> Result<()> {
        let conn = self.conn();
        write_stat_line(&conn, line)
    }

    /// Import players and their stat rows in a single transaction.
    pub fn import(&self, players: &[PlayerRecord], lines: &[StatLine]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;

        for player in players {
            write_player(&tx, player)?;
        }
        for line in lines {
            write_stat_line(&tx, line)?;
        }

        tx.commit().context("failed to commit import")?;
        Ok(())
    }

    /// Stored feature payload for a player, exactly as written.
    pub fn stored_features(&self, player_id: PlayerId) -> Result<Option<String>> {
        self.stored_payload("player_features", "player_id", player_id)
    }

    /// Stored rating payload for a player, exactly as written.
    pub fn stored_rating(&self, player_id: PlayerId) -> Result<Option<String>> {
        self.stored_payload("player_ratings", "player_id", player_id)
    }

    fn stored_payload(&self, table: &str, key_column: &str, key: i64) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT payload FROM {table} WHERE {key_column} = ?1"),
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read {table} row {key}"))
    }

    /// Write `payload` under `key` unless the stored payload is identical.
    fn upsert_payload(
        &self,
        table: &str,
        key_column: &str,
        key: i64,
        payload: &str,
    ) -> Result<UpsertOutcome> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .with_context(|| format!("failed to begin {table} upsert"))?;

        let existing: Option<String> = tx
            .query_row(
                &format!("SELECT payload FROM {table} WHERE {key_column} = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read {table} row {key}"))?;

        let outcome = match existing {
            Some(stored) if stored == payload => UpsertOutcome::Unchanged,
            Some(_) => {
                tx.execute(
                    &format!(
                        "UPDATE {table}
                         SET payload = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE {key_column} = ?1"
                    ),
                    params![key, payload],
                )
                .with_context(|| format!("failed to update {table} row {key}"))?;
                UpsertOutcome::Updated
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO {table} ({key_column}, payload, updated_at)
                         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))"
                    ),
                    params![key, payload],
                )
                .with_context(|| format!("failed to insert {table} row {key}"))?;
                UpsertOutcome::Created
            }
        };

        tx.commit()
            .with_context(|| format!("failed to commit {table} upsert"))?;
        Ok(outcome)
    }
}

fn write_player(conn: &Connection, player: &PlayerRecord) -> Result<()> {
    let birth_date = player
        .birth_date
        .map(|d| d.format(DATE_FORMAT).to_string());
    conn.execute(
        "INSERT INTO players (id, name, level, position, birth_date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name       = excluded.name,
            level      = excluded.level,
            position   = excluded.position,
            birth_date = excluded.birth_date",
        params![
            player.id,
            player.name,
            player.level.as_str(),
            player.position,
            birth_date,
        ],
    )
    .with_context(|| format!("failed to upsert player {}", player.id))?;
    Ok(())
}

fn write_stat_line(conn: &Connection, line: &StatLine) -> Result<()> {
    let stats = line
        .stats
        .to_json()
        .context("failed to serialize stat row")?
        .to_string();
    conn.execute(
        "INSERT INTO stat_lines (player_id, category, season, team, level, age, stats)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(player_id, category, season, team) DO UPDATE SET
            level = excluded.level,
            age   = excluded.age,
            stats = excluded.stats",
        params![
            line.player_id,
            line.category().as_str(),
            line.season,
            line.team,
            line.level.map(|l| l.as_str()),
            line.age,
            stats,
        ],
    )
    .with_context(|| {
        format!(
            "failed to upsert {} row for player {} season {}",
            line.category().as_str(),
            line.player_id,
            line.season
        )
    })?;
    Ok(())
}

type PlayerRow = (PlayerId, String, String, String, Option<String>);

fn player_from_row(row: PlayerRow) -> PlayerRecord {
    let (id, name, level, position, birth_date) = row;
    PlayerRecord {
        id,
        name,
        level: Level::parse(&level),
        position,
        birth_date: birth_date.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
    }
}

fn read_player_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

// ---------------------------------------------------------------------------
// Engine seams
// ---------------------------------------------------------------------------

impl StatSource for Database {
    fn player(&self, id: PlayerId) -> Result<Option<PlayerRecord>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, name, level, position, birth_date FROM players WHERE id = ?1",
                params![id],
                read_player_row,
            )
            .optional()
            .with_context(|| format!("failed to load player {id}"))?;
        Ok(row.map(player_from_row))
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, level, position, birth_date FROM players ORDER BY id")
            .context("failed to prepare players query")?;
        let rows = stmt
            .query_map([], read_player_row)
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(rows.into_iter().map(player_from_row).collect())
    }

    fn stat_lines(
        &self,
        player_id: PlayerId,
        category: StatCategory,
        season: Option<i32>,
    ) -> Result<Vec<StatLine>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT season, team, level, age, stats FROM stat_lines
                 WHERE player_id = ?1 AND category = ?2 AND (?3 IS NULL OR season = ?3)
                 ORDER BY season, team",
            )
            .context("failed to prepare stat_lines query")?;

        let rows = stmt
            .query_map(params![player_id, category.as_str(), season], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<u32>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .context("failed to query stat rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat rows")?;

        rows.into_iter()
            .map(|(season, team, level, age, stats)| {
                let value: serde_json::Value = serde_json::from_str(&stats).with_context(|| {
                    format!("corrupt {} row for player {player_id}", category.as_str())
                })?;
                let stats = StatBlock::from_json(category, value).with_context(|| {
                    format!("corrupt {} row for player {player_id}", category.as_str())
                })?;
                Ok(StatLine {
                    player_id,
                    season,
                    team,
                    level: level.as_deref().map(Level::parse),
                    age,
                    stats,
                })
            })
            .collect()
    }

    fn population_counts(&self) -> Result<PopulationCounts> {
        let conn = self.conn();
        let (players, stat_rows): (i64, i64) = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM players), (SELECT COUNT(*) FROM stat_lines)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("failed to count population")?;
        Ok(PopulationCounts {
            players: players as u64,
            stat_rows: stat_rows as u64,
        })
    }
}

impl ResultSink for Database {
    fn upsert_features(
        &self,
        player_id: PlayerId,
        features: &FeatureVector,
    ) -> Result<UpsertOutcome> {
        let payload = serde_json::to_string(features).context("failed to serialize features")?;
        self.upsert_payload("player_features", "player_id", player_id, &payload)
    }

    fn upsert_rating(&self, player_id: PlayerId, profile: &RatingProfile) -> Result<UpsertOutcome> {
        let payload = serde_json::to_string(profile).context("failed to serialize rating")?;
        self.upsert_payload("player_ratings", "player_id", player_id, &payload)
    }

    fn save_level_weights(&self, weights: &LevelWeights) -> Result<UpsertOutcome> {
        let payload =
            serde_json::to_string(weights).context("failed to serialize level weights")?;
        self.upsert_payload("level_weights", "id", LEVEL_WEIGHTS_ROW, &payload)
    }

    fn load_level_weights(&self) -> Result<Option<LevelWeights>> {
        let Some(payload) = self.stored_payload("level_weights", "id", LEVEL_WEIGHTS_ROW)? else {
            return Ok(None);
        };
        let weights = serde_json::from_str(&payload).context("corrupt level weights row")?;
        Ok(Some(weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calibration::WeightSource;
    use crate::model::stats::{StandardBatting, StandardPitching};

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn sample_player(id: PlayerId) -> PlayerRecord {
        PlayerRecord {
            id,
            name: format!("Player {id}"),
            level: Level::Aa,
            position: "Shortstop".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2002, 3, 14),
        }
    }

    fn batting_line(player_id: PlayerId, season: i32, team: &str, ba: f64) -> StatLine {
        StatLine {
            player_id,
            season,
            team: team.to_string(),
            level: Some(Level::Aa),
            age: Some(22),
            stats: StatBlock::StandardBatting(StandardBatting {
                pa: Some(410.0),
                ba: Some(ba),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["players", "stat_lines", "player_features", "player_ratings", "level_weights"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn player_round_trip_preserves_fields() {
        let db = test_db();
        db.upsert_player(&sample_player(7)).unwrap();

        let loaded = db.player(7).unwrap().unwrap();
        assert_eq!(loaded, sample_player(7));
        assert!(db.player(8).unwrap().is_none());
    }

    #[test]
    fn upsert_player_overwrites_by_id() {
        let db = test_db();
        db.upsert_player(&sample_player(1)).unwrap();
        db.upsert_player(&PlayerRecord {
            level: Level::Mlb,
            ..sample_player(1)
        })
        .unwrap();

        let players = db.players().unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].level, Level::Mlb);
    }

    #[test]
    fn stat_lines_filter_by_category_and_season() {
        let db = test_db();
        db.upsert_player(&sample_player(1)).unwrap();
        db.upsert_stat_line(&batting_line(1, 2023, "Akron", 0.250)).unwrap();
        db.upsert_stat_line(&batting_line(1, 2024, "Erie", 0.280)).unwrap();
        db.upsert_stat_line(&batting_line(1, 2024, "Akron", 0.300)).unwrap();

        let all = db.stat_lines(1, StatCategory::StandardBatting, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!((all[1].season, all[1].team.as_str()), (2024, "Akron"));

        let one = db
            .stat_lines(1, StatCategory::StandardBatting, Some(2023))
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0], batting_line(1, 2023, "Akron", 0.250));

        assert!(db
            .stat_lines(1, StatCategory::StandardPitching, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn stat_line_upsert_replaces_same_key() {
        let db = test_db();
        db.upsert_player(&sample_player(1)).unwrap();
        db.upsert_stat_line(&batting_line(1, 2024, "Akron", 0.250)).unwrap();
        db.upsert_stat_line(&batting_line(1, 2024, "Akron", 0.275)).unwrap();

        let rows = db.stat_lines(1, StatCategory::StandardBatting, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(db.population_counts().unwrap().stat_rows, 1);
    }

    #[test]
    fn foreign_keys_enforced() {
        let db = test_db();
        let result = db.upsert_stat_line(&batting_line(99, 2024, "Nowhere", 0.2));
        assert!(result.is_err());
    }

    #[test]
    fn import_is_transactional() {
        let db = test_db();
        let players = vec![sample_player(1), sample_player(2)];
        let lines = vec![
            batting_line(1, 2024, "Akron", 0.250),
            StatLine {
                player_id: 2,
                season: 2024,
                team: "Erie".into(),
                level: None,
                age: None,
                stats: StatBlock::StandardPitching(StandardPitching {
                    era: Some(3.2),
                    ..Default::default()
                }),
            },
        ];
        db.import(&players, &lines).unwrap();
        assert_eq!(
            db.population_counts().unwrap(),
            PopulationCounts {
                players: 2,
                stat_rows: 2
            }
        );

        // A dangling row rolls back the whole batch.
        let bad = vec![batting_line(50, 2024, "Ghosts", 0.1)];
        assert!(db.import(&[sample_player(3)], &bad).is_err());
        assert_eq!(db.population_counts().unwrap().players, 2);
    }

    #[test]
    fn level_weights_round_trip_and_skip_identical_writes() {
        let db = test_db();
        assert!(db.load_level_weights().unwrap().is_none());

        let mut weights = LevelWeights::defaults();
        weights.source = WeightSource::Calibrated;
        weights.factors.insert(Level::Aa, 0.55);

        assert_eq!(db.save_level_weights(&weights).unwrap(), UpsertOutcome::Created);
        assert_eq!(db.save_level_weights(&weights).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(db.load_level_weights().unwrap(), Some(weights.clone()));

        weights.factors.insert(Level::Aa, 0.65);
        assert_eq!(db.save_level_weights(&weights).unwrap(), UpsertOutcome::Updated);
    }

    #[test]
    fn unchanged_payload_keeps_timestamp() {
        let db = test_db();
        db.upsert_player(&sample_player(1)).unwrap();
        let stamp = |db: &Database| -> String {
            db.conn()
                .query_row(
                    "SELECT updated_at FROM level_weights WHERE id = 1",
                    [],
                    |row| row.get(0),
                )
                .unwrap()
        };

        db.save_level_weights(&LevelWeights::defaults()).unwrap();
        let first = stamp(&db);
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.save_level_weights(&LevelWeights::defaults()).unwrap();
        assert_eq!(stamp(&db), first);
    }
}
