//! SQLite storage for pitch events and feature rows

use crate::features::enrich::EnrichedGameRecord;
use crate::{DateWindow, HalfInning, PitchEvent, PitcherId, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pitch_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pitcher INTEGER NOT NULL,
                game_date TEXT NOT NULL,
                inning_topbot TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                events TEXT,
                pitch_type TEXT,
                inning INTEGER NOT NULL,
                batter INTEGER NOT NULL,
                days_since_prev_game REAL
            );

            CREATE TABLE IF NOT EXISTS pitcher_games (
                pitcher_id INTEGER NOT NULL,
                game_date TEXT NOT NULL,
                pitcher_name TEXT NOT NULL,
                pitch_count INTEGER NOT NULL,
                strikeouts INTEGER NOT NULL,
                max_inning INTEGER NOT NULL,
                num_pitch_types INTEGER NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                pitcher_team TEXT NOT NULL,
                opponent_team TEXT NOT NULL,
                rest_days INTEGER NOT NULL,
                whiff_rate REAL NOT NULL,
                csw_pct REAL NOT NULL,
                whiff_rate_expanding REAL NOT NULL,
                csw_pct_expanding REAL NOT NULL,
                opponent_k_pct REAL,
                park_factor_k REAL,
                rolling_k_avg_3 REAL NOT NULL,
                rolling_k_avg_5 REAL NOT NULL,
                rolling_pitch_count_5 REAL NOT NULL,
                rolling_k_rate REAL NOT NULL,
                PRIMARY KEY (pitcher_id, game_date)
            );

            CREATE INDEX IF NOT EXISTS idx_events_date ON pitch_events(game_date);
            CREATE INDEX IF NOT EXISTS idx_events_pitcher ON pitch_events(pitcher, game_date);
            CREATE INDEX IF NOT EXISTS idx_games_date ON pitcher_games(game_date);
            "#,
        )?;
        Ok(())
    }

    // ==================== Pitch Events ====================

    /// Replace every stored event in the date span of `events` with `events`
    ///
    /// Importing the same file twice leaves the table unchanged.
    pub fn replace_pitch_events(&mut self, events: &[PitchEvent]) -> Result<usize> {
        let window = match DateWindow::covering(events) {
            Some(window) => window,
            None => return Ok(0),
        };

        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM pitch_events WHERE game_date >= ?1 AND game_date <= ?2",
            params![format_date(window.start()), format_date(window.end())],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pitch_events (pitcher, game_date, inning_topbot, home_team, away_team,
                                           description, events, pitch_type, inning, batter,
                                           days_since_prev_game)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.pitcher.0,
                    format_date(event.game_date),
                    event.inning_topbot.code(),
                    event.home_team,
                    event.away_team,
                    event.description,
                    event.events,
                    event.pitch_type,
                    event.inning,
                    event.batter,
                    event.days_since_prev_game,
                ])?;
            }
        }
        tx.commit()?;

        log::info!(
            "Stored {} pitch events for {} (replaced {})",
            events.len(),
            window,
            removed
        );
        Ok(events.len())
    }

    /// Events in insertion order, optionally limited to a window
    pub fn get_pitch_events(&self, window: Option<DateWindow>) -> Result<Vec<PitchEvent>> {
        let (start, end) = match window {
            Some(w) => (format_date(w.start()), format_date(w.end())),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };

        let mut stmt = self.conn.prepare(
            "SELECT pitcher, game_date, inning_topbot, home_team, away_team, description,
                    events, pitch_type, inning, batter, days_since_prev_game
             FROM pitch_events
             WHERE game_date >= ?1 AND game_date <= ?2
             ORDER BY id",
        )?;

        let events = stmt
            .query_map(params![start, end], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Date span of stored events
    pub fn event_date_range(&self) -> Result<Option<DateWindow>> {
        let (min, max): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(game_date), MAX(game_date) FROM pitch_events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        match (min.and_then(|s| parse_stored(&s)), max.and_then(|s| parse_stored(&s))) {
            (Some(start), Some(end)) => Ok(Some(DateWindow::new(start, end)?)),
            _ => Ok(None),
        }
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<PitchEvent> {
        let half: String = row.get(2)?;
        let inning_topbot = HalfInning::from_code(&half).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown half-inning marker '{}'", half).into(),
            )
        })?;

        Ok(PitchEvent {
            pitcher: PitcherId(row.get(0)?),
            game_date: date_column(row, 1)?,
            inning_topbot,
            home_team: row.get(3)?,
            away_team: row.get(4)?,
            description: row.get(5)?,
            events: row.get(6)?,
            pitch_type: row.get(7)?,
            inning: row.get(8)?,
            batter: row.get(9)?,
            days_since_prev_game: row.get(10)?,
        })
    }

    // ==================== Feature Rows ====================

    /// Insert or update feature rows keyed on (pitcher, game date)
    pub fn upsert_game_records(&mut self, records: &[EnrichedGameRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO pitcher_games (pitcher_id, game_date, pitcher_name, pitch_count,
                                           strikeouts, max_inning, num_pitch_types, home_team,
                                           away_team, pitcher_team, opponent_team, rest_days,
                                           whiff_rate, csw_pct, whiff_rate_expanding,
                                           csw_pct_expanding, opponent_k_pct, park_factor_k,
                                           rolling_k_avg_3, rolling_k_avg_5,
                                           rolling_pitch_count_5, rolling_k_rate)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                        ?16, ?17, ?18, ?19, ?20, ?21, ?22)
                ON CONFLICT(pitcher_id, game_date) DO UPDATE SET
                    pitcher_name = excluded.pitcher_name,
                    pitch_count = excluded.pitch_count,
                    strikeouts = excluded.strikeouts,
                    max_inning = excluded.max_inning,
                    num_pitch_types = excluded.num_pitch_types,
                    home_team = excluded.home_team,
                    away_team = excluded.away_team,
                    pitcher_team = excluded.pitcher_team,
                    opponent_team = excluded.opponent_team,
                    rest_days = excluded.rest_days,
                    whiff_rate = excluded.whiff_rate,
                    csw_pct = excluded.csw_pct,
                    whiff_rate_expanding = excluded.whiff_rate_expanding,
                    csw_pct_expanding = excluded.csw_pct_expanding,
                    opponent_k_pct = excluded.opponent_k_pct,
                    park_factor_k = excluded.park_factor_k,
                    rolling_k_avg_3 = excluded.rolling_k_avg_3,
                    rolling_k_avg_5 = excluded.rolling_k_avg_5,
                    rolling_pitch_count_5 = excluded.rolling_pitch_count_5,
                    rolling_k_rate = excluded.rolling_k_rate
                "#,
            )?;
            for r in records {
                stmt.execute(params![
                    r.pitcher_id.0,
                    format_date(r.game_date),
                    r.pitcher_name,
                    r.pitch_count,
                    r.strikeouts,
                    r.max_inning,
                    r.num_pitch_types,
                    r.home_team,
                    r.away_team,
                    r.pitcher_team,
                    r.opponent_team,
                    r.rest_days,
                    r.whiff_rate,
                    r.csw_pct,
                    r.whiff_rate_expanding,
                    r.csw_pct_expanding,
                    r.opponent_k_pct,
                    r.park_factor_k,
                    r.rolling_k_avg_3,
                    r.rolling_k_avg_5,
                    r.rolling_pitch_count_5,
                    r.rolling_k_rate,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Stored feature rows ordered by pitcher then date
    pub fn get_game_records(&self, pitcher: Option<PitcherId>) -> Result<Vec<EnrichedGameRecord>> {
        let mut sql = String::from(
            "SELECT pitcher_name, pitcher_id, game_date, pitch_count, strikeouts, max_inning,
                    num_pitch_types, home_team, away_team, pitcher_team, opponent_team, rest_days,
                    whiff_rate, csw_pct, whiff_rate_expanding, csw_pct_expanding, opponent_k_pct,
                    park_factor_k, rolling_k_avg_3, rolling_k_avg_5, rolling_pitch_count_5,
                    rolling_k_rate
             FROM pitcher_games",
        );
        let mut stmt;
        let records = match pitcher {
            Some(id) => {
                sql.push_str(" WHERE pitcher_id = ?1 ORDER BY game_date");
                stmt = self.conn.prepare(&sql)?;
                stmt.query_map(params![id.0], Self::row_to_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                sql.push_str(" ORDER BY pitcher_id, game_date");
                stmt = self.conn.prepare(&sql)?;
                stmt.query_map([], Self::row_to_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(records)
    }

    /// Most recent game date in the feature table
    pub fn latest_game_date(&self) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = self
            .conn
            .query_row("SELECT MAX(game_date) FROM pitcher_games", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(latest.and_then(|s| parse_stored(&s)))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<EnrichedGameRecord> {
        Ok(EnrichedGameRecord {
            pitcher_name: row.get(0)?,
            pitcher_id: PitcherId(row.get(1)?),
            game_date: date_column(row, 2)?,
            pitch_count: row.get(3)?,
            strikeouts: row.get(4)?,
            max_inning: row.get(5)?,
            num_pitch_types: row.get(6)?,
            home_team: row.get(7)?,
            away_team: row.get(8)?,
            pitcher_team: row.get(9)?,
            opponent_team: row.get(10)?,
            rest_days: row.get(11)?,
            whiff_rate: row.get(12)?,
            csw_pct: row.get(13)?,
            whiff_rate_expanding: row.get(14)?,
            csw_pct_expanding: row.get(15)?,
            opponent_k_pct: row.get(16)?,
            park_factor_k: row.get(17)?,
            rolling_k_avg_3: row.get(18)?,
            rolling_k_avg_5: row.get(19)?,
            rolling_pitch_count_5: row.get(20)?,
            rolling_k_rate: row.get(21)?,
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let event_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pitch_events", [], |row| row.get(0))?;

        let pitcher_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT pitcher) FROM pitch_events",
            [],
            |row| row.get(0),
        )?;

        let game_record_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pitcher_games", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            event_count: event_count as usize,
            pitcher_count: pitcher_count as usize,
            game_record_count: game_record_count as usize,
            event_range: self.event_date_range()?,
            latest_game: self.latest_game_date()?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub event_count: usize,
    pub pitcher_count: usize,
    pub game_record_count: usize,
    pub event_range: Option<DateWindow>,
    pub latest_game: Option<NaiveDate>,
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
