//! Strikeout feature engineering
//!
//! Builds a per-pitcher, per-game feature table from pitch-by-pitch event logs.
//! Every derived feature for a game only uses information available before
//! that game started.

pub mod data;
pub mod features;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::features::games::AggregationConfig;
use crate::features::opponent::OpponentConfig;
use crate::features::park::ParkConfig;
use crate::features::rolling::RollingConfig;
use crate::features::teams::TeamAliasConfig;

/// Pitch descriptions counted as whiffs
pub const WHIFF_DESCRIPTIONS: [&str; 2] = ["swinging_strike", "swinging_strike_blocked"];

/// Pitch descriptions counted as swings (whiffs, fouls and balls in play)
pub const SWING_DESCRIPTIONS: [&str; 5] = [
    "swinging_strike",
    "swinging_strike_blocked",
    "foul",
    "foul_tip",
    "hit_into_play",
];

pub const CALLED_STRIKE: &str = "called_strike";
pub const STRIKEOUT_EVENT: &str = "strikeout";

/// Unique identifier for a pitcher (upstream player id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PitcherId(pub i64);

impl fmt::Display for PitcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pitcher({})", self.0)
    }
}

/// Which half of the inning a pitch was thrown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalfInning {
    #[serde(rename = "Top", alias = "top", alias = "TOP")]
    Top,
    #[serde(rename = "Bot", alias = "Bottom", alias = "bot", alias = "bottom")]
    Bottom,
}

impl HalfInning {
    pub fn code(&self) -> &'static str {
        match self {
            HalfInning::Top => "Top",
            HalfInning::Bottom => "Bot",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "top" => Some(HalfInning::Top),
            "bot" | "bottom" => Some(HalfInning::Bottom),
            _ => None,
        }
    }
}

impl fmt::Display for HalfInning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single pitch from the upstream event feed
///
/// Field names follow the feed's column names so raw exports deserialize
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchEvent {
    pub pitcher: PitcherId,
    pub game_date: NaiveDate,
    pub inning_topbot: HalfInning,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub description: String,
    /// Terminal plate-appearance event, set only on the last pitch of a PA
    pub events: Option<String>,
    pub pitch_type: Option<String>,
    pub inning: u8,
    pub batter: i64,
    #[serde(rename = "pitcher_days_since_prev_game")]
    pub days_since_prev_game: Option<f64>,
}

impl PitchEvent {
    pub fn is_whiff(&self) -> bool {
        WHIFF_DESCRIPTIONS.contains(&self.description.as_str())
    }

    pub fn is_swing(&self) -> bool {
        SWING_DESCRIPTIONS.contains(&self.description.as_str())
    }

    pub fn is_called_strike(&self) -> bool {
        self.description == CALLED_STRIKE
    }

    pub fn is_strikeout(&self) -> bool {
        self.events.as_deref() == Some(STRIKEOUT_EVENT)
    }

    /// A non-null terminal event closes a plate appearance
    pub fn is_plate_appearance(&self) -> bool {
        self.events.is_some()
    }

    /// Raw label of the fielding team (home team pitches in the top half)
    pub fn pitching_team(&self) -> &str {
        match self.inning_topbot {
            HalfInning::Top => &self.home_team,
            HalfInning::Bottom => &self.away_team,
        }
    }

    /// Raw label of the batting team
    pub fn batting_team(&self) -> &str {
        match self.inning_topbot {
            HalfInning::Top => &self.away_team,
            HalfInning::Bottom => &self.home_team,
        }
    }
}

/// A pitcher from the roster lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherInfo {
    pub name: String,
    pub id: PitcherId,
}

/// Closed calendar window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(StrikeoutError::InvalidWindow { start, end });
        }
        Ok(DateWindow { start, end })
    }

    /// Smallest window covering every event, or None for an empty slice
    pub fn covering(events: &[PitchEvent]) -> Option<Self> {
        let start = events.iter().map(|e| e.game_date).min()?;
        let end = events.iter().map(|e| e.game_date).max()?;
        Some(DateWindow { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum StrikeoutError {
    #[error("Invalid date window: end {end} precedes start {start}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No pitch events for {0}")]
    UnknownPitcher(PitcherId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, StrikeoutError>;

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| StrikeoutError::Parse(format!("invalid date '{}': {}", s, e)))
}

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub aggregation: AggregationConfig,
    pub rolling: RollingConfig,
    pub opponent: OpponentConfig,
    pub park: ParkConfig,
    pub teams: TeamAliasConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_path: String,
    pub output_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/strikeout.db".to_string(),
            output_path: "data/processed/pitcher_game_data.csv".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrikeoutError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| StrikeoutError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrikeoutError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(half: HalfInning, description: &str, events: Option<&str>) -> PitchEvent {
        PitchEvent {
            pitcher: PitcherId(1),
            game_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            inning_topbot: half,
            home_team: "NYY".to_string(),
            away_team: "BOS".to_string(),
            description: description.to_string(),
            events: events.map(str::to_string),
            pitch_type: Some("FF".to_string()),
            inning: 1,
            batter: 100,
            days_since_prev_game: None,
        }
    }

    #[test]
    fn test_pitch_classification() {
        let whiff = make_event(HalfInning::Top, "swinging_strike_blocked", None);
        assert!(whiff.is_whiff());
        assert!(whiff.is_swing());
        assert!(!whiff.is_called_strike());

        let foul_tip = make_event(HalfInning::Top, "foul_tip", None);
        assert!(!foul_tip.is_whiff());
        assert!(foul_tip.is_swing());

        let called = make_event(HalfInning::Top, "called_strike", Some("strikeout"));
        assert!(called.is_called_strike());
        assert!(!called.is_swing());
        assert!(called.is_strikeout());
        assert!(called.is_plate_appearance());

        let ball = make_event(HalfInning::Top, "ball", None);
        assert!(!ball.is_plate_appearance());
        assert!(!ball.is_strikeout());
    }

    #[test]
    fn test_walk_is_plate_appearance_not_strikeout() {
        let walk = make_event(HalfInning::Top, "ball", Some("walk"));
        assert!(walk.is_plate_appearance());
        assert!(!walk.is_strikeout());
    }

    #[test]
    fn test_team_sides() {
        let top = make_event(HalfInning::Top, "ball", None);
        assert_eq!(top.pitching_team(), "NYY");
        assert_eq!(top.batting_team(), "BOS");

        let bottom = make_event(HalfInning::Bottom, "ball", None);
        assert_eq!(bottom.pitching_team(), "BOS");
        assert_eq!(bottom.batting_team(), "NYY");
    }

    #[test]
    fn test_half_inning_codes() {
        assert_eq!(HalfInning::from_code("Top"), Some(HalfInning::Top));
        assert_eq!(HalfInning::from_code("Bot"), Some(HalfInning::Bottom));
        assert_eq!(HalfInning::from_code(" bottom "), Some(HalfInning::Bottom));
        assert_eq!(HalfInning::from_code("middle"), None);
    }

    #[test]
    fn test_date_window_bounds() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        let window = DateWindow::new(start, end).unwrap();
        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()));

        // Single-day window is valid
        assert!(DateWindow::new(start, start).is_ok());

        let err = DateWindow::new(end, start).unwrap_err();
        assert!(matches!(err, StrikeoutError::InvalidWindow { .. }));
    }

    #[test]
    fn test_covering_window() {
        assert!(DateWindow::covering(&[]).is_none());

        let mut late = make_event(HalfInning::Top, "ball", None);
        late.game_date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let early = make_event(HalfInning::Top, "ball", None);

        let window = DateWindow::covering(&[late, early]).unwrap();
        assert_eq!(window.start(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(window.end(), NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_config_round_trip_defaults() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rolling.min_periods, 3);
        assert_eq!(parsed.opponent.default_k_pct, 0.055);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[opponent]\ndefault_k_pct = 0.2\n").unwrap();
        assert_eq!(parsed.opponent.default_k_pct, 0.2);
        assert_eq!(parsed.aggregation.default_rest_days, 5);
        assert_eq!(parsed.data.database_path, "data/strikeout.db");
    }
}
