//! Opponent strikeout rates
//!
//! Season-to-date strikeout rate for every batting team on every date it
//! played, using only plate appearances from earlier dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::features::teams::TeamNormalizer;
use crate::{DateWindow, PitchEvent, Result};

/// Opponent rate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentConfig {
    /// Rate reported before a team has any prior plate appearances
    pub default_k_pct: f64,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        OpponentConfig {
            default_k_pct: 0.055,
        }
    }
}

/// One team's batting line on one date, with totals from earlier dates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamDailyRate {
    pub game_date: NaiveDate,
    pub team: String,
    /// Strikeouts on this date
    pub strikeouts: u32,
    /// Plate appearances on this date
    pub plate_appearances: u32,
    /// Strikeouts on dates strictly before this one
    pub cum_strikeouts: u32,
    /// Plate appearances on dates strictly before this one
    pub cum_plate_appearances: u32,
    #[serde(rename = "K_pct_so_far")]
    pub k_pct_so_far: f64,
}

/// Daily team rates indexed by (date, team)
#[derive(Debug, Clone, Default)]
pub struct TeamDailyRates {
    rows: Vec<TeamDailyRate>,
    index: HashMap<(NaiveDate, String), usize>,
}

impl TeamDailyRates {
    fn from_rows(rows: Vec<TeamDailyRate>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, row)| ((row.game_date, row.team.clone()), i))
            .collect();
        TeamDailyRates { rows, index }
    }

    /// Rows ordered by team, then date
    pub fn rows(&self) -> &[TeamDailyRate] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate, team: &str) -> Option<&TeamDailyRate> {
        self.index
            .get(&(date, team.to_string()))
            .map(|&i| &self.rows[i])
    }

    /// Strikeout rate so far for a team on a date, None if the team did not play
    pub fn k_pct(&self, date: NaiveDate, team: &str) -> Option<f64> {
        self.get(date, team).map(|row| row.k_pct_so_far)
    }
}

/// Builds league-wide daily team strikeout rates
pub struct OpponentRateTracker<'a> {
    teams: &'a TeamNormalizer,
    config: OpponentConfig,
}

impl<'a> OpponentRateTracker<'a> {
    pub fn new(teams: &'a TeamNormalizer, config: OpponentConfig) -> Self {
        OpponentRateTracker { teams, config }
    }

    /// Validate the bounds, then compute
    pub fn compute_between(
        &self,
        events: &[PitchEvent],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TeamDailyRates> {
        let window = DateWindow::new(start, end)?;
        Ok(self.compute(events, window))
    }

    /// One row per (date, batting team) present in the window
    pub fn compute(&self, events: &[PitchEvent], window: DateWindow) -> TeamDailyRates {
        // (team, date) keys keep each team's dates in chronological order
        let mut daily: BTreeMap<(String, NaiveDate), (u32, u32)> = BTreeMap::new();
        for event in events.iter().filter(|e| window.contains(e.game_date)) {
            let team = self.teams.normalize(event.batting_team());
            let entry = daily.entry((team, event.game_date)).or_insert((0, 0));
            if event.is_strikeout() {
                entry.0 += 1;
            }
            if event.is_plate_appearance() {
                entry.1 += 1;
            }
        }

        let mut rows = Vec::with_capacity(daily.len());
        let mut current_team: Option<String> = None;
        let (mut cum_so, mut cum_pa) = (0u32, 0u32);

        for ((team, game_date), (strikeouts, plate_appearances)) in daily {
            if current_team.as_deref() != Some(team.as_str()) {
                current_team = Some(team.clone());
                cum_so = 0;
                cum_pa = 0;
            }

            // Totals are read before today's line is added
            let k_pct_so_far = if cum_pa == 0 {
                self.config.default_k_pct
            } else {
                cum_so as f64 / cum_pa as f64
            };

            rows.push(TeamDailyRate {
                game_date,
                team,
                strikeouts,
                plate_appearances,
                cum_strikeouts: cum_so,
                cum_plate_appearances: cum_pa,
                k_pct_so_far,
            });

            cum_so += strikeouts;
            cum_pa += plate_appearances;
        }

        log::info!(
            "Computed {} team-day strikeout rates over {}",
            rows.len(),
            window
        );
        TeamDailyRates::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HalfInning, PitcherId, StrikeoutError};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn window(start: u32, end: u32) -> DateWindow {
        DateWindow::new(date(start), date(end)).unwrap()
    }

    /// One plate appearance in `home` vs `away`, batting side set by `half`
    fn make_pa(day: u32, home: &str, away: &str, half: HalfInning, event: &str) -> PitchEvent {
        PitchEvent {
            pitcher: PitcherId(1),
            game_date: date(day),
            inning_topbot: half,
            home_team: home.to_string(),
            away_team: away.to_string(),
            description: "called_strike".to_string(),
            events: Some(event.to_string()),
            pitch_type: Some("FF".to_string()),
            inning: 1,
            batter: 5,
            days_since_prev_game: None,
        }
    }

    fn make_non_terminal(day: u32, home: &str, away: &str, half: HalfInning) -> PitchEvent {
        let mut event = make_pa(day, home, away, half, "strikeout");
        event.events = None;
        event
    }

    #[test]
    fn test_first_date_uses_default() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());
        let events = vec![make_pa(1, "NYY", "BOS", HalfInning::Top, "strikeout")];

        let rates = tracker.compute(&events, window(1, 30));
        let boston = rates.get(date(1), "BOS").unwrap();
        assert_eq!(boston.cum_plate_appearances, 0);
        assert_eq!(boston.k_pct_so_far, 0.055);
    }

    #[test]
    fn test_rates_use_prior_dates_only() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());

        let mut events = vec![
            // Day 1: BOS bats in the top, 1 K in 4 PA
            make_pa(1, "NYY", "BOS", HalfInning::Top, "strikeout"),
            make_pa(1, "NYY", "BOS", HalfInning::Top, "single"),
            make_pa(1, "NYY", "BOS", HalfInning::Top, "field_out"),
            make_pa(1, "NYY", "BOS", HalfInning::Top, "walk"),
            // Day 2: BOS at home bats in the bottom, 2 K in 2 PA
            make_pa(2, "BOS", "TOR", HalfInning::Bottom, "strikeout"),
            make_pa(2, "BOS", "TOR", HalfInning::Bottom, "strikeout"),
            // Day 4
            make_pa(4, "BOS", "TOR", HalfInning::Bottom, "single"),
        ];
        events.push(make_non_terminal(2, "BOS", "TOR", HalfInning::Bottom));

        let rates = tracker.compute(&events, window(1, 30));

        let day2 = rates.get(date(2), "BOS").unwrap();
        assert_eq!(day2.cum_strikeouts, 1);
        assert_eq!(day2.cum_plate_appearances, 4);
        assert!((day2.k_pct_so_far - 0.25).abs() < 1e-9);
        assert_eq!(day2.plate_appearances, 2);

        let day4 = rates.get(date(4), "BOS").unwrap();
        assert_eq!(day4.cum_strikeouts, 3);
        assert_eq!(day4.cum_plate_appearances, 6);
        assert!((day4.k_pct_so_far - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_same_day_results_do_not_leak() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());

        let base = vec![make_pa(1, "NYY", "BOS", HalfInning::Top, "single")];
        let mut with_day2 = base.clone();
        with_day2.push(make_pa(2, "NYY", "BOS", HalfInning::Top, "strikeout"));
        let mut with_more_day2 = with_day2.clone();
        with_more_day2.push(make_pa(2, "NYY", "BOS", HalfInning::Top, "strikeout"));

        let a = tracker.compute(&with_day2, window(1, 30));
        let b = tracker.compute(&with_more_day2, window(1, 30));
        assert_eq!(a.k_pct(date(2), "BOS"), b.k_pct(date(2), "BOS"));
        assert_eq!(a.k_pct(date(2), "BOS"), Some(0.0));
    }

    #[test]
    fn test_one_row_per_team_date_played() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());
        let events = vec![
            make_pa(1, "NYY", "BOS", HalfInning::Top, "single"),
            make_pa(1, "NYY", "BOS", HalfInning::Bottom, "single"),
            make_pa(1, "NYY", "BOS", HalfInning::Bottom, "strikeout"),
            make_pa(3, "NYY", "BOS", HalfInning::Top, "single"),
        ];

        let rates = tracker.compute(&events, window(1, 30));
        assert_eq!(rates.len(), 3);
        assert!(rates.get(date(1), "NYY").is_some());
        assert!(rates.get(date(1), "BOS").is_some());
        assert!(rates.get(date(3), "BOS").is_some());
        // NYY did not bat on day 3, no synthetic row
        assert!(rates.get(date(3), "NYY").is_none());
        assert!(rates.get(date(2), "BOS").is_none());
    }

    #[test]
    fn test_team_labels_normalized() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());
        let events = vec![
            make_pa(1, "NYY", "AZ", HalfInning::Top, "strikeout"),
            make_pa(2, "NYY", "Arizona Diamondbacks", HalfInning::Top, "single"),
        ];

        let rates = tracker.compute(&events, window(1, 30));
        assert!(rates.get(date(1), "AZ").is_none());
        let day2 = rates.get(date(2), "ARI").unwrap();
        // Both spellings accumulate into one history
        assert_eq!(day2.cum_strikeouts, 1);
        assert_eq!(day2.k_pct_so_far, 1.0);
    }

    #[test]
    fn test_window_filters_events() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());
        let events = vec![
            make_pa(1, "NYY", "BOS", HalfInning::Top, "strikeout"),
            make_pa(5, "NYY", "BOS", HalfInning::Top, "single"),
        ];

        let rates = tracker.compute(&events, window(2, 30));
        assert_eq!(rates.len(), 1);
        assert_eq!(rates.k_pct(date(5), "BOS"), Some(0.055));
    }

    #[test]
    fn test_custom_default() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig { default_k_pct: 0.21 });
        let events = vec![make_pa(1, "NYY", "BOS", HalfInning::Top, "single")];
        assert_eq!(tracker.compute(&events, window(1, 1)).k_pct(date(1), "BOS"), Some(0.21));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let teams = TeamNormalizer::new();
        let tracker = OpponentRateTracker::new(&teams, OpponentConfig::default());
        let err = tracker.compute_between(&[], date(10), date(1)).unwrap_err();
        assert!(matches!(err, StrikeoutError::InvalidWindow { .. }));

        let empty = tracker.compute_between(&[], date(1), date(10)).unwrap();
        assert!(empty.is_empty());
    }
}
