//! Game-level aggregation
//!
//! Collapses pitch events into one record per (pitcher, game date) with
//! counting stats, in-game rates and career-to-date expanding rates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::features::teams::TeamNormalizer;
use crate::{PitchEvent, PitcherId};

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Rest days assumed when the feed has no prior appearance
    pub default_rest_days: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            default_rest_days: 5,
        }
    }
}

/// One pitcher's line for one game
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameAggregate {
    pub pitcher: PitcherId,
    pub game_date: NaiveDate,
    pub pitch_count: u32,
    pub strikeouts: u32,
    pub max_inning: u8,
    pub num_pitch_types: u32,
    pub home_team: String,
    pub away_team: String,
    pub pitcher_team: String,
    pub opponent_team: String,
    pub rest_days: u32,
    pub whiff_count: u32,
    pub swing_count: u32,
    pub called_count: u32,
    /// Whiffs per swing in this game (descriptive, not leakage-safe)
    pub whiff_rate: f64,
    /// (called strikes + whiffs) per pitch in this game (descriptive)
    pub csw_pct: f64,
    /// Whiffs per pitch over all earlier games
    pub whiff_rate_expanding: f64,
    /// (called strikes + whiffs) per pitch over all earlier games
    pub csw_pct_expanding: f64,
}

/// Running counts for one group of pitches
struct GameTally<'a> {
    /// First row of the group in input order, source of game metadata
    first: &'a PitchEvent,
    pitch_count: u32,
    strikeouts: u32,
    max_inning: u8,
    pitch_types: BTreeSet<&'a str>,
    whiffs: u32,
    swings: u32,
    called: u32,
}

impl<'a> GameTally<'a> {
    fn new(first: &'a PitchEvent) -> Self {
        GameTally {
            first,
            pitch_count: 0,
            strikeouts: 0,
            max_inning: 0,
            pitch_types: BTreeSet::new(),
            whiffs: 0,
            swings: 0,
            called: 0,
        }
    }

    fn add(&mut self, event: &'a PitchEvent) {
        self.pitch_count += 1;
        if event.is_strikeout() {
            self.strikeouts += 1;
        }
        self.max_inning = self.max_inning.max(event.inning);
        if let Some(pitch_type) = event.pitch_type.as_deref().filter(|p| !p.is_empty()) {
            self.pitch_types.insert(pitch_type);
        }
        if event.is_whiff() {
            self.whiffs += 1;
        }
        if event.is_swing() {
            self.swings += 1;
        }
        if event.is_called_strike() {
            self.called += 1;
        }
    }
}

/// Career-to-date counts carried across a pitcher's games
#[derive(Default)]
struct Cumulative {
    whiffs: u64,
    called: u64,
    pitches: u64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Builds game aggregates from pitch events
pub struct GameAggregator<'a> {
    teams: &'a TeamNormalizer,
    config: AggregationConfig,
}

impl<'a> GameAggregator<'a> {
    pub fn new(teams: &'a TeamNormalizer, config: AggregationConfig) -> Self {
        GameAggregator { teams, config }
    }

    /// Group by (pitcher, game date); output ordered by pitcher then date
    pub fn aggregate(&self, events: &[PitchEvent]) -> Vec<GameAggregate> {
        let mut by_pitcher: BTreeMap<PitcherId, BTreeMap<NaiveDate, GameTally>> = BTreeMap::new();
        for event in events {
            by_pitcher
                .entry(event.pitcher)
                .or_default()
                .entry(event.game_date)
                .or_insert_with(|| GameTally::new(event))
                .add(event);
        }

        let mut games = Vec::new();
        for tallies in by_pitcher.into_values() {
            games.extend(self.finish_stream(tallies.into_values()));
        }

        log::debug!("Aggregated {} pitches into {} games", events.len(), games.len());
        games
    }

    /// Group by game date alone, for a stream already filtered to one pitcher
    pub fn aggregate_by_date(&self, events: &[PitchEvent]) -> Vec<GameAggregate> {
        let mut by_date: BTreeMap<NaiveDate, GameTally> = BTreeMap::new();
        for event in events {
            by_date
                .entry(event.game_date)
                .or_insert_with(|| GameTally::new(event))
                .add(event);
        }
        self.finish_stream(by_date.into_values())
    }

    /// Turn one pitcher's chronologically ordered tallies into aggregates
    fn finish_stream<'e>(&self, tallies: impl Iterator<Item = GameTally<'e>>) -> Vec<GameAggregate> {
        let mut cumulative = Cumulative::default();
        let mut games = Vec::new();

        for tally in tallies {
            // Expanding rates read the running totals BEFORE this game is added
            let whiff_rate_expanding = ratio(cumulative.whiffs, cumulative.pitches);
            let csw_pct_expanding =
                ratio(cumulative.whiffs + cumulative.called, cumulative.pitches);

            cumulative.whiffs += tally.whiffs as u64;
            cumulative.called += tally.called as u64;
            cumulative.pitches += tally.pitch_count as u64;

            games.push(self.build(&tally, whiff_rate_expanding, csw_pct_expanding));
        }

        games
    }

    fn build(
        &self,
        tally: &GameTally,
        whiff_rate_expanding: f64,
        csw_pct_expanding: f64,
    ) -> GameAggregate {
        let first = tally.first;
        let rest_days = first
            .days_since_prev_game
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u32)
            .unwrap_or(self.config.default_rest_days);

        GameAggregate {
            pitcher: first.pitcher,
            game_date: first.game_date,
            pitch_count: tally.pitch_count,
            strikeouts: tally.strikeouts,
            max_inning: tally.max_inning,
            num_pitch_types: tally.pitch_types.len() as u32,
            home_team: self.teams.normalize(&first.home_team),
            away_team: self.teams.normalize(&first.away_team),
            pitcher_team: self.teams.normalize(first.pitching_team()),
            opponent_team: self.teams.normalize(first.batting_team()),
            rest_days,
            whiff_count: tally.whiffs,
            swing_count: tally.swings,
            called_count: tally.called,
            whiff_rate: ratio(tally.whiffs as u64, tally.swings as u64),
            csw_pct: ratio((tally.whiffs + tally.called) as u64, tally.pitch_count as u64),
            whiff_rate_expanding,
            csw_pct_expanding,
        }
    }
}
