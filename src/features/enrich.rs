//! Final feature table assembly
//!
//! Joins each pitcher's game aggregates with opponent strikeout rates and
//! park factors, then attaches rolling form. Joins are left joins: a missing
//! opponent or park row leaves the field empty and never drops the game.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::games::{AggregationConfig, GameAggregate, GameAggregator};
use crate::features::opponent::{OpponentRateTracker, TeamDailyRates};
use crate::features::park::{build_park_factors, ParkFactors};
use crate::features::rolling::{RollingFeatureGenerator, RollingFeatures};
use crate::features::teams::TeamNormalizer;
use crate::{Config, DateWindow, PitchEvent, PitcherId, PitcherInfo, Result};

/// One row of the persisted feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedGameRecord {
    pub pitcher_name: String,
    pub pitcher_id: PitcherId,
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
    pub whiff_rate: f64,
    pub csw_pct: f64,
    pub whiff_rate_expanding: f64,
    pub csw_pct_expanding: f64,
    pub opponent_k_pct: Option<f64>,
    #[serde(rename = "park_factor_K")]
    pub park_factor_k: Option<f64>,
    #[serde(rename = "rolling_K_avg_3")]
    pub rolling_k_avg_3: f64,
    #[serde(rename = "rolling_K_avg_5")]
    pub rolling_k_avg_5: f64,
    pub rolling_pitch_count_5: f64,
    #[serde(rename = "rolling_K_rate")]
    pub rolling_k_rate: f64,
}

impl EnrichedGameRecord {
    fn assemble(
        pitcher: &PitcherInfo,
        game: GameAggregate,
        rolling: RollingFeatures,
        opponent_k_pct: Option<f64>,
        park_factor_k: Option<f64>,
    ) -> Self {
        EnrichedGameRecord {
            pitcher_name: pitcher.name.clone(),
            pitcher_id: pitcher.id,
            game_date: game.game_date,
            pitch_count: game.pitch_count,
            strikeouts: game.strikeouts,
            max_inning: game.max_inning,
            num_pitch_types: game.num_pitch_types,
            home_team: game.home_team,
            away_team: game.away_team,
            pitcher_team: game.pitcher_team,
            opponent_team: game.opponent_team,
            rest_days: game.rest_days,
            whiff_rate: game.whiff_rate,
            csw_pct: game.csw_pct,
            whiff_rate_expanding: game.whiff_rate_expanding,
            csw_pct_expanding: game.csw_pct_expanding,
            opponent_k_pct,
            park_factor_k,
            rolling_k_avg_3: rolling.rolling_k_avg_3,
            rolling_k_avg_5: rolling.rolling_k_avg_5,
            rolling_pitch_count_5: rolling.rolling_pitch_count_5,
            rolling_k_rate: rolling.rolling_k_rate,
        }
    }

    /// True when either enrichment join found no row
    pub fn has_join_miss(&self) -> bool {
        self.opponent_k_pct.is_none() || self.park_factor_k.is_none()
    }
}

/// Joins per-pitcher games with the shared league tables
///
/// The opponent and park tables are built once per run and only read here,
/// so one merger can serve many pitchers from several threads.
pub struct EnrichmentMerger<'a> {
    teams: &'a TeamNormalizer,
    opponent_rates: &'a TeamDailyRates,
    park_factors: &'a ParkFactors,
    aggregation: AggregationConfig,
    rolling: RollingFeatureGenerator,
}

impl<'a> EnrichmentMerger<'a> {
    pub fn new(
        teams: &'a TeamNormalizer,
        opponent_rates: &'a TeamDailyRates,
        park_factors: &'a ParkFactors,
        aggregation: AggregationConfig,
        rolling: RollingFeatureGenerator,
    ) -> Self {
        EnrichmentMerger {
            teams,
            opponent_rates,
            park_factors,
            aggregation,
            rolling,
        }
    }

    /// Feature rows for one pitcher, one per game date
    ///
    /// Events belonging to other pitchers are ignored.
    pub fn enrich(&self, pitcher: &PitcherInfo, events: &[PitchEvent]) -> Vec<EnrichedGameRecord> {
        let own: Vec<PitchEvent> = events
            .iter()
            .filter(|e| e.pitcher == pitcher.id)
            .cloned()
            .collect();
        let games = GameAggregator::new(self.teams, self.aggregation.clone()).aggregate_by_date(&own);
        self.merge(pitcher, &games)
    }

    /// Feature rows for every roster pitcher that has events
    pub fn enrich_roster(
        &self,
        roster: &[PitcherInfo],
        events: &[PitchEvent],
    ) -> Vec<EnrichedGameRecord> {
        let aggregator = GameAggregator::new(self.teams, self.aggregation.clone());
        let mut by_pitcher: BTreeMap<PitcherId, Vec<GameAggregate>> = BTreeMap::new();
        for game in aggregator.aggregate(events) {
            by_pitcher.entry(game.pitcher).or_default().push(game);
        }

        let mut records = Vec::new();
        let mut skipped = 0;
        for pitcher in roster {
            match by_pitcher.get(&pitcher.id) {
                Some(games) => records.extend(self.merge(pitcher, games)),
                None => {
                    log::warn!("No pitch events for {} ({}), skipping", pitcher.name, pitcher.id);
                    skipped += 1;
                }
            }
        }

        log::info!(
            "Enriched {} games for {} pitchers ({} skipped)",
            records.len(),
            roster.len() - skipped,
            skipped
        );
        records
    }

    fn merge(&self, pitcher: &PitcherInfo, games: &[GameAggregate]) -> Vec<EnrichedGameRecord> {
        self.rolling
            .generate(games)
            .into_iter()
            .map(|(game, rolling)| {
                let opponent_k_pct = self
                    .opponent_rates
                    .k_pct(game.game_date, &game.opponent_team);
                if opponent_k_pct.is_none() {
                    log::debug!(
                        "No opponent rate for {} on {} ({})",
                        game.opponent_team,
                        game.game_date,
                        pitcher.id
                    );
                }
                let park_factor_k = self.park_factors.get(&game.home_team);
                if park_factor_k.is_none() {
                    log::debug!("No park factor for {} ({})", game.home_team, pitcher.id);
                }
                EnrichedGameRecord::assemble(pitcher, game, rolling, opponent_k_pct, park_factor_k)
            })
            .collect()
    }
}

/// Run the whole pipeline for a roster over a league event stream
///
/// Only events inside `window` (or the span of `events` when None) are
/// used, for the league tables and the pitchers' own histories alike.
pub fn build_feature_table(
    config: &Config,
    teams: &TeamNormalizer,
    roster: &[PitcherInfo],
    events: &[PitchEvent],
    window: Option<DateWindow>,
) -> Result<Vec<EnrichedGameRecord>> {
    let window = match window.or_else(|| DateWindow::covering(events)) {
        Some(window) => window,
        None => {
            log::warn!("No pitch events to build features from");
            return Ok(Vec::new());
        }
    };

    let unknown = teams.warn_unknown(events);
    if unknown > 0 {
        log::info!("{} team labels left unnormalized", unknown);
    }

    let in_window: Vec<PitchEvent> = events
        .iter()
        .filter(|e| window.contains(e.game_date))
        .cloned()
        .collect();

    let opponent_rates =
        OpponentRateTracker::new(teams, config.opponent.clone()).compute(&in_window, window);
    let park_factors = build_park_factors(&config.park, &in_window, Some(window), teams)?;

    let merger = EnrichmentMerger::new(
        teams,
        &opponent_rates,
        &park_factors,
        config.aggregation.clone(),
        RollingFeatureGenerator::new(config.rolling.clone()),
    );
    Ok(merger.enrich_roster(roster, &in_window))
}
