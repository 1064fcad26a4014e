//! Park strikeout factors
//!
//! How much each home park inflates or deflates strikeout rate relative to
//! the league. Either loaded from a published table or computed from the
//! event stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::data::loader;
use crate::features::teams::TeamNormalizer;
use crate::{DateWindow, PitchEvent, Result, StrikeoutError};

/// Where park factors come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParkSource {
    Computed,
    Static,
}

/// Layout of a static park table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParkTableFormat {
    /// `Team`, `SO` with 100 = league average
    Percent,
    /// `Team_abbr`, `K_park_factor` with 1.0 = league average
    Factor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkConfig {
    pub source: ParkSource,
    pub static_table: Option<String>,
    pub table_format: ParkTableFormat,
}

impl Default for ParkConfig {
    fn default() -> Self {
        ParkConfig {
            source: ParkSource::Computed,
            static_table: None,
            table_format: ParkTableFormat::Percent,
        }
    }
}

/// Row of a percent-style park table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkIndexRow {
    #[serde(rename = "Team")]
    pub team: String,
    #[serde(rename = "SO")]
    pub so_index: f64,
}

/// One park's strikeout factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkFactor {
    #[serde(rename = "Team_abbr")]
    pub team: String,
    #[serde(rename = "K_park_factor")]
    pub k_park_factor: f64,
}

/// Park factors keyed by canonical team code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParkFactors {
    factors: BTreeMap<String, f64>,
}

impl ParkFactors {
    pub fn get(&self, team: &str) -> Option<f64> {
        self.factors.get(team).copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Rows in team order, ready to persist
    pub fn to_rows(&self) -> Vec<ParkFactor> {
        self.factors
            .iter()
            .map(|(team, &k_park_factor)| ParkFactor {
                team: team.clone(),
                k_park_factor,
            })
            .collect()
    }

    fn insert(&mut self, team: String, factor: f64) {
        if let Some(previous) = self.factors.insert(team.clone(), factor) {
            log::debug!("Park factor for {} replaced ({} -> {})", team, previous, factor);
        }
    }
}

/// A strategy for producing park factors
pub trait ParkFactorSource {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// One factor per canonical team code
    fn park_factors(&self) -> Result<ParkFactors>;
}

/// Factors from a published table
pub struct StaticParkFactors {
    factors: ParkFactors,
}

impl StaticParkFactors {
    /// From a percent table, converting 105 -> 1.05
    pub fn from_percent_rows(rows: &[ParkIndexRow], teams: &TeamNormalizer) -> Self {
        let mut factors = ParkFactors::default();
        for row in rows {
            factors.insert(teams.normalize(&row.team), row.so_index / 100.0);
        }
        StaticParkFactors { factors }
    }

    /// From a table that already holds factors
    pub fn from_factor_rows(rows: &[ParkFactor], teams: &TeamNormalizer) -> Self {
        let mut factors = ParkFactors::default();
        for row in rows {
            factors.insert(teams.normalize(&row.team), row.k_park_factor);
        }
        StaticParkFactors { factors }
    }

    /// Read a table from disk
    pub fn load<P: AsRef<Path>>(
        path: P,
        format: ParkTableFormat,
        teams: &TeamNormalizer,
    ) -> Result<Self> {
        Ok(match format {
            ParkTableFormat::Percent => {
                Self::from_percent_rows(&loader::read_park_index_table(path)?, teams)
            }
            ParkTableFormat::Factor => {
                Self::from_factor_rows(&loader::read_park_factor_table(path)?, teams)
            }
        })
    }
}

impl ParkFactorSource for StaticParkFactors {
    fn name(&self) -> &'static str {
        "static table"
    }

    fn park_factors(&self) -> Result<ParkFactors> {
        Ok(self.factors.clone())
    }
}

/// Factors computed as (home strikeout rate) / (league strikeout rate)
pub struct ComputedParkFactors<'a> {
    events: &'a [PitchEvent],
    window: Option<DateWindow>,
    teams: &'a TeamNormalizer,
}

impl<'a> ComputedParkFactors<'a> {
    pub fn new(events: &'a [PitchEvent], teams: &'a TeamNormalizer) -> Self {
        ComputedParkFactors {
            events,
            window: None,
            teams,
        }
    }

    /// Only count events inside `window`
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }
}

impl ParkFactorSource for ComputedParkFactors<'_> {
    fn name(&self) -> &'static str {
        "computed"
    }

    fn park_factors(&self) -> Result<ParkFactors> {
        // home team -> (strikeouts, plate appearances)
        let mut by_park: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        let (mut league_so, mut league_pa) = (0u64, 0u64);

        let in_window = |e: &&PitchEvent| self.window.map_or(true, |w| w.contains(e.game_date));
        for event in self.events.iter().filter(in_window) {
            let entry = by_park
                .entry(self.teams.normalize(&event.home_team))
                .or_insert((0, 0));
            if event.is_strikeout() {
                entry.0 += 1;
                league_so += 1;
            }
            if event.is_plate_appearance() {
                entry.1 += 1;
                league_pa += 1;
            }
        }

        let mut factors = ParkFactors::default();
        if league_pa == 0 {
            return Ok(factors);
        }
        let league_rate = league_so as f64 / league_pa as f64;

        for (team, (so, pa)) in by_park {
            if pa == 0 {
                log::debug!("No plate appearances at {}, park factor omitted", team);
                continue;
            }
            let factor = if league_rate == 0.0 {
                1.0
            } else {
                (so as f64 / pa as f64) / league_rate
            };
            factors.insert(team, factor);
        }

        Ok(factors)
    }
}

/// Build the configured park factor table
pub fn build_park_factors(
    config: &ParkConfig,
    events: &[PitchEvent],
    window: Option<DateWindow>,
    teams: &TeamNormalizer,
) -> Result<ParkFactors> {
    let source: Box<dyn ParkFactorSource + '_> = match config.source {
        ParkSource::Computed => {
            let computed = ComputedParkFactors::new(events, teams);
            Box::new(match window {
                Some(w) => computed.with_window(w),
                None => computed,
            })
        }
        ParkSource::Static => {
            let path = config.static_table.as_deref().ok_or_else(|| {
                StrikeoutError::Config("park.source = \"static\" requires park.static_table".to_string())
            })?;
            Box::new(StaticParkFactors::load(path, config.table_format, teams)?)
        }
    };

    let factors = source.park_factors()?;
    log::info!("Loaded {} park factors ({})", factors.len(), source.name());
    Ok(factors)
}
