//! Trailing-window pitcher form
//!
//! Rolling means over a pitcher's previous games. A game's own line never
//! enters its own window: features for game `i` are computed from games
//! `..i` only.

use serde::{Deserialize, Serialize};

use crate::features::games::GameAggregate;

/// Games in the short strikeout window
pub const SHORT_WINDOW: usize = 3;
/// Games in the long strikeout and pitch-count windows
pub const LONG_WINDOW: usize = 5;

/// Rolling feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Prior games needed before a window yields a value (capped at the window size)
    pub min_periods: usize,
    /// Fallback for strikeout averages
    pub default_strikeouts: f64,
    /// Fallback for pitch-count averages
    pub default_pitch_count: f64,
    /// Fallback for strikeouts per pitch
    pub default_k_rate: f64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig {
            min_periods: 3,
            default_strikeouts: 5.0,
            default_pitch_count: 85.0,
            default_k_rate: 0.055,
        }
    }
}

/// Rolling features for one game
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingFeatures {
    /// Mean strikeouts over the previous 3 games
    pub rolling_k_avg_3: f64,
    /// Mean strikeouts over the previous 5 games
    pub rolling_k_avg_5: f64,
    /// Mean pitch count over the previous 5 games
    pub rolling_pitch_count_5: f64,
    /// Strikeouts over the previous 3 games / pitches over the previous 5
    pub rolling_k_rate: f64,
}

/// Computes rolling features over each pitcher's game sequence
pub struct RollingFeatureGenerator {
    config: RollingConfig,
}

impl Default for RollingFeatureGenerator {
    fn default() -> Self {
        Self::new(RollingConfig::default())
    }
}

impl RollingFeatureGenerator {
    pub fn new(config: RollingConfig) -> Self {
        RollingFeatureGenerator { config }
    }

    /// Sort games by (pitcher, date) and attach rolling features to each
    ///
    /// Sorting happens here; callers may pass games in any order.
    pub fn generate(&self, games: &[GameAggregate]) -> Vec<(GameAggregate, RollingFeatures)> {
        let mut sorted = games.to_vec();
        sorted.sort_by_key(|g| (g.pitcher, g.game_date));

        let mut out = Vec::with_capacity(sorted.len());
        let mut start = 0;
        for i in 0..sorted.len() {
            if sorted[i].pitcher != sorted[start].pitcher {
                start = i;
            }
            let features = self.compute(&sorted[start..i]);
            out.push((sorted[i].clone(), features));
        }
        out
    }

    /// Features for the game that follows `prior` (chronological, one pitcher)
    pub fn compute(&self, prior: &[GameAggregate]) -> RollingFeatures {
        let short = self.window(prior, SHORT_WINDOW);
        let long = self.window(prior, LONG_WINDOW);

        let rolling_k_avg_3 = short
            .map(|w| mean(w, |g| g.strikeouts))
            .unwrap_or(self.config.default_strikeouts);
        let rolling_k_avg_5 = long
            .map(|w| mean(w, |g| g.strikeouts))
            .unwrap_or(self.config.default_strikeouts);
        let rolling_pitch_count_5 = long
            .map(|w| mean(w, |g| g.pitch_count))
            .unwrap_or(self.config.default_pitch_count);

        let rolling_k_rate = match (short, long) {
            (Some(short), Some(long)) => {
                let strikeouts = sum(short, |g| g.strikeouts);
                let pitches = sum(long, |g| g.pitch_count);
                let rate = strikeouts / pitches;
                if pitches > 0.0 && rate.is_finite() {
                    rate
                } else {
                    self.config.default_k_rate
                }
            }
            _ => self.config.default_k_rate,
        };

        RollingFeatures {
            rolling_k_avg_3,
            rolling_k_avg_5,
            rolling_pitch_count_5,
            rolling_k_rate,
        }
    }

    /// Trailing `size` games of `prior`, or None without enough history
    fn window<'g>(&self, prior: &'g [GameAggregate], size: usize) -> Option<&'g [GameAggregate]> {
        let required = self.config.min_periods.clamp(1, size);
        if prior.len() < required {
            return None;
        }
        Some(&prior[prior.len().saturating_sub(size)..])
    }
}

fn sum(window: &[GameAggregate], value: impl Fn(&GameAggregate) -> u32) -> f64 {
    window.iter().map(|g| value(g) as f64).sum()
}

fn mean(window: &[GameAggregate], value: impl Fn(&GameAggregate) -> u32) -> f64 {
    sum(window, value) / window.len() as f64
}
