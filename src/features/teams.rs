//! Team label normalization
//!
//! Maps the many spellings of a club (feed abbreviations, FanGraphs codes,
//! nicknames, full names and pre-rename names) onto one canonical code.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::PitchEvent;

/// Canonical code and the labels that resolve to it
const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("ARI", &["AZ", "Diamondbacks", "D-backs", "Arizona Diamondbacks"]),
    ("ATL", &["Braves", "Atlanta Braves"]),
    ("BAL", &["Orioles", "Baltimore Orioles"]),
    ("BOS", &["Red Sox", "Boston Red Sox"]),
    ("CHC", &["Cubs", "Chicago Cubs"]),
    ("CHW", &["CWS", "White Sox", "Chicago White Sox"]),
    ("CIN", &["Reds", "Cincinnati Reds"]),
    (
        "CLE",
        &["Cleveland", "Guardians", "Cleveland Guardians", "Indians", "Cleveland Indians"],
    ),
    ("COL", &["Rockies", "Colorado Rockies"]),
    ("DET", &["Tigers", "Detroit Tigers"]),
    ("HOU", &["Astros", "Houston Astros"]),
    ("KC", &["KCR", "Royals", "Kansas City Royals"]),
    (
        "LAA",
        &["ANA", "Angels", "Los Angeles Angels", "Anaheim Angels", "Los Angeles Angels of Anaheim"],
    ),
    ("LAD", &["Dodgers", "Los Angeles Dodgers"]),
    ("MIA", &["FLA", "Marlins", "Miami Marlins", "Florida Marlins"]),
    ("MIL", &["Brewers", "Milwaukee Brewers"]),
    ("MIN", &["Twins", "Minnesota Twins"]),
    ("NYM", &["Mets", "New York Mets"]),
    ("NYY", &["Yankees", "New York Yankees"]),
    ("ATH", &["OAK", "Athletics", "A's", "Oakland Athletics"]),
    ("PHI", &["Phillies", "Philadelphia Phillies"]),
    ("PIT", &["Pirates", "Pittsburgh Pirates"]),
    ("SD", &["SDP", "Padres", "San Diego Padres"]),
    ("SF", &["SFG", "Giants", "San Francisco Giants"]),
    ("SEA", &["Mariners", "Seattle Mariners"]),
    ("STL", &["Cardinals", "St. Louis Cardinals"]),
    ("TB", &["TBR", "TBD", "Rays", "Tampa Bay Rays", "Devil Rays", "Tampa Bay Devil Rays"]),
    ("TEX", &["Rangers", "Texas Rangers"]),
    ("TOR", &["Blue Jays", "Toronto Blue Jays"]),
    ("WSH", &["WSN", "WAS", "Nationals", "Washington Nationals"]),
];

/// Extra aliases from config, merged over the built-in table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamAliasConfig {
    /// label -> canonical code
    pub aliases: BTreeMap<String, String>,
}

/// Resolves team labels to canonical codes
///
/// Unknown labels pass through unchanged so that joins degrade to misses
/// instead of aborting a run.
#[derive(Debug, Clone)]
pub struct TeamNormalizer {
    /// lowercase label -> canonical code
    aliases: HashMap<String, String>,
}

impl Default for TeamNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamNormalizer {
    /// Normalizer with the built-in MLB alias table
    pub fn new() -> Self {
        let mut normalizer = TeamNormalizer {
            aliases: HashMap::new(),
        };
        for (canonical, labels) in DEFAULT_ALIASES {
            normalizer.add_alias(canonical, canonical);
            for label in labels.iter() {
                normalizer.add_alias(label, canonical);
            }
        }
        normalizer
    }

    /// Built-in table plus configured aliases
    pub fn from_config(config: &TeamAliasConfig) -> Self {
        let mut normalizer = Self::new();
        for (label, canonical) in &config.aliases {
            normalizer.add_alias(label, canonical);
        }
        normalizer
    }

    /// Register a label; the canonical code also resolves to itself
    pub fn add_alias(&mut self, label: &str, canonical: &str) {
        let canonical = canonical.trim().to_string();
        self.aliases
            .insert(Self::key(&canonical), canonical.clone());
        self.aliases.insert(Self::key(label), canonical);
    }

    pub fn with_alias(mut self, label: &str, canonical: &str) -> Self {
        self.add_alias(label, canonical);
        self
    }

    fn key(label: &str) -> String {
        label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }

    /// Canonical code for a label, if known
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.aliases.get(&Self::key(label)).map(String::as_str)
    }

    pub fn is_known(&self, label: &str) -> bool {
        self.resolve(label).is_some()
    }

    /// Canonical code, or the label unchanged when unknown
    pub fn normalize(&self, label: &str) -> String {
        self.resolve(label)
            .map(str::to_string)
            .unwrap_or_else(|| label.to_string())
    }

    /// Team labels in an event stream that do not resolve
    pub fn unknown_labels(&self, events: &[PitchEvent]) -> BTreeSet<String> {
        events
            .iter()
            .flat_map(|e| [e.home_team.as_str(), e.away_team.as_str()])
            .filter(|label| !self.is_known(label))
            .map(str::to_string)
            .collect()
    }

    /// Log each unknown label once
    pub fn warn_unknown(&self, events: &[PitchEvent]) -> usize {
        let unknown = self.unknown_labels(events);
        for label in &unknown {
            log::warn!("Unrecognised team label '{}' passed through unchanged", label);
        }
        unknown.len()
    }
}
