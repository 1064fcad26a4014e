//! Feature pipeline stages
//!
//! Team normalization, game aggregation, rolling form, opponent rates,
//! park factors and the final enrichment join.

pub mod enrich;
pub mod games;
pub mod opponent;
pub mod park;
pub mod rolling;
pub mod teams;

pub use enrich::{build_feature_table, EnrichedGameRecord, EnrichmentMerger};
pub use games::{GameAggregate, GameAggregator};
pub use opponent::{OpponentRateTracker, TeamDailyRate, TeamDailyRates};
pub use park::{ComputedParkFactors, ParkFactorSource, ParkFactors, StaticParkFactors};
pub use rolling::{RollingFeatureGenerator, RollingFeatures};
pub use teams::TeamNormalizer;
