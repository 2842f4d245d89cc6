//! Feature extraction
//!
//! Converts raw match data into model-ready features.

pub mod rolling;
pub mod team_stats;

pub use rolling::{FeatureBuilder, FeatureRow, RollingMeans};
pub use team_stats::{TeamStatistics, TeamStatisticsComputer};
