//! Football match outcome prediction
//!
//! Rolling team features, date-based train/test splits and a comparison of
//! classifiers (random forest, gradient boosting, logistic regression and a
//! soft-voting ensemble) for predicting win/draw/loss.

pub mod data;
pub mod features;
pub mod model;
pub mod report;
pub mod training;

#[cfg(test)]
pub(crate) mod testing;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::training::registry::ModelSpec;

/// Whether the team played at home or away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    /// Numeric code used as a model input (home = 1, away = 0)
    pub fn code(&self) -> f64 {
        match self {
            Venue::Home => 1.0,
            Venue::Away => 0.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "home" | "h" => Some(Venue::Home),
            "away" | "a" => Some(Venue::Away),
            _ => None,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Home => write!(f, "Home"),
            Venue::Away => write!(f, "Away"),
        }
    }
}

/// Match outcome from the team's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    Loss,
    Draw,
    Win,
}

impl Outcome {
    /// Three-way class index (loss = 0, draw = 1, win = 2)
    pub fn code(&self) -> usize {
        match self {
            Outcome::Loss => 0,
            Outcome::Draw => 1,
            Outcome::Win => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Outcome::Loss),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Win),
            _ => None,
        }
    }

    /// Parse a result letter ("W", "D", "L")
    pub fn from_result(result: &str) -> Option<Self> {
        match result.trim().to_uppercase().as_str() {
            "W" => Some(Outcome::Win),
            "D" => Some(Outcome::Draw),
            "L" => Some(Outcome::Loss),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }
}

/// How outcomes are turned into class labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelMode {
    /// Win / draw / loss
    ThreeWay,
    /// Win vs not-win
    Binary,
}

impl LabelMode {
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            LabelMode::Binary
        } else {
            LabelMode::ThreeWay
        }
    }

    /// Number of classes a model must produce probabilities for
    pub fn n_classes(&self) -> usize {
        match self {
            LabelMode::ThreeWay => 3,
            LabelMode::Binary => 2,
        }
    }

    /// Class label for an outcome under this mode
    pub fn label(&self, outcome: Outcome) -> usize {
        match self {
            LabelMode::ThreeWay => outcome.code(),
            LabelMode::Binary => usize::from(outcome == Outcome::Win),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            LabelMode::ThreeWay => "three-class (Win/Draw/Loss)",
            LabelMode::Binary => "binary (Win vs Not-Win)",
        }
    }
}

impl fmt::Display for LabelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelMode::ThreeWay => write!(f, "3-CLASS (Win vs Draw vs Loss)"),
            LabelMode::Binary => write!(f, "BINARY (Win vs Not-Win)"),
        }
    }
}

/// One team's statistics for one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub team: String,
    pub goals_for: u32,
    pub goals_against: u32,
    pub shots: u32,
    pub shots_on_target: u32,
    /// Average shot distance, missing when the source has no value
    pub distance: Option<f64>,
    pub free_kicks: u32,
    pub penalties: u32,
    pub penalty_attempts: u32,
    pub venue: Venue,
    pub opponent: String,
    /// Position of `opponent` among the sorted opponent names of the
    /// collection the record was loaded from
    pub opponent_code: i64,
    /// Kickoff hour (0-23)
    pub hour: Option<u8>,
    /// Day of week, Monday = 0
    pub day_of_week: Option<u8>,
    pub outcome: Outcome,
}

impl MatchRecord {
    pub fn goal_difference(&self) -> i64 {
        self.goals_for as i64 - self.goals_against as i64
    }
}

/// Categorical opponent codes: each distinct name maps to its position in
/// alphabetical order
pub fn opponent_codes<'a, I>(names: I) -> BTreeMap<String, i64>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(code, name)| (name.to_string(), code as i64))
        .collect()
}

/// Recode `records` against a code table. Names missing from the table
/// get -1.
pub fn apply_opponent_codes(records: &mut [MatchRecord], codes: &BTreeMap<String, i64>) {
    for record in records {
        record.opponent_code = codes.get(&record.opponent).copied().unwrap_or(-1);
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("No match data available. Import data first.")]
    EmptyInput,

    #[error("No data: {0}")]
    NoData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model type {0} is not available in this build")]
    ModelUnavailable(String),

    #[error("{model} failed: {message}")]
    ModelFit { model: String, message: String },

    #[error("Ensemble construction failed: {0}")]
    EnsembleConstruction(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, PredictorError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub training: TrainingConfig,
    /// Candidate models, compared in this order
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Number of preceding matches averaged into each feature row
    pub window: usize,
    /// Added to the shots denominator of shot accuracy
    pub shot_accuracy_epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// First date of the test period
    pub cutoff: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Model used by `train` (must name an entry in `models`)
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/football.db".to_string(),
            },
            features: FeatureConfig {
                window: 3,
                shot_accuracy_epsilon: 0.1,
            },
            split: SplitConfig {
                cutoff: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            },
            training: TrainingConfig {
                model: "RandomForest".to_string(),
            },
            models: ModelSpec::defaults(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PredictorError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PredictorError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PredictorError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
