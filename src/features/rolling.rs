//! Rolling team form features
//!
//! Each row summarises the matches a team played *before* the fixture it
//! describes, so the fixture's own result never leaks into its predictors.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::{FeatureConfig, MatchRecord, Outcome, Venue};

/// Trailing means of the raw per-match statistics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RollingMeans {
    pub goals_for: f64,
    pub goals_against: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub distance: f64,
    pub free_kicks: f64,
    pub penalties: f64,
    pub penalty_attempts: f64,
}

impl RollingMeans {
    /// Average a complete window. Returns None if any match in the window
    /// lacks a distance value.
    pub fn from_window(window: &[&MatchRecord]) -> Option<Self> {
        if window.is_empty() {
            return None;
        }

        let mut sums = RollingMeans::default();
        for m in window {
            sums.goals_for += m.goals_for as f64;
            sums.goals_against += m.goals_against as f64;
            sums.shots += m.shots as f64;
            sums.shots_on_target += m.shots_on_target as f64;
            sums.distance += m.distance?;
            sums.free_kicks += m.free_kicks as f64;
            sums.penalties += m.penalties as f64;
            sums.penalty_attempts += m.penalty_attempts as f64;
        }

        let n = window.len() as f64;
        Some(RollingMeans {
            goals_for: sums.goals_for / n,
            goals_against: sums.goals_against / n,
            shots: sums.shots / n,
            shots_on_target: sums.shots_on_target / n,
            distance: sums.distance / n,
            free_kicks: sums.free_kicks / n,
            penalties: sums.penalties / n,
            penalty_attempts: sums.penalty_attempts / n,
        })
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.goals_for,
            self.goals_against,
            self.shots,
            self.shots_on_target,
            self.distance,
            self.free_kicks,
            self.penalties,
            self.penalty_attempts,
        ]
    }
}

/// Model-ready features for one team in one fixture
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub team: String,
    pub venue: Venue,
    pub opponent_code: i64,
    pub hour: Option<u8>,
    pub day_of_week: Option<u8>,
    pub rolling: RollingMeans,
    /// goals_for - goals_against over the window
    pub goal_diff_rolling: f64,
    /// shots_on_target / (shots + epsilon) over the window
    pub shot_accuracy_rolling: f64,
    /// Outcome of this fixture. Target only, never a predictor.
    pub outcome: Outcome,
}

impl FeatureRow {
    /// Number of predictor columns
    pub const DIM: usize = 14;

    /// Predictor column names, in the order of [`FeatureRow::predictors`]
    pub const COLUMNS: [&'static str; Self::DIM] = [
        "home_away",
        "opponent_code",
        "hour",
        "day_of_week",
        "gf_rolling",
        "ga_rolling",
        "sh_rolling",
        "sot_rolling",
        "dist_rolling",
        "fk_rolling",
        "pk_rolling",
        "pkatt_rolling",
        "goal_diff_rolling",
        "shot_accuracy_rolling",
    ];

    /// Predictor values. Missing context values stay None until the
    /// splitter fills them.
    pub fn predictors(&self) -> [Option<f64>; Self::DIM] {
        let r = &self.rolling;
        [
            Some(self.venue.code()),
            Some(self.opponent_code as f64),
            self.hour.map(f64::from),
            self.day_of_week.map(f64::from),
            Some(r.goals_for),
            Some(r.goals_against),
            Some(r.shots),
            Some(r.shots_on_target),
            Some(r.distance),
            Some(r.free_kicks),
            Some(r.penalties),
            Some(r.penalty_attempts),
            Some(self.goal_diff_rolling),
            Some(self.shot_accuracy_rolling),
        ]
    }
}

/// Builds rolling feature rows from raw match records
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    window: usize,
    shot_accuracy_epsilon: f64,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        FeatureBuilder {
            window: 3,
            shot_accuracy_epsilon: 0.1,
        }
    }
}

impl FeatureBuilder {
    pub fn new(window: usize, shot_accuracy_epsilon: f64) -> Self {
        FeatureBuilder {
            window: window.max(1),
            shot_accuracy_epsilon,
        }
    }

    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(config.window, config.shot_accuracy_epsilon)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Build feature rows for every team.
    ///
    /// Records may arrive in any order. Teams are visited in name order so
    /// the output is deterministic for a given input set.
    pub fn build(&self, records: &[MatchRecord]) -> Vec<FeatureRow> {
        let mut by_team: BTreeMap<&str, Vec<&MatchRecord>> = BTreeMap::new();
        for record in records {
            by_team.entry(record.team.as_str()).or_default().push(record);
        }

        let mut rows = Vec::new();
        for (team, mut history) in by_team {
            history.sort_by_key(|m| m.date);
            let before = rows.len();
            self.build_team(&history, &mut rows);
            log::debug!(
                "{}: {} matches -> {} feature rows",
                team,
                history.len(),
                rows.len() - before
            );
        }

        rows
    }

    /// Rows for one team's date-ordered history. Match `i` is described by
    /// matches `i - window .. i`.
    fn build_team(&self, history: &[&MatchRecord], rows: &mut Vec<FeatureRow>) {
        for i in self.window..history.len() {
            let current = history[i];
            let Some(rolling) = RollingMeans::from_window(&history[i - self.window..i]) else {
                log::debug!(
                    "Dropping {} on {}: incomplete window",
                    current.team,
                    current.date
                );
                continue;
            };

            rows.push(FeatureRow {
                date: current.date,
                team: current.team.clone(),
                venue: current.venue,
                opponent_code: current.opponent_code,
                hour: current.hour,
                day_of_week: current.day_of_week,
                rolling,
                goal_diff_rolling: rolling.goals_for - rolling.goals_against,
                shot_accuracy_rolling: rolling.shots_on_target
                    / (rolling.shots + self.shot_accuracy_epsilon),
                outcome: current.outcome,
            });
        }
    }
}
