//! Shared fixtures for unit tests

use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::Classifier;
use crate::{MatchRecord, Outcome, PredictorError, Result, Venue};

fn outcome_of(goals_for: u32, goals_against: u32) -> Outcome {
    match goals_for.cmp(&goals_against) {
        std::cmp::Ordering::Greater => Outcome::Win,
        std::cmp::Ordering::Less => Outcome::Loss,
        std::cmp::Ordering::Equal => Outcome::Draw,
    }
}

/// A record for `team` in week `week` of the 2021/22 season
pub fn record(team: &str, week: i64, goals_for: u32, goals_against: u32) -> MatchRecord {
    let start = NaiveDate::from_ymd_opt(2021, 8, 7).unwrap();
    MatchRecord {
        date: start + Duration::days(7 * week),
        team: team.to_string(),
        goals_for,
        goals_against,
        shots: 10 + goals_for,
        shots_on_target: 3 + goals_for,
        distance: Some(17.5),
        free_kicks: 1,
        penalties: 0,
        penalty_attempts: 0,
        venue: if week % 2 == 0 { Venue::Home } else { Venue::Away },
        opponent: format!("Opponent {}", week % 5),
        opponent_code: week % 5,
        hour: Some(15),
        day_of_week: Some(5),
        outcome: outcome_of(goals_for, goals_against),
    }
}

/// A weekly league of `teams` sides starting on `start`. Stronger teams
/// (higher index) score more, so outcomes are learnable.
pub fn synthetic_league(teams: usize, weeks: i64, start: NaiveDate) -> Vec<MatchRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let names: Vec<String> = (0..teams).map(|t| format!("Team {:02}", t)).collect();
    let mut records = Vec::new();

    for week in 0..weeks {
        let date = start + Duration::days(7 * week);
        // Rotate pairings each week
        let shift = (week as usize) % (teams - 1) + 1;
        let mut paired = vec![false; teams];
        for home in 0..teams {
            if paired[home] {
                continue;
            }
            let mut away = (home + shift) % teams;
            while paired[away] || away == home {
                away = (away + 1) % teams;
            }
            paired[home] = true;
            paired[away] = true;

            let home_goals = rng.gen_range(0..2) + (home as u32 * 3) / teams as u32;
            let away_goals = rng.gen_range(0..2) + (away as u32 * 3) / teams as u32;

            for (team, opponent, gf, ga, venue) in [
                (home, away, home_goals, away_goals, Venue::Home),
                (away, home, away_goals, home_goals, Venue::Away),
            ] {
                let shots = 6 + gf * 3 + rng.gen_range(0..4);
                records.push(MatchRecord {
                    date,
                    team: names[team].clone(),
                    goals_for: gf,
                    goals_against: ga,
                    shots,
                    shots_on_target: (gf + rng.gen_range(0..3)).min(shots),
                    distance: Some(15.0 + rng.gen_range(0.0..5.0)),
                    free_kicks: rng.gen_range(0..3),
                    penalties: 0,
                    penalty_attempts: 0,
                    venue,
                    opponent: names[opponent].clone(),
                    opponent_code: opponent as i64,
                    hour: Some(15),
                    day_of_week: Some(5),
                    outcome: outcome_of(gf, ga),
                });
            }
        }
    }

    records
}

/// Predicts the same distribution for every row
#[derive(Debug, Clone)]
pub struct ConstantClassifier {
    pub proba: Vec<f64>,
    pub probabilities: bool,
}

impl ConstantClassifier {
    pub fn new(proba: Vec<f64>) -> Self {
        Self {
            proba,
            probabilities: true,
        }
    }
}

impl Classifier for ConstantClassifier {
    fn fit(&mut self, _features: &[Vec<f64>], _labels: &[usize], _n_classes: usize) -> Result<()> {
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        Ok(vec![self.proba.clone(); features.len()])
    }

    fn supports_probabilities(&self) -> bool {
        self.probabilities
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

/// Always fails to fit
#[derive(Debug, Clone)]
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn fit(&mut self, _features: &[Vec<f64>], _labels: &[usize], _n_classes: usize) -> Result<()> {
        Err(PredictorError::Training(
            "solver failed to converge: matrix is singular after regularisation".to_string(),
        ))
    }

    fn predict_proba(&self, _features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        Err(PredictorError::Training("not fitted".to_string()))
    }

    fn unfitted(&self) -> Box<dyn Classifier> {
        Box::new(FailingClassifier)
    }
}
