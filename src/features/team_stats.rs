//! Team statistics computation
//!
//! Season summaries for a team based on its match history.

use crate::{MatchRecord, Outcome, Venue};
use std::collections::{HashMap, VecDeque};

/// Number of results kept for the form guide
const FORM_LENGTH: usize = 5;

/// Summary statistics for a team
#[derive(Debug, Clone, Default)]
pub struct TeamStatistics {
    /// Total matches played
    pub matches_played: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    /// Total goals scored
    pub goals_for: u32,
    /// Total goals conceded
    pub goals_against: u32,
    pub home_wins: usize,
    pub home_matches: usize,
    /// Most recent results, oldest first
    pub form: VecDeque<Outcome>,
}

impl TeamStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update statistics with a match result. Records must be applied in
    /// date order for the form guide to be meaningful.
    pub fn update(&mut self, record: &MatchRecord) {
        self.matches_played += 1;
        self.goals_for += record.goals_for;
        self.goals_against += record.goals_against;

        if record.venue == Venue::Home {
            self.home_matches += 1;
        }

        match record.outcome {
            Outcome::Win => {
                self.wins += 1;
                if record.venue == Venue::Home {
                    self.home_wins += 1;
                }
            }
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }

        self.form.push_back(record.outcome);
        if self.form.len() > FORM_LENGTH {
            self.form.pop_front();
        }
    }

    /// Win ratio (0-1)
    pub fn win_ratio(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.matches_played as f64
        }
    }

    pub fn home_win_ratio(&self) -> f64 {
        if self.home_matches == 0 {
            0.0
        } else {
            self.home_wins as f64 / self.home_matches as f64
        }
    }

    /// Average goals scored per match
    pub fn avg_goals_for(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.goals_for as f64 / self.matches_played as f64
        }
    }

    /// Average goals conceded per match
    pub fn avg_goals_against(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.goals_against as f64 / self.matches_played as f64
        }
    }

    /// Form guide such as "WWDLW"
    pub fn form_string(&self) -> String {
        self.form.iter().map(|o| o.letter()).collect()
    }
}

/// Compute statistics for all teams over a set of matches
pub struct TeamStatisticsComputer {
    stats: HashMap<String, TeamStatistics>,
}

impl TeamStatisticsComputer {
    pub fn new() -> Self {
        TeamStatisticsComputer {
            stats: HashMap::new(),
        }
    }

    /// Process matches and build statistics
    pub fn process_matches(&mut self, matches: &[MatchRecord]) {
        let mut ordered: Vec<&MatchRecord> = matches.iter().collect();
        ordered.sort_by_key(|m| m.date);

        for record in ordered {
            self.stats
                .entry(record.team.clone())
                .or_default()
                .update(record);
        }
    }

    /// Get statistics for a team (case-insensitive name match)
    pub fn get(&self, team: &str) -> Option<&TeamStatistics> {
        self.stats.get(team).or_else(|| {
            self.stats
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(team))
                .map(|(_, s)| s)
        })
    }

    /// Get all team statistics
    pub fn all(&self) -> &HashMap<String, TeamStatistics> {
        &self.stats
    }
}

impl Default for TeamStatisticsComputer {
    fn default() -> Self {
        Self::new()
    }
}
