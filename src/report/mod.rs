//! Text and JSON reports
//!
//! Renders comparison runs, single-model training runs and team summaries.
//! Reports carry error messages only, never backtraces.

use std::fmt;

use crate::features::TeamStatistics;
use crate::training::{ComparisonReport, EnsembleOutcome, ModelResult, TrainingReport};
use crate::Result;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";
const BEST_MARKER: &str = ">>> BEST <<<";

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn signed_pct(value: f64) -> String {
    format!("{:+.1}%", value * 100.0)
}

fn banner(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{}", RULE)?;
    writeln!(f, "  {}", title)?;
    writeln!(f, "{}", RULE)
}

fn model_line(f: &mut fmt::Formatter<'_>, result: &ModelResult) -> fmt::Result {
    writeln!(
        f,
        "{:20} | Accuracy: {} | {} over baseline",
        result.name,
        pct(result.accuracy()),
        signed_pct(result.improvement)
    )
}

/// Text rendering of a comparison run
pub struct ComparisonText<'a>(pub &'a ComparisonReport);

impl fmt::Display for ComparisonText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        banner(f, "MODEL COMPARISON - Finding Best Accuracy")?;
        writeln!(f, "Mode: {}", report.mode)?;
        writeln!(f)?;
        writeln!(f, "Total matches: {}", report.total_matches)?;
        writeln!(f, "Training samples: {}", report.training_samples)?;
        writeln!(f, "Test samples: {}", report.test_samples)?;
        writeln!(f)?;
        writeln!(f, "Baseline accuracy (random): {}", pct(report.baseline))?;
        writeln!(f)?;

        let built = matches!(report.ensemble, EnsembleOutcome::Built { .. });
        let n_models = report.results.len() - usize::from(built);

        writeln!(f, "Testing models...")?;
        writeln!(f, "{}", THIN_RULE)?;
        for result in &report.results[..n_models] {
            model_line(f, result)?;
        }
        for failure in &report.failures {
            writeln!(f, "{:20} | ERROR: {}", failure.name, failure.message)?;
        }

        writeln!(f)?;
        writeln!(f, "Testing Ensemble...")?;
        writeln!(f, "{}", THIN_RULE)?;
        match &report.ensemble {
            EnsembleOutcome::Built { members } => {
                if let Some(ensemble) = report.results.last() {
                    model_line(f, ensemble)?;
                }
                writeln!(f, "Members: {}", members.join(", "))?;
            }
            EnsembleOutcome::Skipped { reason } => writeln!(f, "Ensemble skipped: {}", reason)?,
        }

        writeln!(f)?;
        banner(f, "RESULTS SUMMARY")?;
        let ranked = report.ranked();
        let Some(best) = ranked.first() else {
            return writeln!(f, "No model completed training.");
        };
        for (i, result) in ranked.iter().enumerate() {
            let marker = if i == 0 { BEST_MARKER } else { "" };
            let line = format!(
                "{}. {:20} | Acc: {} | P: {} | R: {} | F1: {} {}",
                i + 1,
                result.name,
                pct(result.metrics.accuracy),
                pct(result.metrics.precision),
                pct(result.metrics.recall),
                pct(result.metrics.f1_score),
                marker
            );
            writeln!(f, "{}", line.trim_end())?;
        }

        writeln!(f)?;
        banner(f, "BEST MODEL")?;
        writeln!(f, "Model:       {}", best.name)?;
        writeln!(f, "Accuracy:    {}", pct(best.accuracy()))?;
        writeln!(f, "Baseline:    {}", pct(report.baseline))?;
        writeln!(
            f,
            "Improvement: {} ({:.1}x better than random)",
            signed_pct(best.improvement),
            best.accuracy() / report.baseline
        )?;
        writeln!(f, "Test Set:    {} matches", report.test_samples)?;
        writeln!(f, "Task:        {} classification", report.mode.describe())
    }
}

/// Text rendering of a single training run
pub struct TrainingText<'a>(pub &'a TrainingReport);

impl fmt::Display for TrainingText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Model trained: {}", report.model)?;
        writeln!(f)?;
        writeln!(f, "=== MODEL METRICS ===")?;
        writeln!(f, "   Model Accuracy:     {}", pct(report.accuracy))?;
        writeln!(
            f,
            "   Baseline Accuracy:  {} (random guessing)",
            pct(report.baseline_accuracy)
        )?;
        writeln!(
            f,
            "   Improvement:        {} over baseline",
            signed_pct(report.improvement_over_baseline)
        )?;
        writeln!(f)?;
        writeln!(f, "=== DETAILED METRICS ===")?;
        writeln!(f, "   Precision: {}", pct(report.precision))?;
        writeln!(f, "   Recall:    {}", pct(report.recall))?;
        writeln!(f, "   F1 Score:  {}", pct(report.f1_score))?;
        writeln!(f)?;
        writeln!(f, "=== DATASET INFO ===")?;
        writeln!(f, "   Training samples: {} matches", report.training_samples)?;
        writeln!(f, "   Test samples:     {} matches", report.test_samples)
    }
}

/// Season summary of one team
pub struct TeamText<'a> {
    pub name: &'a str,
    pub stats: &'a TeamStatistics,
}

impl fmt::Display for TeamText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        writeln!(f, "{}", self.name)?;
        writeln!(f, "───────────────────────────────")?;
        writeln!(
            f,
            "  Played:   {} (W{} D{} L{})",
            stats.matches_played, stats.wins, stats.draws, stats.losses
        )?;
        writeln!(
            f,
            "  Goals:    {} for, {} against",
            stats.goals_for, stats.goals_against
        )?;
        writeln!(f, "  Win rate: {}", pct(stats.win_ratio()))?;
        writeln!(f, "  Home:     {}", pct(stats.home_win_ratio()))?;
        writeln!(
            f,
            "  Avg:      {:.2} scored, {:.2} conceded",
            stats.avg_goals_for(),
            stats.avg_goals_against()
        )?;
        writeln!(f, "  Form:     {}", stats.form_string())
    }
}

pub fn format_comparison(report: &ComparisonReport) -> String {
    ComparisonText(report).to_string()
}

pub fn format_training(report: &TrainingReport) -> String {
    TrainingText(report).to_string()
}

pub fn format_team(name: &str, stats: &TeamStatistics) -> String {
    TeamText { name, stats }.to_string()
}

pub fn comparison_json(report: &ComparisonReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&report.summary())?)
}

pub fn training_json(report: &TrainingReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, ConstantClassifier};
    use crate::training::{ClassificationMetrics, ModelFailure, ModelResult, ENSEMBLE_NAME};
    use crate::LabelMode;

    fn result(name: &str, accuracy: f64, baseline: f64) -> ModelResult {
        ModelResult {
            name: name.to_string(),
            model: Box::new(ConstantClassifier::new(vec![1.0, 0.0, 0.0])),
            metrics: ClassificationMetrics {
                accuracy,
                precision: accuracy,
                recall: accuracy,
                f1_score: accuracy,
                support: 100,
            },
            improvement: accuracy - baseline,
        }
    }

    fn report(ensemble: EnsembleOutcome) -> ComparisonReport {
        let baseline = 1.0 / 3.0;
        let mut results = vec![
            result("RandomForest", 0.48, baseline),
            result("GradientBoosting", 0.52, baseline),
            result("LogisticRegression", 0.45, baseline),
        ];
        if matches!(ensemble, EnsembleOutcome::Built { .. }) {
            results.push(result(ENSEMBLE_NAME, 0.50, baseline));
        }
        ComparisonReport {
            mode: LabelMode::ThreeWay,
            total_matches: 1000,
            training_samples: 600,
            test_samples: 100,
            baseline,
            results,
            failures: vec![ModelFailure {
                name: "HistGradientBoosting".to_string(),
                message: "Training error: bad input".to_string(),
            }],
            ensemble,
        }
    }

    #[test]
    fn test_comparison_marks_best() {
        let text = format_comparison(&report(EnsembleOutcome::Built {
            members: vec!["GradientBoosting".into(), "RandomForest".into(), "LogisticRegression".into()],
        }));

        let best_line = text.lines().find(|l| l.contains(BEST_MARKER)).unwrap();
        assert!(best_line.starts_with("1. GradientBoosting"));
        assert_eq!(text.matches(BEST_MARKER).count(), 1);
        assert!(text.contains("Ensemble (Top 3)     | Accuracy: 50.0%"));
        assert!(text.contains("HistGradientBoosting | ERROR: Training error: bad input"));
        assert!(text.contains("Baseline accuracy (random): 33.3%"));
        assert!(text.contains("(1.6x better than random)"));
        assert!(text.contains("Mode: 3-CLASS (Win vs Draw vs Loss)"));
    }

    #[test]
    fn test_comparison_reports_skipped_ensemble() {
        let text = format_comparison(&report(EnsembleOutcome::Skipped {
            reason: "need 3 successful models, got 2".to_string(),
        }));
        assert!(text.contains("Ensemble skipped: need 3 successful models, got 2"));
        assert!(!text.contains(ENSEMBLE_NAME));
    }

    #[test]
    fn test_comparison_without_results() {
        let mut empty = report(EnsembleOutcome::Skipped {
            reason: "none".to_string(),
        });
        empty.results.clear();
        let text = format_comparison(&empty);
        assert!(text.contains("No model completed training."));
        assert!(!text.contains(BEST_MARKER));
    }

    #[test]
    fn test_comparison_json() {
        let json = comparison_json(&report(EnsembleOutcome::Skipped {
            reason: "need 3".to_string(),
        }))
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ranking"][0], "GradientBoosting");
        assert_eq!(value["ensemble"]["status"], "skipped");
        assert_eq!(value["results"].as_array().unwrap().len(), 3);
        assert_eq!(value["mode"], "ThreeWay");
    }

    #[test]
    fn test_training_report() {
        let training = TrainingReport {
            model: "RandomForest".to_string(),
            accuracy: 0.5,
            baseline_accuracy: 1.0 / 3.0,
            improvement_over_baseline: 0.5 - 1.0 / 3.0,
            precision: 0.49,
            recall: 0.5,
            f1_score: 0.48,
            training_samples: 600,
            test_samples: 100,
        };

        let text = format_training(&training);
        assert!(text.contains("Model Accuracy:     50.0%"));
        assert!(text.contains("Improvement:        +16.7% over baseline"));
        assert!(text.contains("Test samples:     100 matches"));

        let value: serde_json::Value =
            serde_json::from_str(&training_json(&training).unwrap()).unwrap();
        assert_eq!(value["training_samples"], 600);
        assert_eq!(value["model"], "RandomForest");
    }

    #[test]
    fn test_team_summary() {
        let mut stats = TeamStatistics::new();
        stats.update(&record("Arsenal", 0, 2, 0));
        stats.update(&record("Arsenal", 1, 1, 1));

        let text = format_team("Arsenal", &stats);
        assert!(text.starts_with("Arsenal\n"));
        assert!(text.contains("Played:   2 (W1 D1 L0)"));
        assert!(text.contains("Form:     WD"));
    }
}
