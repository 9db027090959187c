// Backtest spot check: predict already-played games as of their own dates
// and compare with the realized margins.

use serde::Serialize;
use tracing::info;

use crate::game::{CompletedGames, Game, GameId};
use crate::inference::MarginInference;
use crate::model::MarginPredictor;

/// Default number of games in a spot check.
pub const DEFAULT_SAMPLES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestSample {
    pub game_id: GameId,
    pub predicted: f64,
    pub actual: f64,
    pub abs_error: f64,
    /// Predicted and actual winners agree. A margin of zero counts as an
    /// away result on both sides.
    pub direction_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub mae: f64,
    pub direction_accuracy: f64,
    pub samples: Vec<BacktestSample>,
}

impl BacktestReport {
    pub fn correct_directions(&self) -> usize {
        self.samples.iter().filter(|s| s.direction_correct).count()
    }
}

/// Up to `n` games spread evenly across the history, oldest first.
pub fn evenly_spaced(history: &CompletedGames, n: usize) -> Vec<Game> {
    let games = history.games();
    if n == 0 || games.is_empty() {
        return Vec::new();
    }
    if n >= games.len() {
        return games.to_vec();
    }
    (0..n).map(|i| games[i * games.len() / n].clone()).collect()
}

/// Score the model on `games`. Games without a final score are skipped;
/// `None` when nothing is left to score.
pub fn spot_check<P: MarginPredictor>(
    inference: &mut MarginInference<P>,
    games: &[Game],
) -> Option<BacktestReport> {
    let scored: Vec<Game> = games.iter().filter(|g| g.has_result()).cloned().collect();
    if scored.is_empty() {
        return None;
    }

    let predictions = inference.predict_margins_batch(&scored);
    let samples: Vec<BacktestSample> = scored
        .iter()
        .zip(&predictions)
        .filter_map(|(game, pred)| {
            let actual = f64::from(game.margin()?);
            Some(BacktestSample {
                game_id: game.id,
                predicted: pred.pred_margin,
                actual,
                abs_error: (pred.pred_margin - actual).abs(),
                direction_correct: (pred.pred_margin > 0.0) == (actual > 0.0),
            })
        })
        .collect();

    let n = samples.len() as f64;
    let report = BacktestReport {
        mae: samples.iter().map(|s| s.abs_error).sum::<f64>() / n,
        direction_accuracy: samples.iter().filter(|s| s.direction_correct).count() as f64 / n,
        samples,
    };
    info!(
        "Backtest over {} games: MAE {:.2}, direction accuracy {:.1}%",
        report.samples.len(),
        report.mae,
        report.direction_accuracy * 100.0
    );
    Some(report)
}
