// Recommendation service: margin prediction, odds consensus, and bet
// selection for a slate of upcoming games.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::game::{Game, GameId};
use crate::inference::MarginInference;
use crate::model::MarginPredictor;
use crate::odds::{ConsensusOdds, OddsCoverage, OddsQuote};
use crate::selector::{select_best_bet, BetRecommendation, SelectionThresholds};

/// Anything that can list the raw bookmaker quotes for a game.
pub trait OddsSource {
    fn quotes_for(&self, game_id: GameId) -> Result<Vec<OddsQuote>>;
}

impl OddsSource for Database {
    fn quotes_for(&self, game_id: GameId) -> Result<Vec<OddsQuote>> {
        self.load_odds(game_id)
    }
}

impl OddsSource for HashMap<GameId, Vec<OddsQuote>> {
    fn quotes_for(&self, game_id: GameId) -> Result<Vec<OddsQuote>> {
        Ok(self.get(&game_id).cloned().unwrap_or_default())
    }
}

/// A recommendation plus the reason its markets look the way they do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecommendation {
    #[serde(flatten)]
    pub recommendation: BetRecommendation,
    pub odds_coverage: OddsCoverage,
}

pub struct RecommendationService<P> {
    inference: MarginInference<P>,
    sigma: f64,
    line_band: f64,
    thresholds: SelectionThresholds,
}

impl<P: MarginPredictor> RecommendationService<P> {
    pub fn new(
        inference: MarginInference<P>,
        sigma: f64,
        line_band: f64,
        thresholds: SelectionThresholds,
    ) -> Self {
        RecommendationService {
            inference,
            sigma,
            line_band,
            thresholds,
        }
    }

    pub fn from_config(inference: MarginInference<P>, config: &Config) -> Self {
        Self::new(
            inference,
            config.model.sigma,
            config.odds.line_band,
            config.selection.thresholds(),
        )
    }

    pub fn inference(&self) -> &MarginInference<P> {
        &self.inference
    }

    pub fn inference_mut(&mut self) -> &mut MarginInference<P> {
        &mut self.inference
    }

    /// Recommendation for one game from its raw quotes. An empty quote list
    /// yields a `NO_ODDS` recommendation.
    pub fn recommend(&mut self, game: &Game, quotes: &[OddsQuote]) -> GameRecommendation {
        let pred_margin = self.inference.predict_margin(game);
        self.evaluate(game, pred_margin, quotes)
    }

    fn evaluate(&self, game: &Game, pred_margin: f64, quotes: &[OddsQuote]) -> GameRecommendation {
        let consensus = ConsensusOdds::from_quotes_with_band(quotes, self.line_band);
        let recommendation =
            select_best_bet(game, pred_margin, &consensus, self.sigma, &self.thresholds);
        let odds_coverage = OddsCoverage::classify(quotes);
        debug!(
            "Game {}: pred {:+.1}, {} ({})",
            game.id,
            pred_margin,
            recommendation.confidence_tier,
            odds_coverage.label()
        );
        GameRecommendation {
            recommendation,
            odds_coverage,
        }
    }

    /// Recommendations for a slate, in input order. A game whose quotes
    /// cannot be read is treated as having no market rather than failing
    /// the whole slate.
    pub fn recommend_all<S: OddsSource + ?Sized>(
        &mut self,
        games: &[Game],
        odds: &S,
    ) -> Vec<GameRecommendation> {
        let predictions = self.inference.predict_margins_batch(games);

        let recs: Vec<GameRecommendation> = games
            .iter()
            .zip(&predictions)
            .map(|(game, pred)| {
                let quotes = odds.quotes_for(game.id).unwrap_or_else(|e| {
                    warn!("Failed to load odds for game {}: {e:#}", game.id);
                    Vec::new()
                });
                self.evaluate(game, pred.pred_margin, &quotes)
            })
            .collect();

        let actionable = recs.iter().filter(|r| r.recommendation.is_actionable()).count();
        info!("Evaluated {} games, {} actionable", recs.len(), actionable);
        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::game::CompletedGames;
    use crate::odds::MarketType;
    use crate::selector::ConfidenceTier;
    use chrono::NaiveDate;

    struct Fixed(f64);

    impl MarginPredictor for Fixed {
        fn predict(&self, _features: &FeatureVector) -> f64 {
            self.0
        }
    }

    struct Failing;

    impl OddsSource for Failing {
        fn quotes_for(&self, game_id: GameId) -> Result<Vec<OddsQuote>> {
            anyhow::bail!("odds feed unavailable for {game_id}")
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    fn service(margin: f64) -> RecommendationService<Fixed> {
        let history =
            CompletedGames::new(vec![Game::completed(1, d(1), "2024-25", 1, 2, 100, 95)]).unwrap();
        RecommendationService::new(
            MarginInference::new(history, Fixed(margin)),
            14.4,
            0.5,
            SelectionThresholds::default(),
        )
    }

    fn spread_quotes(book: &str, line: f64) -> OddsQuote {
        OddsQuote {
            bookmaker: book.into(),
            market: MarketType::Spreads,
            home_line: Some(line),
            home_price: Some(-110),
            away_price: Some(-110),
        }
    }

    #[test]
    fn no_quotes_is_no_odds() {
        let mut svc = service(5.0);
        let rec = svc.recommend(&Game::scheduled(2, d(3), "2024-25", 1, 2), &[]);
        assert_eq!(rec.recommendation.confidence_tier, ConfidenceTier::NoOdds);
        assert_eq!(rec.odds_coverage, OddsCoverage::NoOdds);
        assert_eq!(rec.recommendation.pred_margin, 5.0);
    }

    #[test]
    fn spread_edge_is_recommended() {
        let mut svc = service(12.0);
        let quotes = vec![spread_quotes("a", -3.5), spread_quotes("b", -3.5)];
        let rec = svc.recommend(&Game::scheduled(2, d(3), "2024-25", 1, 2), &quotes);
        assert_eq!(rec.recommendation.confidence_tier, ConfidenceTier::High);
        assert_eq!(rec.odds_coverage, OddsCoverage::MissingMoneyline);
        assert_eq!(rec.recommendation.consensus_odds.spread_line_home, Some(-3.5));
    }

    #[test]
    fn failing_source_degrades_to_no_odds() {
        let mut svc = service(3.0);
        let games = vec![
            Game::scheduled(2, d(3), "2024-25", 1, 2),
            Game::scheduled(3, d(4), "2024-25", 2, 1),
        ];
        let recs = svc.recommend_all(&games, &Failing);
        assert_eq!(recs.len(), 2);
        assert!(recs
            .iter()
            .all(|r| r.recommendation.confidence_tier == ConfidenceTier::NoOdds));
    }

    #[test]
    fn batch_keeps_input_order_and_uses_per_game_odds() {
        let mut svc = service(12.0);
        let games = vec![
            Game::scheduled(5, d(6), "2024-25", 1, 2),
            Game::scheduled(4, d(3), "2024-25", 2, 1),
        ];
        let mut odds: HashMap<GameId, Vec<OddsQuote>> = HashMap::new();
        odds.insert(4, vec![spread_quotes("a", -3.5)]);

        let recs = svc.recommend_all(&games, &odds);
        let ids: Vec<GameId> = recs.iter().map(|r| r.recommendation.game.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(recs[0].recommendation.confidence_tier, ConfidenceTier::NoOdds);
        assert!(recs[1].recommendation.has_recommendation());
    }

    #[test]
    fn serializes_flat_with_coverage() {
        let mut svc = service(0.0);
        let rec = svc.recommend(&Game::scheduled(2, d(3), "2024-25", 1, 2), &[]);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["confidence_tier"], "NO_ODDS");
        assert_eq!(json["odds_coverage"], "no_odds");
        assert!(json["best_bet"].is_null());
    }
}
