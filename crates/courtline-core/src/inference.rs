// Inference: as-of team states for upcoming games, fed through the model.
//
// States for a target date are a pure function of (history, date), so they
// are memoized per date. The cache lives inside `MarginInference` and is
// dropped wholesale whenever the history is swapped.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::builder::ChronologicalStateBuilder;
use crate::features::{self, FeatureVector, MatchupSnapshot};
use crate::game::{CompletedGames, Game, GameId};
use crate::model::MarginPredictor;
use crate::team_state::TeamStates;

/// Team states keyed by the as-of date they were replayed for.
#[derive(Debug, Clone, Default)]
pub struct AsOfStateCache {
    entries: HashMap<NaiveDate, TeamStates>,
}

impl AsOfStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&TeamStates> {
        self.entries.get(&date)
    }

    /// Return the cached states for `date`, building them on a miss.
    pub fn get_or_build(
        &mut self,
        date: NaiveDate,
        build: impl FnOnce() -> TeamStates,
    ) -> &TeamStates {
        if self.entries.contains_key(&date) {
            debug!("As-of cache hit for {date}");
        } else {
            debug!("As-of cache miss for {date}");
        }
        self.entries.entry(date).or_insert_with(build)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One entry of a batch prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginPrediction {
    pub game_id: GameId,
    pub pred_margin: f64,
    pub features: FeatureVector,
}

/// Predicts margins for arbitrary games from a fixed completed-games history.
pub struct MarginInference<P> {
    history: CompletedGames,
    predictor: P,
    cache: AsOfStateCache,
}

impl<P: MarginPredictor> MarginInference<P> {
    pub fn new(history: CompletedGames, predictor: P) -> Self {
        MarginInference {
            history,
            predictor,
            cache: AsOfStateCache::new(),
        }
    }

    pub fn history(&self) -> &CompletedGames {
        &self.history
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub fn cache(&self) -> &AsOfStateCache {
        &self.cache
    }

    /// Swap in a new history. Every cached date is invalidated.
    pub fn replace_history(&mut self, history: CompletedGames) {
        self.history = history;
        self.cache.clear();
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Team states reflecting every completed game before `date`.
    pub fn states_as_of(&mut self, date: NaiveDate) -> &TeamStates {
        let history = &self.history;
        self.cache
            .get_or_build(date, || ChronologicalStateBuilder::states_as_of(history, date))
    }

    /// Pre-game snapshot for `game`, read from its as-of states. The cached
    /// states are not modified; teams without history read as defaults.
    pub fn snapshot_for_game(&mut self, game: &Game) -> MatchupSnapshot {
        let states = self.states_as_of(game.date);
        let home = states.get_or_default(game.home_team_id);
        let away = states.get_or_default(game.away_team_id);
        features::extract(&home, &away, game.date)
    }

    pub fn features_for_game(&mut self, game: &Game) -> FeatureVector {
        self.snapshot_for_game(game).features
    }

    pub fn predict_margin(&mut self, game: &Game) -> f64 {
        let features = self.features_for_game(game);
        self.predictor.predict(&features)
    }

    /// Predict every game, visiting them in date order so each as-of date is
    /// replayed once. Results come back in input order.
    pub fn predict_margins_batch(&mut self, games: &[Game]) -> Vec<MarginPrediction> {
        let mut order: Vec<usize> = (0..games.len()).collect();
        order.sort_by_key(|&i| games[i].date);

        let mut indexed: Vec<(usize, MarginPrediction)> = order
            .into_iter()
            .map(|i| {
                let game = &games[i];
                let features = self.features_for_game(game);
                let prediction = MarginPrediction {
                    game_id: game.id,
                    pred_margin: self.predictor.predict(&features),
                    features,
                };
                (i, prediction)
            })
            .collect();

        indexed.sort_by_key(|(i, _)| *i);
        debug!(
            "Predicted {} games across {} cached dates",
            indexed.len(),
            self.cache.len()
        );
        indexed.into_iter().map(|(_, p)| p).collect()
    }
}
