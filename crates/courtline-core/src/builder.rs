// Chronological single-pass replay over completed games.
//
// For each game the pre-game snapshot is read first, then both teams are
// updated with the result. At row N the states therefore reflect only rows
// 0..N-1, which is what keeps the training table free of look-ahead.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::features::{self, DatasetRow, MatchupSnapshot};
use crate::game::{CompletedGames, Game, GameId};
use crate::team_state::TeamStates;

/// Log a progress line every this many games during a dataset build.
const PROGRESS_EVERY: usize = 500;

/// Accumulates team states one game at a time, in strict (date, id) order.
#[derive(Debug, Clone, Default)]
pub struct ChronologicalStateBuilder {
    states: TeamStates,
    last_applied: Option<(NaiveDate, GameId)>,
}

impl ChronologicalStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> &TeamStates {
        &self.states
    }

    pub fn into_states(self) -> TeamStates {
        self.states
    }

    /// Pre-game snapshot for `game` from the current states. Teams that have
    /// not played yet read as default states.
    pub fn snapshot_for(&self, game: &Game) -> MatchupSnapshot {
        let home = self.states.get_or_default(game.home_team_id);
        let away = self.states.get_or_default(game.away_team_id);
        features::extract(&home, &away, game.date)
    }

    /// Fold a completed game into both teams' states.
    ///
    /// Panics if the game has no result, if a team plays itself, or if the
    /// game does not sort strictly after the previously applied game; each
    /// of those would silently corrupt every later snapshot.
    pub fn apply(&mut self, game: &Game) {
        let margin = match game.margin() {
            Some(m) if game.is_completed => m as f64,
            _ => panic!("game {} applied to team state without a final score", game.id),
        };
        assert_ne!(
            game.home_team_id, game.away_team_id,
            "game {} lists the same team on both sides",
            game.id
        );
        if let Some(prev) = self.last_applied {
            assert!(
                (game.date, game.id) > prev,
                "game {} on {} applied after game {} on {}",
                game.id,
                game.date,
                prev.1,
                prev.0
            );
        }

        self.states
            .entry(game.home_team_id)
            .update_after_game(margin, true, game.date);
        self.states
            .entry(game.away_team_id)
            .update_after_game(-margin, false, game.date);
        self.last_applied = Some((game.date, game.id));
    }

    /// Build one training row per completed game, in history order.
    pub fn build_dataset(history: &CompletedGames) -> Vec<DatasetRow> {
        let total = history.len();
        if let Some((first, last)) = history.date_range() {
            info!("Building dataset from {total} completed games ({first} to {last})");
        } else {
            info!("Building dataset from an empty history");
        }

        let mut builder = Self::new();
        let mut rows = Vec::with_capacity(total);

        for (i, game) in history.games().iter().enumerate() {
            let snapshot = builder.snapshot_for(game);
            rows.push(DatasetRow {
                game_id: game.id,
                game_date: game.date,
                season: game.season.clone(),
                home_team_id: game.home_team_id,
                away_team_id: game.away_team_id,
                y_margin: game.margin().map(f64::from).unwrap_or_default(),
                snapshot,
            });
            builder.apply(game);

            if (i + 1) % PROGRESS_EVERY == 0 {
                info!("Processed {}/{} games", i + 1, total);
            }
        }

        info!("Dataset built: {} rows", rows.len());
        rows
    }

    /// Team states as of the day before `date`: every completed game dated
    /// strictly earlier is applied, nothing on or after `date` is.
    pub fn states_as_of(history: &CompletedGames, date: NaiveDate) -> TeamStates {
        let prior = history.before(date);
        debug!("Replaying {} games prior to {date}", prior.len());

        let mut builder = Self::new();
        for game in prior {
            builder.apply(game);
        }
        builder.into_states()
    }
}
