// Game records and the chronological completed-games history.
//
// Every replay in the engine walks a `CompletedGames` value, so the ordering
// and completeness checks live here, at construction, rather than at each
// call site.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type GameId = i64;
pub type TeamId = i64;

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A scheduled or completed game as supplied by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub date: NaiveDate,
    /// Season label, e.g. "2024-25".
    pub season: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub is_completed: bool,
}

impl Game {
    /// Create an unplayed game (no scores, not completed).
    pub fn scheduled(
        id: GameId,
        date: NaiveDate,
        season: &str,
        home_team_id: TeamId,
        away_team_id: TeamId,
    ) -> Self {
        Game {
            id,
            date,
            season: season.to_string(),
            home_team_id,
            away_team_id,
            home_score: None,
            away_score: None,
            is_completed: false,
        }
    }

    /// Create a completed game with final scores.
    pub fn completed(
        id: GameId,
        date: NaiveDate,
        season: &str,
        home_team_id: TeamId,
        away_team_id: TeamId,
        home_score: i32,
        away_score: i32,
    ) -> Self {
        Game {
            home_score: Some(home_score),
            away_score: Some(away_score),
            is_completed: true,
            ..Game::scheduled(id, date, season, home_team_id, away_team_id)
        }
    }

    /// Home score minus away score, when both scores are known.
    pub fn margin(&self) -> Option<i32> {
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some(home - away),
            _ => None,
        }
    }

    /// True when the game is flagged complete and carries both scores.
    pub fn has_result(&self) -> bool {
        self.is_completed && self.margin().is_some()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("game {game_id} is not a completed game with final scores")]
    Incomplete { game_id: GameId },

    #[error(
        "game {game_id} on {date} is out of chronological order \
         (follows game {previous_id} on {previous_date})"
    )]
    OutOfOrder {
        game_id: GameId,
        date: NaiveDate,
        previous_id: GameId,
        previous_date: NaiveDate,
    },

    #[error("game {game_id} appears more than once in the history")]
    Duplicate { game_id: GameId },
}

// ---------------------------------------------------------------------------
// CompletedGames
// ---------------------------------------------------------------------------

/// Completed games sorted by (date, id) ascending, each with a final score
/// and a unique id.
///
/// The ordering is what makes a single-pass replay leak-free: when a game is
/// read, every team state reflects only games that precede it in this list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedGames {
    games: Vec<Game>,
}

impl CompletedGames {
    /// Validate an already-ordered history. Rejects incomplete games,
    /// duplicate ids, and any game that sorts before its predecessor.
    pub fn new(games: Vec<Game>) -> Result<Self, HistoryError> {
        check_complete_and_unique(&games)?;

        for pair in games.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if (next.date, next.id) < (prev.date, prev.id) {
                return Err(HistoryError::OutOfOrder {
                    game_id: next.id,
                    date: next.date,
                    previous_id: prev.id,
                    previous_date: prev.date,
                });
            }
        }

        Ok(CompletedGames { games })
    }

    /// Sort the games by (date, id) and validate them.
    pub fn from_unsorted(mut games: Vec<Game>) -> Result<Self, HistoryError> {
        check_complete_and_unique(&games)?;
        games.sort_by_key(|g| (g.date, g.id));
        Ok(CompletedGames { games })
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// First and last game dates, if any games are present.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.games.first(), self.games.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Games played strictly before `date`, in order.
    pub fn before(&self, date: NaiveDate) -> &[Game] {
        let end = self.games.partition_point(|g| g.date < date);
        &self.games[..end]
    }

    /// Keep only games whose season label is in `seasons`.
    pub fn restrict_to_seasons(&self, seasons: &[String]) -> CompletedGames {
        CompletedGames {
            games: self
                .games
                .iter()
                .filter(|g| seasons.iter().any(|s| s == &g.season))
                .cloned()
                .collect(),
        }
    }
}

fn check_complete_and_unique(games: &[Game]) -> Result<(), HistoryError> {
    let mut seen = HashSet::with_capacity(games.len());
    for game in games {
        if !game.has_result() {
            return Err(HistoryError::Incomplete { game_id: game.id });
        }
        if !seen.insert(game.id) {
            return Err(HistoryError::Duplicate { game_id: game.id });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
