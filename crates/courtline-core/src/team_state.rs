// Running per-team aggregate built up one completed game at a time.

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::game::TeamId;

/// Number of recent games kept in the rolling margin window.
pub const ROLLING_WINDOW: usize = 10;

/// Win-rate prior for a team with no games on record.
pub const NEUTRAL_WIN_PCT: f64 = 0.5;

/// Rest-days prior for a team's first game.
pub const DEFAULT_REST_DAYS: i64 = 3;

/// Running statistics for one team.
///
/// `update_after_game` must only be called once that game's features have
/// been read from this state; the builder enforces the ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub team_id: TeamId,
    pub total_games: u32,
    pub total_wins: u32,
    /// Cumulative point differential across all games.
    pub total_margin: f64,
    pub home_games: u32,
    pub home_margin: f64,
    pub away_games: u32,
    pub away_margin: f64,
    /// Most recent differentials, oldest first.
    last10_margins: VecDeque<f64>,
    pub last_game_date: Option<NaiveDate>,
}

impl TeamState {
    pub fn new(team_id: TeamId) -> Self {
        TeamState {
            team_id,
            total_games: 0,
            total_wins: 0,
            total_margin: 0.0,
            home_games: 0,
            home_margin: 0.0,
            away_games: 0,
            away_margin: 0.0,
            last10_margins: VecDeque::with_capacity(ROLLING_WINDOW),
            last_game_date: None,
        }
    }

    /// Win percentage to date, or the neutral prior before any games.
    pub fn win_pct(&self) -> f64 {
        if self.total_games == 0 {
            return NEUTRAL_WIN_PCT;
        }
        self.total_wins as f64 / self.total_games as f64
    }

    pub fn avg_margin(&self) -> f64 {
        average(self.total_margin, self.total_games)
    }

    /// Average differential in home games only.
    pub fn home_avg_margin(&self) -> f64 {
        average(self.home_margin, self.home_games)
    }

    /// Average differential in away games only.
    pub fn away_avg_margin(&self) -> f64 {
        average(self.away_margin, self.away_games)
    }

    /// Mean of the rolling window, or 0.0 when empty.
    pub fn last10_avg_margin(&self) -> f64 {
        if self.last10_margins.is_empty() {
            return 0.0;
        }
        self.last10_margins.iter().sum::<f64>() / self.last10_margins.len() as f64
    }

    /// The rolling window contents, oldest first.
    pub fn recent_margins(&self) -> impl Iterator<Item = f64> + '_ {
        self.last10_margins.iter().copied()
    }

    /// Days of rest before a game on `game_date`. Zero is a back-to-back.
    pub fn rest_days(&self, game_date: NaiveDate) -> i64 {
        match self.last_game_date {
            Some(last) => (game_date - last).num_days() - 1,
            None => DEFAULT_REST_DAYS,
        }
    }

    /// Fold one completed game into the state. A margin of exactly zero is
    /// not counted as a win.
    pub fn update_after_game(&mut self, margin: f64, is_home: bool, game_date: NaiveDate) {
        if let Some(last) = self.last_game_date {
            assert!(
                game_date >= last,
                "team {} updated with game on {} after already recording {}",
                self.team_id,
                game_date,
                last
            );
        }

        self.total_games += 1;
        if margin > 0.0 {
            self.total_wins += 1;
        }
        self.total_margin += margin;

        if is_home {
            self.home_games += 1;
            self.home_margin += margin;
        } else {
            self.away_games += 1;
            self.away_margin += margin;
        }

        if self.last10_margins.len() == ROLLING_WINDOW {
            self.last10_margins.pop_front();
        }
        self.last10_margins.push_back(margin);
        self.last_game_date = Some(game_date);
    }
}

fn average(sum: f64, count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

// ---------------------------------------------------------------------------
// TeamStates
// ---------------------------------------------------------------------------

/// All team states produced by one replay, keyed by team id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStates {
    states: HashMap<TeamId, TeamState>,
}

impl TeamStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable state for `team_id`, created with defaults on first use.
    pub fn entry(&mut self, team_id: TeamId) -> &mut TeamState {
        self.states
            .entry(team_id)
            .or_insert_with(|| TeamState::new(team_id))
    }

    /// State for `team_id`, or a fresh default state if the team has not
    /// played yet. Does not insert.
    pub fn get_or_default(&self, team_id: TeamId) -> TeamState {
        self.states
            .get(&team_id)
            .cloned()
            .unwrap_or_else(|| TeamState::new(team_id))
    }

    pub fn get(&self, team_id: TeamId) -> Option<&TeamState> {
        self.states.get(&team_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
