// Feature extraction: the fixed 11-column input of the margin model.
//
// The same `extract` function feeds both the training dataset and live
// inference, so the two can never disagree on column order or semantics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::game::{GameId, TeamId};
use crate::team_state::TeamState;

/// Number of model input features.
pub const FEATURE_COUNT: usize = 11;

/// Model column names, in the order `FeatureVector::to_array` emits them.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "home_win_pct_to_date",
    "away_win_pct_to_date",
    "win_pct_diff",
    "home_last10_margin",
    "away_last10_margin",
    "last10_margin_diff",
    "home_home_margin_to_date",
    "away_away_margin_to_date",
    "rest_diff",
    "home_b2b",
    "away_b2b",
];

/// Pre-game features for one matchup. Field order matches `FEATURE_COLUMNS`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub home_win_pct_to_date: f64,
    pub away_win_pct_to_date: f64,
    pub win_pct_diff: f64,
    pub home_last10_margin: f64,
    pub away_last10_margin: f64,
    pub last10_margin_diff: f64,
    /// Home team's average margin in its home games.
    pub home_home_margin_to_date: f64,
    /// Away team's average margin in its away games.
    pub away_away_margin_to_date: f64,
    /// Home rest days minus away rest days.
    pub rest_diff: f64,
    /// 1.0 when the home team is on a back-to-back, else 0.0.
    pub home_b2b: f64,
    pub away_b2b: f64,
}

impl FeatureVector {
    /// Values in model column order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.home_win_pct_to_date,
            self.away_win_pct_to_date,
            self.win_pct_diff,
            self.home_last10_margin,
            self.away_last10_margin,
            self.last10_margin_diff,
            self.home_home_margin_to_date,
            self.away_away_margin_to_date,
            self.rest_diff,
            self.home_b2b,
            self.away_b2b,
        ]
    }

    /// Pairs of (column name, value), handy for logging.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_COLUMNS.into_iter().zip(self.to_array())
    }
}

// ---------------------------------------------------------------------------
// Snapshot extraction
// ---------------------------------------------------------------------------

/// Everything read from the two team states before a game is played: the
/// model features plus descriptive values used for training bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchupSnapshot {
    pub features: FeatureVector,
    pub home_avg_margin_to_date: f64,
    pub away_avg_margin_to_date: f64,
    pub home_rest_days: i64,
    pub away_rest_days: i64,
    pub home_games_to_date: u32,
    pub away_games_to_date: u32,
}

/// Read the pre-game snapshot for a matchup on `game_date`. The states must
/// not yet include the game being described.
pub fn extract(home: &TeamState, away: &TeamState, game_date: NaiveDate) -> MatchupSnapshot {
    let home_win_pct = home.win_pct();
    let away_win_pct = away.win_pct();

    let home_last10 = home.last10_avg_margin();
    let away_last10 = away.last10_avg_margin();

    let home_rest = home.rest_days(game_date);
    let away_rest = away.rest_days(game_date);

    let features = FeatureVector {
        home_win_pct_to_date: home_win_pct,
        away_win_pct_to_date: away_win_pct,
        win_pct_diff: home_win_pct - away_win_pct,
        home_last10_margin: home_last10,
        away_last10_margin: away_last10,
        last10_margin_diff: home_last10 - away_last10,
        home_home_margin_to_date: home.home_avg_margin(),
        away_away_margin_to_date: away.away_avg_margin(),
        rest_diff: (home_rest - away_rest) as f64,
        home_b2b: flag(home_rest == 0),
        away_b2b: flag(away_rest == 0),
    };

    MatchupSnapshot {
        features,
        home_avg_margin_to_date: home.avg_margin(),
        away_avg_margin_to_date: away.avg_margin(),
        home_rest_days: home_rest,
        away_rest_days: away_rest,
        home_games_to_date: home.total_games,
        away_games_to_date: away.total_games,
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Training rows
// ---------------------------------------------------------------------------

/// One training example: identifiers, the pre-game snapshot, and the
/// realized margin as label.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub game_id: GameId,
    pub game_date: NaiveDate,
    pub season: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    /// Realized home score minus away score.
    pub y_margin: f64,
    pub snapshot: MatchupSnapshot,
}

impl DatasetRow {
    pub fn features(&self) -> &FeatureVector {
        &self.snapshot.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn columns_and_array_agree_in_length() {
        let fv = extract(&TeamState::new(1), &TeamState::new(2), d(10)).features;
        assert_eq!(fv.to_array().len(), FEATURE_COLUMNS.len());
        let names: Vec<&str> = fv.named().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_COLUMNS.to_vec());
    }

    #[test]
    fn fresh_teams_produce_neutral_features() {
        let snap = extract(&TeamState::new(1), &TeamState::new(2), d(10));
        let fv = snap.features;
        assert_eq!(fv.home_win_pct_to_date, 0.5);
        assert_eq!(fv.away_win_pct_to_date, 0.5);
        assert_eq!(fv.win_pct_diff, 0.0);
        assert_eq!(fv.last10_margin_diff, 0.0);
        assert_eq!(fv.rest_diff, 0.0);
        assert_eq!(fv.home_b2b, 0.0);
        assert_eq!(fv.away_b2b, 0.0);
        assert_eq!(snap.home_rest_days, 3);
        assert_eq!(snap.home_games_to_date, 0);
    }

    #[test]
    fn uses_home_split_for_home_team_and_away_split_for_away_team() {
        let mut home = TeamState::new(1);
        home.update_after_game(12.0, true, d(1));
        home.update_after_game(-20.0, false, d(3));

        let mut away = TeamState::new(2);
        away.update_after_game(8.0, true, d(1));
        away.update_after_game(-2.0, false, d(4));

        let snap = extract(&home, &away, d(5));
        let fv = snap.features;
        assert_eq!(fv.home_home_margin_to_date, 12.0);
        assert_eq!(fv.away_away_margin_to_date, -2.0);
        assert_eq!(fv.home_last10_margin, -4.0);
        assert_eq!(fv.away_last10_margin, 3.0);
        assert_eq!(fv.last10_margin_diff, -7.0);
        assert_eq!(snap.home_avg_margin_to_date, -4.0);
    }

    #[test]
    fn back_to_back_flags_and_rest_diff() {
        let mut home = TeamState::new(1);
        home.update_after_game(1.0, true, d(4));
        let mut away = TeamState::new(2);
        away.update_after_game(1.0, true, d(1));

        let snap = extract(&home, &away, d(5));
        assert_eq!(snap.home_rest_days, 0);
        assert_eq!(snap.away_rest_days, 3);
        assert_eq!(snap.features.home_b2b, 1.0);
        assert_eq!(snap.features.away_b2b, 0.0);
        assert_eq!(snap.features.rest_diff, -3.0);
    }
}
