// SQLite storage for games and bookmaker odds.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use tracing::{info, warn};

use crate::game::{CompletedGames, Game, GameId};
use crate::odds::{MarketType, OddsQuote};
use crate::probability::AmericanOdds;

/// SQLite-backed store for the schedule, final scores, and raw odds quotes.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id           INTEGER PRIMARY KEY,
                date         TEXT NOT NULL,
                season       TEXT NOT NULL,
                home_team_id INTEGER NOT NULL,
                away_team_id INTEGER NOT NULL,
                home_score   INTEGER,
                away_score   INTEGER,
                is_completed INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);

            CREATE TABLE IF NOT EXISTS game_odds (
                game_id     INTEGER NOT NULL REFERENCES games(id),
                bookmaker   TEXT NOT NULL,
                market_type TEXT NOT NULL,
                home_line   REAL,
                home_odds   INTEGER,
                away_odds   INTEGER,
                last_update TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (game_id, bookmaker, market_type)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a game or overwrite the stored row with the same id, e.g. when
    /// a scheduled game receives its final score.
    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO games
                (id, date, season, home_team_id, away_team_id, home_score, away_score, is_completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                date         = excluded.date,
                season       = excluded.season,
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_score   = excluded.home_score,
                away_score   = excluded.away_score,
                is_completed = excluded.is_completed",
            params![
                game.id,
                game.date,
                game.season,
                game.home_team_id,
                game.away_team_id,
                game.home_score,
                game.away_score,
                game.is_completed,
            ],
        )
        .with_context(|| format!("failed to upsert game {}", game.id))?;
        Ok(())
    }

    /// Store one bookmaker quote. A newer quote from the same bookmaker for
    /// the same market replaces the old one.
    pub fn insert_odds(&self, game_id: GameId, quote: &OddsQuote) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO game_odds
                (game_id, bookmaker, market_type, home_line, home_odds, away_odds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                game_id,
                quote.bookmaker,
                quote.market.label(),
                quote.home_line,
                quote.home_price,
                quote.away_price,
            ],
        )
        .with_context(|| format!("failed to insert odds for game {game_id}"))?;
        Ok(())
    }

    /// Completed games ordered by (date, id), optionally limited to the
    /// given season labels.
    pub fn load_completed_games(&self, seasons: Option<&[String]>) -> Result<CompletedGames> {
        let games = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(
                    "SELECT id, date, season, home_team_id, away_team_id,
                            home_score, away_score, is_completed
                     FROM games
                     WHERE is_completed = 1 AND home_score IS NOT NULL AND away_score IS NOT NULL
                     ORDER BY date, id",
                )
                .context("failed to prepare load_completed_games query")?;
            let games = stmt
                .query_map([], game_from_row)
                .context("failed to query completed games")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("failed to map game rows")?;
            games
        };

        let history = CompletedGames::new(games).context("stored history is inconsistent")?;
        let history = match seasons {
            Some(seasons) => history.restrict_to_seasons(seasons),
            None => history,
        };

        match history.date_range() {
            Some((first, last)) => info!(
                "Loaded {} completed games ({first} to {last})",
                history.len()
            ),
            None => warn!("No completed games found"),
        }
        Ok(history)
    }

    /// Games not yet completed with `from <= date <= to`, ordered by (date, id).
    pub fn load_upcoming_games(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Game>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, date, season, home_team_id, away_team_id,
                        home_score, away_score, is_completed
                 FROM games
                 WHERE is_completed = 0 AND date >= ?1 AND date <= ?2
                 ORDER BY date, id",
            )
            .context("failed to prepare load_upcoming_games query")?;
        let games = stmt
            .query_map(params![from, to], game_from_row)
            .context("failed to query upcoming games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;
        Ok(games)
    }

    /// Every stored quote for `game_id`. An empty result means no market.
    ///
    /// Rows with an unknown market label are skipped, and a zero price is
    /// read as missing; both are logged.
    pub fn load_odds(&self, game_id: GameId) -> Result<Vec<OddsQuote>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT bookmaker, market_type, home_line, home_odds, away_odds
                 FROM game_odds WHERE game_id = ?1 ORDER BY bookmaker, market_type",
            )
            .context("failed to prepare load_odds query")?;

        let raw = stmt
            .query_map(params![game_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<AmericanOdds>>(3)?,
                    row.get::<_, Option<AmericanOdds>>(4)?,
                ))
            })
            .context("failed to query game odds")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game odds rows")?;

        let mut quotes = Vec::with_capacity(raw.len());
        for (bookmaker, label, home_line, home_price, away_price) in raw {
            let Some(market) = MarketType::from_label(&label) else {
                warn!(
                    "skipping odds row for game {game_id} from '{bookmaker}': \
                     unknown market '{label}'"
                );
                continue;
            };
            quotes.push(OddsQuote {
                home_price: valid_price(game_id, &bookmaker, home_price),
                away_price: valid_price(game_id, &bookmaker, away_price),
                bookmaker,
                market,
                home_line,
            });
        }
        Ok(quotes)
    }
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        date: row.get(1)?,
        season: row.get(2)?,
        home_team_id: row.get(3)?,
        away_team_id: row.get(4)?,
        home_score: row.get(5)?,
        away_score: row.get(6)?,
        is_completed: row.get(7)?,
    })
}

fn valid_price(
    game_id: GameId,
    bookmaker: &str,
    price: Option<AmericanOdds>,
) -> Option<AmericanOdds> {
    match price {
        Some(0) => {
            warn!("ignoring zero price for game {game_id} from '{bookmaker}'");
            None
        }
        other => other,
    }
}
