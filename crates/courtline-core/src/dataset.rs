// Training dataset export and sanity checks.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{info, warn};

use crate::features::DatasetRow;
use crate::game::{GameId, TeamId};

/// Rows inspected by the "fresh teams appear early" check.
const EARLY_WINDOW: usize = 100;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("sanity check failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// CSV record
// ---------------------------------------------------------------------------

/// Flat CSV shape of a `DatasetRow`. Column names are the training names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub game_id: GameId,
    pub game_date: NaiveDate,
    pub season: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub y_margin: f64,
    pub home_win_pct_to_date: f64,
    pub away_win_pct_to_date: f64,
    pub win_pct_diff: f64,
    pub home_avg_margin_to_date: f64,
    pub away_avg_margin_to_date: f64,
    pub home_last10_margin: f64,
    pub away_last10_margin: f64,
    pub last10_margin_diff: f64,
    pub home_home_margin_to_date: f64,
    pub away_away_margin_to_date: f64,
    pub home_rest_days: i64,
    pub away_rest_days: i64,
    pub rest_diff: f64,
    pub home_b2b: f64,
    pub away_b2b: f64,
    pub home_games_to_date: u32,
    pub away_games_to_date: u32,
}

impl From<&DatasetRow> for TrainingRecord {
    fn from(row: &DatasetRow) -> Self {
        let snap = &row.snapshot;
        let fv = &snap.features;
        TrainingRecord {
            game_id: row.game_id,
            game_date: row.game_date,
            season: row.season.clone(),
            home_team_id: row.home_team_id,
            away_team_id: row.away_team_id,
            y_margin: row.y_margin,
            home_win_pct_to_date: fv.home_win_pct_to_date,
            away_win_pct_to_date: fv.away_win_pct_to_date,
            win_pct_diff: fv.win_pct_diff,
            home_avg_margin_to_date: snap.home_avg_margin_to_date,
            away_avg_margin_to_date: snap.away_avg_margin_to_date,
            home_last10_margin: fv.home_last10_margin,
            away_last10_margin: fv.away_last10_margin,
            last10_margin_diff: fv.last10_margin_diff,
            home_home_margin_to_date: fv.home_home_margin_to_date,
            away_away_margin_to_date: fv.away_away_margin_to_date,
            home_rest_days: snap.home_rest_days,
            away_rest_days: snap.away_rest_days,
            rest_diff: fv.rest_diff,
            home_b2b: fv.home_b2b,
            away_b2b: fv.away_b2b,
            home_games_to_date: snap.home_games_to_date,
            away_games_to_date: snap.away_games_to_date,
        }
    }
}

fn write_to_writer<W: Write>(writer: W, rows: &[DatasetRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(TrainingRecord::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the dataset to `path`, creating parent directories as needed.
pub fn write_csv(path: &Path, rows: &[DatasetRow]) -> Result<(), DatasetError> {
    let path_str = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    let file = std::fs::File::create(path).map_err(|e| DatasetError::Io {
        path: path_str.clone(),
        source: e,
    })?;
    write_to_writer(file, rows).map_err(|e| DatasetError::Csv {
        path: path_str.clone(),
        source: e,
    })?;
    info!("Dataset saved to {} ({} rows)", path_str, rows.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Sanity check
// ---------------------------------------------------------------------------

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two rows.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    fn of(values: &[f64]) -> Self {
        let std_dev = Statistics::std_dev(values.iter());
        ColumnStats {
            mean: Statistics::mean(values.iter()),
            std_dev: std_dev.is_finite().then_some(std_dev),
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub rows: usize,
    /// Whether some team in the first rows had no prior games.
    pub early_rows_have_fresh_team: bool,
    /// Mean prior games for home and away teams over the last rows.
    pub late_avg_games_to_date: (f64, f64),
    pub y_margin: ColumnStats,
    pub win_pct_diff: ColumnStats,
    pub last10_margin_diff: ColumnStats,
    pub rest_diff: ColumnStats,
}

/// Validate a freshly built dataset and summarize it.
///
/// Fails when the dataset is empty, when none of the first rows features a
/// team with zero prior games (the replay did not start from scratch), or
/// when a key column holds a non-finite value.
pub fn sanity_check(rows: &[DatasetRow]) -> Result<DatasetReport, DatasetError> {
    if rows.is_empty() {
        return Err(DatasetError::Validation("dataset is empty".into()));
    }

    let early = &rows[..rows.len().min(EARLY_WINDOW)];
    let early_rows_have_fresh_team = early
        .iter()
        .any(|r| r.snapshot.home_games_to_date == 0 || r.snapshot.away_games_to_date == 0);
    if !early_rows_have_fresh_team {
        return Err(DatasetError::Validation(format!(
            "none of the first {} rows has a team with zero prior games",
            early.len()
        )));
    }

    for row in rows {
        let fv = row.features();
        let key = [
            ("home_win_pct_to_date", fv.home_win_pct_to_date),
            ("away_win_pct_to_date", fv.away_win_pct_to_date),
            ("home_last10_margin", fv.home_last10_margin),
            ("y_margin", row.y_margin),
        ];
        if let Some((name, value)) = key.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DatasetError::Validation(format!(
                "game {}: `{name}` is {value}",
                row.game_id
            )));
        }
    }

    let late = &rows[rows.len().saturating_sub(EARLY_WINDOW)..];
    let late_home: Vec<f64> = late.iter().map(|r| r.snapshot.home_games_to_date as f64).collect();
    let late_away: Vec<f64> = late.iter().map(|r| r.snapshot.away_games_to_date as f64).collect();
    let late_avg_games_to_date = (
        Statistics::mean(late_home.iter()),
        Statistics::mean(late_away.iter()),
    );

    let report = DatasetReport {
        rows: rows.len(),
        early_rows_have_fresh_team,
        late_avg_games_to_date,
        y_margin: column_stats(rows, |r| r.y_margin),
        win_pct_diff: column_stats(rows, |r| r.features().win_pct_diff),
        last10_margin_diff: column_stats(rows, |r| r.features().last10_margin_diff),
        rest_diff: column_stats(rows, |r| r.features().rest_diff),
    };

    info!(
        "Sanity check passed: {} rows, y_margin mean {:.2} range [{:.0}, {:.0}]",
        report.rows, report.y_margin.mean, report.y_margin.min, report.y_margin.max
    );
    if late_avg_games_to_date.0 < 50.0 || late_avg_games_to_date.1 < 50.0 {
        warn!(
            "Late rows average only {:.1}/{:.1} prior games (home/away); history may be short",
            late_avg_games_to_date.0, late_avg_games_to_date.1
        );
    }
    Ok(report)
}

fn column_stats(rows: &[DatasetRow], value: impl Fn(&DatasetRow) -> f64) -> ColumnStats {
    let values: Vec<f64> = rows.iter().map(value).collect();
    ColumnStats::of(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChronologicalStateBuilder;
    use crate::game::{CompletedGames, Game};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    fn rows() -> Vec<DatasetRow> {
        let history = CompletedGames::new(vec![
            Game::completed(1, d(1), "2024-25", 1, 2, 110, 100),
            Game::completed(2, d(2), "2024-25", 2, 3, 99, 105),
            Game::completed(3, d(3), "2024-25", 3, 1, 100, 100),
            Game::completed(4, d(4), "2024-25", 1, 2, 120, 101),
        ])
        .unwrap();
        ChronologicalStateBuilder::build_dataset(&history)
    }

    #[test]
    fn csv_has_training_header_and_one_line_per_row() {
        let mut buf = Vec::new();
        write_to_writer(&mut buf, &rows()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("game_id,game_date,season,home_team_id,away_team_id,y_margin,"));
        assert!(header.ends_with("home_games_to_date,away_games_to_date"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("1,2024-11-01,2024-25,1,2,10.0,"), "{first}");
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn write_csv_creates_parent_dirs() {
        let dir = std::env::temp_dir().join("courtline_dataset_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("train.csv");
        write_csv(&path, &rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sanity_check_reports_label_stats() {
        let report = sanity_check(&rows()).unwrap();
        assert_eq!(report.rows, 4);
        assert!(report.early_rows_have_fresh_team);
        // margins: 10, -6, 0, 19
        assert!((report.y_margin.mean - 5.75).abs() < 1e-12);
        assert_eq!(report.y_margin.min, -6.0);
        assert_eq!(report.y_margin.max, 19.0);
        assert!(report.y_margin.std_dev.unwrap() > 0.0);
        assert!(report.win_pct_diff.max <= 1.0 && report.win_pct_diff.min >= -1.0);
    }

    #[test]
    fn sanity_check_rejects_empty() {
        assert!(matches!(sanity_check(&[]), Err(DatasetError::Validation(_))));
    }

    #[test]
    fn sanity_check_rejects_non_finite_features() {
        let mut rows = rows();
        rows[2].snapshot.features.home_last10_margin = f64::NAN;
        let err = sanity_check(&rows).unwrap_err();
        assert!(err.to_string().contains("home_last10_margin"), "{err}");
    }

    #[test]
    fn sanity_check_rejects_history_that_did_not_start_fresh() {
        let mut rows = rows();
        for row in &mut rows {
            row.snapshot.home_games_to_date = 5;
            row.snapshot.away_games_to_date = 5;
        }
        assert!(matches!(sanity_check(&rows), Err(DatasetError::Validation(_))));
    }

    #[test]
    fn single_row_has_no_std_dev() {
        let rows = rows();
        let report = sanity_check(&rows[..1]).unwrap();
        assert!(report.y_margin.std_dev.is_none());
    }
}
