// courtline entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; stdout carries JSON output)
// 2. Load config
// 3. Open database
// 4. Run the requested mode: `picks` (default), `dataset`, or `backtest [N]`

use std::path::Path;

use anyhow::{bail, Context};
use chrono::{Days, Local};
use tracing::info;

use courtline_core::backtest;
use courtline_core::builder::ChronologicalStateBuilder;
use courtline_core::config::{self, Config};
use courtline_core::dataset;
use courtline_core::db::Database;
use courtline_core::inference::MarginInference;
use courtline_core::model::LinearMarginModel;
use courtline_core::selector::RecommendationSummary;
use courtline_core::service::RecommendationService;

enum Mode {
    Picks,
    Dataset,
    Backtest { samples: usize },
}

fn parse_mode(args: &[String]) -> anyhow::Result<Mode> {
    match args.first().map(String::as_str) {
        None | Some("picks") => Ok(Mode::Picks),
        Some("dataset") => Ok(Mode::Dataset),
        Some("backtest") => {
            let samples = match args.get(1) {
                Some(n) => n
                    .parse()
                    .with_context(|| format!("invalid backtest sample count '{n}'"))?,
                None => backtest::DEFAULT_SAMPLES,
            };
            Ok(Mode::Backtest { samples })
        }
        Some(other) => bail!("unknown mode '{other}' (expected picks, dataset, or backtest)"),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("courtline starting up");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_mode(&args)?;

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: sigma={}, max_spread={}",
        config.model.sigma, config.selection.max_spread
    );

    let db = Database::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    match mode {
        Mode::Picks => run_picks(&config, &db),
        Mode::Dataset => run_dataset(&config, &db),
        Mode::Backtest { samples } => run_backtest(&config, &db, samples),
    }
}

fn load_model(config: &Config) -> anyhow::Result<LinearMarginModel> {
    let path = Path::new(&config.model.artifact_path);
    LinearMarginModel::load(path)
        .with_context(|| format!("failed to load margin model from {}", path.display()))
}

fn run_picks(config: &Config, db: &Database) -> anyhow::Result<()> {
    let model = load_model(config)?;
    let history = db
        .load_completed_games(None)
        .context("failed to load completed games")?;

    let today = Local::now().date_naive();
    let until = today
        .checked_add_days(Days::new(u64::from(config.schedule.days_ahead)))
        .context("schedule window overflows the calendar")?;
    let games = db
        .load_upcoming_games(today, until)
        .context("failed to load upcoming games")?;
    info!("{} upcoming games between {today} and {until}", games.len());

    let inference = MarginInference::new(history, model);
    let mut service = RecommendationService::from_config(inference, config);
    let recs = service.recommend_all(&games, db);

    for rec in &recs {
        println!("{}", serde_json::to_string(rec).context("failed to serialize recommendation")?);
    }

    let plain: Vec<_> = recs.into_iter().map(|r| r.recommendation).collect();
    let summary = RecommendationSummary::from_recommendations(&plain);
    println!("{}", serde_json::json!({ "summary": summary }));
    Ok(())
}

fn run_dataset(config: &Config, db: &Database) -> anyhow::Result<()> {
    info!("Building dataset for seasons {:?}", config.dataset.seasons);
    let history = db
        .load_completed_games(Some(config.dataset.seasons.as_slice()))
        .context("failed to load completed games")?;

    let rows = ChronologicalStateBuilder::build_dataset(&history);
    let report = dataset::sanity_check(&rows).context("dataset failed sanity check")?;

    let output = Path::new(&config.dataset.output_path);
    dataset::write_csv(output, &rows).context("failed to write dataset")?;

    println!(
        "{}",
        serde_json::to_string(&report).context("failed to serialize dataset report")?
    );
    Ok(())
}

fn run_backtest(config: &Config, db: &Database, samples: usize) -> anyhow::Result<()> {
    let model = load_model(config)?;
    let history = db
        .load_completed_games(None)
        .context("failed to load completed games")?;

    let sample = backtest::evenly_spaced(&history, samples);
    let mut inference = MarginInference::new(history, model);
    match backtest::spot_check(&mut inference, &sample) {
        Some(report) => println!(
            "{}",
            serde_json::to_string(&report).context("failed to serialize backtest report")?
        ),
        None => info!("No completed games to backtest"),
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("courtline.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtline=info,courtline_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_mode_is_picks() {
        assert!(matches!(parse_mode(&[]).unwrap(), Mode::Picks));
        assert!(matches!(parse_mode(&args(&["picks"])).unwrap(), Mode::Picks));
    }

    #[test]
    fn backtest_sample_count() {
        match parse_mode(&args(&["backtest", "20"])).unwrap() {
            Mode::Backtest { samples } => assert_eq!(samples, 20),
            _ => panic!("expected backtest"),
        }
        match parse_mode(&args(&["backtest"])).unwrap() {
            Mode::Backtest { samples } => assert_eq!(samples, backtest::DEFAULT_SAMPLES),
            _ => panic!("expected backtest"),
        }
        assert!(parse_mode(&args(&["backtest", "many"])).is_err());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(parse_mode(&args(&["train"])).is_err());
        assert!(matches!(parse_mode(&args(&["dataset"])).unwrap(), Mode::Dataset));
    }
}
