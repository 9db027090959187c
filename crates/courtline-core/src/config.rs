// Configuration loading and validation (courtline.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::odds::DEFAULT_LINE_BAND;
use crate::selector::{SelectionThresholds, TierThreshold};

/// Name of the single config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "courtline.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// courtline.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub artifact_path: String,
    /// Standard deviation of the realized margin around the prediction.
    pub sigma: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            artifact_path: "artifacts/margin_model.json".into(),
            sigma: 14.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_spread: f64,
    pub high_min_ev: f64,
    pub high_min_prob: f64,
    pub medium_min_ev: f64,
    pub medium_min_prob: f64,
    pub low_min_ev: f64,
    pub low_min_prob: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let t = SelectionThresholds::default();
        SelectionConfig {
            max_spread: t.max_spread,
            high_min_ev: t.high.min_ev,
            high_min_prob: t.high.min_prob,
            medium_min_ev: t.medium.min_ev,
            medium_min_prob: t.medium.min_prob,
            low_min_ev: t.low.min_ev,
            low_min_prob: t.low.min_prob,
        }
    }
}

impl SelectionConfig {
    pub fn thresholds(&self) -> SelectionThresholds {
        SelectionThresholds {
            max_spread: self.max_spread,
            high: TierThreshold {
                min_ev: self.high_min_ev,
                min_prob: self.high_min_prob,
            },
            medium: TierThreshold {
                min_ev: self.medium_min_ev,
                min_prob: self.medium_min_prob,
            },
            low: TierThreshold {
                min_ev: self.low_min_ev,
                min_prob: self.low_min_prob,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    /// Spread quotes further than this from the median line are excluded
    /// from the consensus prices.
    pub line_band: f64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        OddsConfig {
            line_band: DEFAULT_LINE_BAND,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "courtline.db".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub seasons: Vec<String>,
    pub output_path: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            seasons: vec!["2022-23".into(), "2023-24".into(), "2024-25".into()],
            output_path: "data/margin_training_data.csv".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Upcoming games from today through today + `days_ahead`.
    pub days_ahead: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig { days_ahead: 3 }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate `config/courtline.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()` for normal startup.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying shipped
/// defaults into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message,
    }
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let sigma = config.model.sigma;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(invalid("model.sigma", format!("must be > 0, got {sigma}")));
    }

    let sel = &config.selection;
    if !(sel.max_spread.is_finite() && sel.max_spread > 0.0) {
        return Err(invalid(
            "selection.max_spread",
            format!("must be > 0, got {}", sel.max_spread),
        ));
    }

    let probs: &[(&str, f64)] = &[
        ("selection.high_min_prob", sel.high_min_prob),
        ("selection.medium_min_prob", sel.medium_min_prob),
        ("selection.low_min_prob", sel.low_min_prob),
    ];
    for (name, p) in probs {
        if !(0.0..=1.0).contains(p) {
            return Err(invalid(
                name,
                format!("must be between 0.0 and 1.0 inclusive, got {p}"),
            ));
        }
    }

    let evs: &[(&str, f64)] = &[
        ("selection.high_min_ev", sel.high_min_ev),
        ("selection.medium_min_ev", sel.medium_min_ev),
        ("selection.low_min_ev", sel.low_min_ev),
    ];
    for (name, ev) in evs {
        if !ev.is_finite() {
            return Err(invalid(name, format!("must be finite, got {ev}")));
        }
    }

    // HIGH must be at least as strict as MEDIUM, MEDIUM as LOW.
    if sel.high_min_ev < sel.medium_min_ev || sel.medium_min_ev < sel.low_min_ev {
        return Err(invalid(
            "selection.*_min_ev",
            "tier EV thresholds must satisfy high >= medium >= low".into(),
        ));
    }
    if sel.high_min_prob < sel.medium_min_prob || sel.medium_min_prob < sel.low_min_prob {
        return Err(invalid(
            "selection.*_min_prob",
            "tier probability thresholds must satisfy high >= medium >= low".into(),
        ));
    }

    let band = config.odds.line_band;
    if !(band.is_finite() && band >= 0.0) {
        return Err(invalid("odds.line_band", format!("must be >= 0, got {band}")));
    }

    if config.dataset.seasons.is_empty() {
        return Err(invalid("dataset.seasons", "must list at least one season".into()));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root holding the shipped `defaults/` directory.
    fn project_root() -> PathBuf {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(
            root.join("defaults").exists(),
            "Cannot locate defaults/ directory from {:?}",
            root
        );
        root
    }

    /// Fresh temp dir with `config/courtline.toml` containing `body`.
    fn write_config(name: &str, body: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), body).unwrap();
        tmp
    }

    fn shipped_defaults() -> String {
        fs::read_to_string(project_root().join("defaults").join(CONFIG_FILE)).unwrap()
    }

    fn expect_validation_field(base: &Path, want: &str) {
        match load_config_from(base).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, want),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn shipped_defaults_load_and_match_builtin_values() {
        let tmp = write_config("courtline_config_defaults", &shipped_defaults());
        let config = load_config_from(&tmp).expect("should load shipped defaults");

        assert_eq!(config.model.sigma, 14.4);
        assert_eq!(config.model.artifact_path, "artifacts/margin_model.json");
        assert_eq!(config.selection.thresholds(), SelectionThresholds::default());
        assert_eq!(config.odds.line_band, 0.5);
        assert_eq!(config.database.path, "courtline.db");
        assert_eq!(config.dataset.seasons.len(), 3);
        assert_eq!(config.schedule.days_ahead, 3);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let body = "[model]\nartifact_path = \"m.json\"\nsigma = 12.0\n";
        let tmp = write_config("courtline_config_partial", body);
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.model.sigma, 12.0);
        assert_eq!(config.selection.max_spread, 14.0);
        assert_eq!(config.dataset.output_path, "data/margin_training_data.csv");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partial_sections_fill_missing_keys() {
        let body = r#"
[model]
sigma = 11.5

[selection]
max_spread = 10.0

[dataset]
output_path = "out.csv"
"#;
        let tmp = write_config("courtline_config_partial_keys", body);
        let config = load_config_from(&tmp).expect("partial sections should load");
        assert_eq!(config.model.sigma, 11.5);
        assert_eq!(config.model.artifact_path, "artifacts/margin_model.json");
        assert_eq!(config.selection.max_spread, 10.0);
        assert_eq!(config.selection.high_min_prob, 0.60);
        assert_eq!(config.dataset.output_path, "out.csv");
        assert_eq!(config.dataset.seasons.len(), 3);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_positive_sigma() {
        let body = shipped_defaults().replace("sigma = 14.4", "sigma = 0.0");
        let tmp = write_config("courtline_config_sigma", &body);
        expect_validation_field(&tmp, "model.sigma");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let body = shipped_defaults().replace("high_min_prob = 0.60", "high_min_prob = 1.5");
        let tmp = write_config("courtline_config_prob", &body);
        expect_validation_field(&tmp, "selection.high_min_prob");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_inverted_tiers() {
        let body = shipped_defaults().replace("medium_min_ev = 0.03", "medium_min_ev = 0.08");
        let tmp = write_config("courtline_config_tiers", &body);
        expect_validation_field(&tmp, "selection.*_min_ev");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_seasons() {
        let body = shipped_defaults().replace(
            "seasons = [\"2022-23\", \"2023-24\", \"2024-25\"]",
            "seasons = []",
        );
        let tmp = write_config("courtline_config_seasons", &body);
        expect_validation_field(&tmp, "dataset.seasons");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("courtline_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = write_config("courtline_config_parse", "[model\nsigma = ");
        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("courtline_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join(CONFIG_FILE), shipped_defaults()).unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config").join(CONFIG_FILE).exists());
        assert!(load_config_from(&tmp).is_ok());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = write_config("courtline_config_ensure_skips", "# custom\n");
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults").join(CONFIG_FILE), shipped_defaults()).unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert!(copied.is_empty());
        let content = fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("courtline_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
