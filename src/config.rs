// src/config.rs - Application settings: JSON file, platform config dir, env overrides
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::fsm::FsmConfig;
use crate::hybrid::ScoringConfig;
use crate::session::SessionConfig;
use crate::tracking::TrackerConfig;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// External model process to launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Class names the model can emit, advertised alongside the rule names.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ClassifierCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub fsm: FsmConfig,
    pub tracker: TrackerConfig,
    /// Read by `SessionRegistry`; the single-stream binary has no sessions.
    pub session: SessionConfig,
    pub classifier: Option<ClassifierCommand>,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            fsm: FsmConfig::default(),
            tracker: TrackerConfig::default(),
            session: SessionConfig::default(),
            classifier: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `<platform config dir>/config.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "mudra_tracker").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The file `load` reads: the explicit path, else the platform file if it
    /// exists. `None` means built-in defaults.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        }
    }

    /// An explicit path must exist; the platform file is optional.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_source(Self::locate(explicit).as_deref())
    }

    /// Reads `source` (or defaults for `None`) and applies the environment.
    pub fn load_source(source: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.log_level = env_or("MUDRA_LOG", &self.log_level);
        self.tracker.classifier_timeout_ms = env_or_parse("MUDRA_CLASSIFIER_TIMEOUT_MS", self.tracker.classifier_timeout_ms);
        self.tracker.steadiness_gate = env_or_bool("MUDRA_STEADINESS_GATE", self.tracker.steadiness_gate);
        self.session.idle_timeout_secs = env_or_parse("MUDRA_SESSION_IDLE_SECS", self.session.idle_timeout_secs);
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Failed to parse env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_keys() {
        for key in [
            "MUDRA_LOG",
            "MUDRA_CLASSIFIER_TIMEOUT_MS",
            "MUDRA_STEADINESS_GATE",
            "MUDRA_SESSION_IDLE_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_are_the_canonical_parameter_set() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scoring.rule_weight, 1.2);
        assert_eq!(cfg.scoring.ml_floor, 0.3);
        assert_eq!(cfg.scoring.hybrid_threshold, 0.55);
        assert_eq!(cfg.fsm.enter_threshold, 3);
        assert_eq!(cfg.fsm.exit_threshold, 3);
        assert_eq!(cfg.fsm.max_mismatch, 2);
        assert_eq!(cfg.fsm.confusable_enter_threshold, 8);
        assert_eq!(cfg.tracker.classifier_timeout_ms, 150);
        assert!(!cfg.tracker.steadiness_gate);
        assert_eq!(cfg.session.idle_timeout_secs, 60);
        assert!(cfg.classifier.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fsm":{{"enter_threshold":5}},"classifier":{{"program":"python3","args":["infer.py"]}}}}"#
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.fsm.enter_threshold, 5);
        assert_eq!(cfg.fsm.exit_threshold, 3);
        assert_eq!(cfg.fsm.confusable_pairs.len(), 6);
        let cmd = cfg.classifier.unwrap();
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args, vec!["infer.py".to_string()]);
        assert!(cmd.labels.is_empty());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn explicit_path_wins_even_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(AppConfig::locate(Some(&path)), Some(path.clone()));
        if let Some(found) = AppConfig::locate(None) {
            assert!(found.exists());
        }
    }

    #[test]
    fn no_source_means_defaults() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys();
        let cfg = AppConfig::load_source(None).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.fsm.enter_threshold, 3);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys();

        env::set_var("MUDRA_CLASSIFIER_TIMEOUT_MS", "400");
        env::set_var("MUDRA_STEADINESS_GATE", "on");
        env::set_var("MUDRA_SESSION_IDLE_SECS", "soon");

        let mut cfg = AppConfig::default();
        cfg.apply_env();
        assert_eq!(cfg.tracker.classifier_timeout_ms, 400);
        assert!(cfg.tracker.steadiness_gate);
        assert_eq!(cfg.session.idle_timeout_secs, 60);

        clear_keys();
    }
}
