//! YAML configuration for a discovery run
//!
//! Typed config structs with serde defaults. Unknown keys are rejected so
//! a typo in a config file fails fast instead of silently running with
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MatildaError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Database location
    pub database: DatabaseConfig,
    /// Discovery algorithm bounds
    pub algorithm: AlgorithmConfig,
    /// Resource watchdog limits
    pub monitor: MonitorConfig,
    /// Output artifact settings
    pub results: ResultsConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Optional experiment tracking settings
    pub mlflow: MlflowConfig,
}

/// Database location: either `path` + `name`, or a full `url`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// Directory containing the database file
    pub path: Option<PathBuf>,
    /// Database filename
    pub name: Option<String>,
    /// Full driver URL (`sqlite://FILE` or a bare file path)
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Resolve the configured location to a concrete SQLite file path
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(url) = &self.url {
            let path = url.strip_prefix("sqlite://").unwrap_or(url);
            return Ok(PathBuf::from(path));
        }
        match (&self.path, &self.name) {
            (Some(dir), Some(name)) => Ok(dir.join(name)),
            (None, Some(name)) => Ok(PathBuf::from(name)),
            _ => Err(MatildaError::Config(
                "database: either `url` or `path` + `name` must be set".to_string(),
            )),
        }
    }

    /// Database display name (file stem) used in artifact filenames
    pub fn display_name(&self) -> Result<String> {
        let path = self.resolve()?;
        Ok(path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string()))
    }
}

/// Bounds on the candidate search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AlgorithmConfig {
    /// Minimum support for a rule to be kept
    pub nb_occurrence: u32,
    /// Maximum atoms per rule (body + head)
    pub max_table: u32,
    /// Maximum distinct variables per rule
    pub max_vars: u32,
    /// Minimum confidence for a rule to be kept (1.0 = exact TGDs)
    pub confidence_threshold: f64,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        AlgorithmConfig {
            nb_occurrence: 3,
            max_table: 3,
            max_vars: 6,
            confidence_threshold: 1.0,
        }
    }
}

/// Resource watchdog limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MonitorConfig {
    /// Resident memory ceiling in bytes (0 disables the check)
    pub memory_threshold: u64,
    /// Wall-clock budget in seconds (fractional values honored)
    pub timeout: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            memory_threshold: 15 * 1024 * 1024 * 1024,
            timeout: 3600.0,
        }
    }
}

/// Output artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResultsConfig {
    /// Directory receiving the JSON and Markdown artifacts
    pub output_dir: PathBuf,
    /// Keep at most this many top-ranked rules (0 = unbounded)
    pub top_k: u32,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        ResultsConfig {
            output_dir: PathBuf::from("results"),
            top_k: 0,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Directory for log files (stderr only when unset)
    pub log_dir: Option<PathBuf>,
    /// Log level filter
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_dir: None,
            level: "info".to_string(),
        }
    }
}

/// Experiment tracking settings. Tracking itself is delegated to an
/// external collector; the keys are validated here so configs stay
/// portable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MlflowConfig {
    /// Whether tracking is requested
    #[serde(rename = "use")]
    pub use_tracking: bool,
    /// Tracking server URI
    pub tracking_uri: Option<String>,
    /// Experiment name
    pub experiment_name: Option<String>,
}

impl Config {
    /// Load and validate a configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MatildaError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(text)
            .map_err(|e| MatildaError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration pointing at a single SQLite file with
    /// default algorithm settings
    pub fn for_database(path: &Path) -> Config {
        Config {
            database: DatabaseConfig {
                url: Some(path.display().to_string()),
                ..DatabaseConfig::default()
            },
            ..Config::default()
        }
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.database.resolve()?;
        if self.algorithm.max_table < 2 {
            return Err(MatildaError::Config(
                "algorithm.max_table: must be at least 2 (one body atom and one head atom)"
                    .to_string(),
            ));
        }
        if self.algorithm.max_vars < 1 {
            return Err(MatildaError::Config(
                "algorithm.max_vars: must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.algorithm.confidence_threshold) {
            return Err(MatildaError::Config(
                "algorithm.confidence_threshold: must be within [0, 1]".to_string(),
            ));
        }
        if self.monitor.timeout <= 0.0 {
            return Err(MatildaError::Config(
                "monitor.timeout: must be positive".to_string(),
            ));
        }
        if self.mlflow.use_tracking && self.mlflow.tracking_uri.is_none() {
            return Err(MatildaError::Config(
                "mlflow.tracking_uri: required when mlflow.use is true".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("database:\n  url: sqlite:///tmp/db.sqlite\n").unwrap();
        assert_eq!(config.algorithm.nb_occurrence, 3);
        assert_eq!(config.algorithm.max_table, 3);
        assert_eq!(config.algorithm.max_vars, 6);
        assert_eq!(config.algorithm.confidence_threshold, 1.0);
        assert_eq!(config.monitor.timeout, 3600.0);
        assert_eq!(config.results.output_dir, PathBuf::from("results"));
        assert_eq!(config.results.top_k, 0);
    }

    #[test]
    fn test_path_name_composition() {
        let config = Config::from_yaml_str(
            "database:\n  path: /data/dbs\n  name: university.db\n",
        )
        .unwrap();
        assert_eq!(
            config.database.resolve().unwrap(),
            PathBuf::from("/data/dbs/university.db")
        );
        assert_eq!(config.database.display_name().unwrap(), "university");
    }

    #[test]
    fn test_url_prefix_stripped() {
        let config = DatabaseConfig {
            url: Some("sqlite:///tmp/x.db".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(config.resolve().unwrap(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_missing_database_rejected() {
        let err = Config::from_yaml_str("algorithm:\n  max_table: 3\n").unwrap_err();
        assert!(err.to_string().contains("database"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_yaml_str(
            "database:\n  url: /tmp/x.db\nalgorithm:\n  max_tables: 3\n",
        )
        .unwrap_err();
        assert!(matches!(err, MatildaError::Config(_)));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = Config::from_yaml_str(
            "database:\n  url: /tmp/x.db\nalgorithm:\n  max_table: 1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_table"));

        let err = Config::from_yaml_str(
            "database:\n  url: /tmp/x.db\nalgorithm:\n  confidence_threshold: 1.5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn test_mlflow_keys_recognized() {
        let config = Config::from_yaml_str(
            "database:\n  url: /tmp/x.db\nmlflow:\n  use: true\n  tracking_uri: http://localhost:5000\n  experiment_name: matilda\n",
        )
        .unwrap();
        assert!(config.mlflow.use_tracking);
    }
}
