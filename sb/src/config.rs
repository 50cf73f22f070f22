//! sharedbus configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Output format for scenario reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Main sharedbus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Default report format for `sb run`
    pub format: OutputFormat,

    /// Directory relative scenario paths are resolved against
    #[serde(rename = "scenario-dir")]
    pub scenario_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            format: OutputFormat::default(),
            scenario_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise the first readable file among
    /// [`Config::search_paths`] wins; unreadable candidates are skipped with
    /// a warning, and defaults apply when none is found.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::search_paths().iter().filter(|path| path.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Config::load: skipping unreadable config"),
            }
        }

        tracing::debug!("Config::load: no config file found, using defaults");
        Ok(Self::default())
    }

    /// Implicit config locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        [
            Some(PathBuf::from(".sharedbus.yml")),
            dirs::config_dir().map(|dir| dir.join("sharedbus").join("sharedbus.yml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::debug!(path = %path.display(), "Config::load_from_file: loaded");
        Ok(config)
    }

    /// Resolve a scenario path against `scenario_dir` unless it is absolute
    pub fn scenario_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.scenario_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_level.is_none());
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.scenario_dir, PathBuf::from("."));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
format: json
scenario-dir: /srv/scenarios
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.scenario_dir, PathBuf::from("/srv/scenarios"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("format: json\n").unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.log_level.is_none());
        assert_eq!(config.scenario_dir, PathBuf::from("."));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sharedbus.yml");
        fs::write(&path, "log-level: warn\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_search_paths_prefer_project_local() {
        let paths = Config::search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(".sharedbus.yml")));
        assert!(paths.iter().skip(1).all(|path| path.ends_with("sharedbus/sharedbus.yml")));
    }

    #[test]
    fn test_load_invalid_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yml");
        fs::write(&path, "format: [not, a, format]\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:?}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_scenario_path_resolution() {
        let config = Config {
            scenario_dir: PathBuf::from("/srv/scenarios"),
            ..Default::default()
        };
        assert_eq!(
            config.scenario_path(Path::new("chat.yml")),
            PathBuf::from("/srv/scenarios/chat.yml")
        );
        assert_eq!(config.scenario_path(Path::new("/tmp/x.yml")), PathBuf::from("/tmp/x.yml"));
    }
}
