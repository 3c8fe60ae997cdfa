//! Configuration management for the similarity server.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Config files (.simserver/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: every session lives under
//! `.simserver/sessions/<name>/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the state directory inside a workspace.
pub const STATE_DIR: &str = ".simserver";

/// Main application configuration.
///
/// Holds the global options that affect every command. Engine tuning
/// (training method, neighbour cap, retrain policy) is per session and lives
/// in the index crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .simserver/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Session (named index) to operate on
    pub session: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    session: Option<SessionConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionConfig {
    default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            session: "default".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `SIMSERVER_WORKSPACE`: Override workspace path
    /// - `SIMSERVER_CONFIG`: Path to config file
    /// - `SIMSERVER_SESSION`: Session name
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use simserver_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with_file(None)
    }

    /// Like [`AppConfig::load`], reading `config_file` instead of the
    /// `SIMSERVER_CONFIG` / default config file when given.
    pub fn load_with_file(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SIMSERVER_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        config.config_file = config_file.or_else(|| {
            std::env::var("SIMSERVER_CONFIG")
                .ok()
                .map(PathBuf::from)
        });

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(session) = std::env::var("SIMSERVER_SESSION") {
            config.session = session;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(session) = config_file.session.and_then(|s| s.default) {
            result.session = session;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        session: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(session) = session {
            self.session = session;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .simserver directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .simserver directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Session names become directory names, so they are restricted to
    /// ASCII alphanumerics, `-` and `_`.
    pub fn validate(&self) -> AppResult<()> {
        let valid = !self.session.is_empty()
            && self
                .session
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(AppError::Config(format!(
                "Invalid session name '{}': use letters, digits, '-' or '_'",
                self.session
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.session, "default");
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_state_dir() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(STATE_DIR));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden =
            config.with_overrides(None, Some("news".to_string()), None, true, false);

        assert_eq!(overridden.session, "news");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "session:\n  default: papers\nlogging:\n  level: warn\n  color: false\n",
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.session, "papers");
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_validate_session_name() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.session = "../escape".to_string();
        assert!(config.validate().is_err());

        config.session = String::new();
        assert!(config.validate().is_err());
    }
}
