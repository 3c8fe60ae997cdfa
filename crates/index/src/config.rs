//! Per-session engine configuration.

use serde::{Deserialize, Serialize};
use simserver_core::config::STATE_DIR;
use simserver_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// What happens to indexed documents when a new model is trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrainPolicy {
    /// Re-embed every indexed document with the new model
    Reembed,
    /// Empty the index; documents must be indexed again
    Drop,
}

/// Configuration for one index engine (session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default training method: "lsi", "tfidf" or "logentropy"
    #[serde(default = "default_method")]
    pub method: String,

    /// Upper bound on LSI topics
    #[serde(default = "default_num_topics")]
    pub num_topics: usize,

    /// Length of each precomputed neighbour list
    #[serde(default = "default_neighbor_cap")]
    pub neighbor_cap: usize,

    #[serde(default = "default_retrain_policy")]
    pub retrain_policy: RetrainPolicy,

    /// Drop tokens found in fewer documents than this
    #[serde(default = "default_no_below")]
    pub no_below: u32,

    /// Drop tokens found in more than this fraction of documents
    #[serde(default = "default_no_above")]
    pub no_above: f32,

    /// Vocabulary size limit
    #[serde(default = "default_keep_n")]
    pub keep_n: usize,
}

fn default_method() -> String {
    "lsi".to_string()
}

fn default_num_topics() -> usize {
    400
}

fn default_neighbor_cap() -> usize {
    100
}

fn default_retrain_policy() -> RetrainPolicy {
    RetrainPolicy::Reembed
}

fn default_no_below() -> u32 {
    2
}

fn default_no_above() -> f32 {
    0.5
}

fn default_keep_n() -> usize {
    100_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            num_topics: default_num_topics(),
            neighbor_cap: default_neighbor_cap(),
            retrain_policy: default_retrain_policy(),
            no_below: default_no_below(),
            no_above: default_no_above(),
            keep_n: default_keep_n(),
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.neighbor_cap == 0 {
            return Err(AppError::Config("neighbor_cap must be at least 1".to_string()));
        }
        if self.num_topics == 0 {
            return Err(AppError::Config("num_topics must be at least 1".to_string()));
        }
        if !(self.no_above > 0.0 && self.no_above <= 1.0) {
            return Err(AppError::Config(format!(
                "no_above must be in (0, 1], got {}",
                self.no_above
            )));
        }
        Ok(())
    }
}

/// Load a session's engine configuration.
///
/// Loads from `.simserver/sessions/<session>/config.yaml` if it exists,
/// otherwise returns the defaults.
pub fn load_config(workspace: &Path, session: &str) -> AppResult<EngineConfig> {
    let config_path = get_config_path(workspace, session);

    if !config_path.exists() {
        tracing::debug!(
            "Using default engine config for session '{}' (no config file found)",
            session
        );
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: EngineConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;
    config.validate()?;

    tracing::debug!("Loaded engine config for session '{}'", session);
    Ok(config)
}

/// Save a session's engine configuration.
pub fn save_config(workspace: &Path, session: &str, config: &EngineConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, session);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved engine config for session '{}'", session);
    Ok(())
}

/// Get the directory holding one session's files.
pub fn get_session_dir(workspace: &Path, session: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("sessions").join(session)
}

/// Get the path to a session's config file.
pub fn get_config_path(workspace: &Path, session: &str) -> PathBuf {
    get_session_dir(workspace, session).join("config.yaml")
}

/// Get the SQLite database path for a session.
pub fn get_index_path(workspace: &Path, session: &str) -> PathBuf {
    get_session_dir(workspace, session).join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "default").unwrap();

        assert_eq!(config.method, "lsi");
        assert_eq!(config.neighbor_cap, 100);
        assert_eq!(config.retrain_policy, RetrainPolicy::Reembed);
        assert_eq!(config.no_below, 2);
        assert_eq!(config.no_above, 0.5);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig {
            method: "tfidf".to_string(),
            neighbor_cap: 5,
            retrain_policy: RetrainPolicy::Drop,
            ..Default::default()
        };

        save_config(temp.path(), "news", &config).unwrap();
        let loaded = load_config(temp.path(), "news").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "neighbor_cap: 7\nretrain_policy: drop\n").unwrap();

        let config = load_config(temp.path(), "partial").unwrap();
        assert_eq!(config.neighbor_cap, 7);
        assert_eq!(config.retrain_policy, RetrainPolicy::Drop);
        assert_eq!(config.method, "lsi");
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = EngineConfig {
            neighbor_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_paths() {
        let workspace = Path::new("/ws");
        assert_eq!(
            get_index_path(workspace, "s1"),
            PathBuf::from("/ws/.simserver/sessions/s1/index.sqlite")
        );
    }
}
