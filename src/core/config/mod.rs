//! core::config
//!
//! Configuration loading and precedence.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config file
//! 3. Repository config file
//! 4. Builder overrides applied by the caller (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$MEMBRANCH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/membranch/config.toml`
//! 3. `~/.membranch/config.toml`
//!
//! # Repo Config Location
//!
//! `<git-dir>/membranch/config.toml`, which keeps it out of the working tree
//! and out of every branch.
//!
//! # Example
//!
//! ```no_run
//! use membranch::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! println!("memory branches live under {}", config.branch_prefix());
//! println!("remote: {}", config.remote());
//! ```

pub mod schema;

pub use schema::{ConfigFile, IdentityConfig, RefUpdateMode};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::naming::{normalize_prefix, sanitize_branch, DEFAULT_BRANCH_PREFIX};
use crate::core::types::BranchName;

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV: &str = "MEMBRANCH_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: the repository file beats the global file,
/// which beats the built-in default.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: ConfigFile,
    /// Repository configuration (if found)
    pub repo: Option<ConfigFile>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// `git_dir` is the repository's git directory; pass `None` to load only
    /// the global file. Missing files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), git_dir)
    }

    /// Load configuration from an explicit global file path.
    pub fn load_from(global: Option<&Path>, git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = match global {
            Some(path) if path.exists() => (Self::read_file(path)?, Some(path.to_path_buf())),
            _ => (ConfigFile::default(), None),
        };

        let (repo, repo_path) = match git_dir.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_file(&path)?), Some(path)),
            _ => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Locate the global config file, if one exists.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("membranch/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".membranch/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// `<git-dir>/membranch/config.toml`.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("membranch/config.toml")
    }

    /// Pick the repo value, then the global value.
    fn pick<T>(&self, field: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.repo
            .as_ref()
            .and_then(&field)
            .or_else(|| field(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Memory branch prefix, always ending in `/`. Defaults to `memory/`.
    pub fn branch_prefix(&self) -> String {
        self.pick(|c| c.branch_prefix.as_deref().map(normalize_prefix))
            .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string())
    }

    /// Branch used when the caller names none. Defaults to `<prefix>main`.
    pub fn default_branch(&self) -> Result<BranchName, ConfigError> {
        let prefix = self.branch_prefix();
        let raw = self
            .pick(|c| c.default_branch.clone())
            .unwrap_or_else(|| format!("{}main", prefix));
        sanitize_branch(&raw, &prefix)
            .map_err(|e| ConfigError::InvalidValue(format!("invalid default_branch: {}", e)))
    }

    /// Remote name. Defaults to `origin`.
    pub fn remote(&self) -> String {
        self.pick(|c| c.remote.clone())
            .unwrap_or_else(|| "origin".to_string())
    }

    /// Branches that can never be force-pushed. Defaults to `main`, `master`.
    pub fn protected_branches(&self) -> Vec<String> {
        self.pick(|c| c.protected_branches.clone())
            .unwrap_or_else(|| vec!["main".to_string(), "master".to_string()])
    }

    /// Local command timeout. Defaults to 30 seconds.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.pick(|c| c.timeout_secs).unwrap_or(30))
    }

    /// Network command timeout. Defaults to 30 seconds.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.pick(|c| c.network_timeout_secs).unwrap_or(30))
    }

    /// Whether persist publishes automatically. Defaults to `false`.
    pub fn auto_push(&self) -> bool {
        self.pick(|c| c.auto_push).unwrap_or(false)
    }

    /// Ref update policy. Defaults to last-writer-wins.
    pub fn ref_update(&self) -> RefUpdateMode {
        self.pick(|c| c.ref_update).unwrap_or_default()
    }

    /// Compare-and-swap attempts. Defaults to 3.
    pub fn cas_attempts(&self) -> u32 {
        self.pick(|c| c.cas_attempts).unwrap_or(3)
    }

    /// Whether `list_branches` queries the remote. Defaults to `true`.
    pub fn list_remote(&self) -> bool {
        self.pick(|c| c.list_remote).unwrap_or(true)
    }

    /// Explicit git executable, if configured.
    pub fn git_path(&self) -> Option<PathBuf> {
        self.pick(|c| c.git_path.clone()).map(PathBuf::from)
    }

    /// Commit identity override, field by field.
    pub fn identity(&self) -> IdentityConfig {
        IdentityConfig {
            name: self.pick(|c| c.identity.as_ref().and_then(|i| i.name.clone())),
            email: self.pick(|c| c.identity.as_ref().and_then(|i| i.email.clone())),
        }
    }

    /// Resolve every accessor into one [`Settings`] value.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            branch_prefix: self.branch_prefix(),
            default_branch: self.default_branch()?,
            remote: self.remote(),
            protected_branches: self.protected_branches(),
            timeout: self.timeout(),
            network_timeout: self.network_timeout(),
            auto_push: self.auto_push(),
            ref_update: self.ref_update(),
            cas_attempts: self.cas_attempts(),
            list_remote: self.list_remote(),
            git_path: self.git_path(),
            identity: self.identity(),
        })
    }

    /// Path of the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path of the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

/// Fully resolved configuration.
///
/// Fields are public so callers can apply explicit overrides (the last
/// precedence layer) before handing the value on.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub branch_prefix: String,
    pub default_branch: BranchName,
    pub remote: String,
    pub protected_branches: Vec<String>,
    pub timeout: Duration,
    pub network_timeout: Duration,
    pub auto_push: bool,
    pub ref_update: RefUpdateMode,
    pub cas_attempts: u32,
    pub list_remote: bool,
    pub git_path: Option<PathBuf>,
    pub identity: IdentityConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_files() {
        let config = Config::load_from(None, None).unwrap();

        assert_eq!(config.branch_prefix(), "memory/");
        assert_eq!(config.default_branch().unwrap().as_str(), "memory/main");
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.protected_branches(), vec!["main", "master"]);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.auto_push());
        assert_eq!(config.ref_update(), RefUpdateMode::LastWriterWins);
        assert_eq!(config.cas_attempts(), 3);
        assert!(config.list_remote());
        assert!(config.git_path().is_none());
    }

    #[test]
    fn loads_repo_file_from_git_dir() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        write(
            &git_dir,
            "membranch/config.toml",
            r#"
            remote = "upstream"
            auto_push = true
            "#,
        );

        let config = Config::load_from(None, Some(&git_dir)).unwrap();
        assert_eq!(config.remote(), "upstream");
        assert!(config.auto_push());
        assert!(config.repo_config_loaded_from().is_some());
    }

    #[test]
    fn repo_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = write(
            temp.path(),
            "global.toml",
            r#"
            remote = "global-remote"
            timeout_secs = 5

            [identity]
            name = "Global Name"
            email = "global@example.com"
            "#,
        );
        let git_dir = temp.path().join("repo/.git");
        write(
            &git_dir,
            "membranch/config.toml",
            r#"
            remote = "repo-remote"

            [identity]
            email = "repo@example.com"
            "#,
        );

        let config = Config::load_from(Some(&global), Some(&git_dir)).unwrap();
        assert_eq!(config.remote(), "repo-remote");
        assert_eq!(config.timeout(), Duration::from_secs(5));

        let identity = config.identity();
        assert_eq!(identity.name.as_deref(), Some("Global Name"));
        assert_eq!(identity.email.as_deref(), Some("repo@example.com"));
    }

    #[test]
    fn custom_prefix_feeds_default_branch() {
        let temp = TempDir::new().unwrap();
        let global = write(temp.path(), "g.toml", "branch_prefix = \"coord\"");

        let config = Config::load_from(Some(&global), None).unwrap();
        assert_eq!(config.branch_prefix(), "coord/");
        assert_eq!(config.default_branch().unwrap().as_str(), "coord/main");
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let global = write(temp.path(), "g.toml", "trunk = \"main\"");

        let err = Config::load_from(Some(&global), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let global = write(temp.path(), "g.toml", "network_timeout_secs = 0");

        let err = Config::load_from(Some(&global), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn settings_snapshot_matches_accessors() {
        let temp = TempDir::new().unwrap();
        let global = write(
            temp.path(),
            "g.toml",
            "ref_update = \"compare-and-swap\"\ncas_attempts = 7\nlist_remote = false",
        );

        let settings = Config::load_from(Some(&global), None)
            .unwrap()
            .settings()
            .unwrap();
        assert_eq!(settings.ref_update, RefUpdateMode::CompareAndSwap);
        assert_eq!(settings.cas_attempts, 7);
        assert!(!settings.list_remote);
        assert_eq!(settings.default_branch.as_str(), "memory/main");
    }

    #[test]
    fn missing_global_path_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(Some(&temp.path().join("absent.toml")), None).unwrap();
        assert!(config.global_config_loaded_from().is_none());
        assert_eq!(config.remote(), "origin");
    }
}
