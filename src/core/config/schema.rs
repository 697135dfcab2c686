//! core::config::schema
//!
//! Configuration file schema.
//!
//! The same schema is used for the global (user) file and the per-repository
//! file; every key is optional so a file only needs to mention what it
//! overrides.
//!
//! # Example
//!
//! ```toml
//! branch_prefix = "memory/"
//! default_branch = "memory/main"
//! remote = "origin"
//! protected_branches = ["main", "master", "release"]
//! timeout_secs = 30
//! network_timeout_secs = 60
//! auto_push = false
//! ref_update = "compare-and-swap"
//! cas_attempts = 5
//!
//! [identity]
//! name = "Coordinator"
//! email = "coordinator@example.com"
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::naming::{normalize_prefix, sanitize_branch};
use crate::core::types::BranchName;

/// How a memory branch ref is moved to a freshly written commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefUpdateMode {
    /// Unconditional ref write; a concurrent writer's commit can be dropped.
    #[default]
    LastWriterWins,
    /// Ref write only if the tip still equals the parent the commit was built on.
    CompareAndSwap,
}

/// One configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Prefix shared by all memory branches.
    pub branch_prefix: Option<String>,

    /// Branch used when a caller does not name one.
    pub default_branch: Option<String>,

    /// Remote used for fetch/push.
    pub remote: Option<String>,

    /// Branches that may never be force-pushed.
    pub protected_branches: Option<Vec<String>>,

    /// Timeout for local plumbing commands.
    pub timeout_secs: Option<u64>,

    /// Timeout for fetch, push and ls-remote.
    pub network_timeout_secs: Option<u64>,

    /// Publish after every successful persist.
    pub auto_push: Option<bool>,

    /// Ref update policy.
    pub ref_update: Option<RefUpdateMode>,

    /// Attempts before a compare-and-swap persist gives up.
    pub cas_attempts: Option<u32>,

    /// Query the remote directly when listing branches.
    pub list_remote: Option<bool>,

    /// Explicit path to the git executable.
    pub git_path: Option<String>,

    /// Commit identity override.
    pub identity: Option<IdentityConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self
            .branch_prefix
            .as_deref()
            .map(normalize_prefix)
            .unwrap_or_else(|| crate::core::naming::DEFAULT_BRANCH_PREFIX.to_string());
        BranchName::new(format!("{}x", prefix)).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid branch_prefix: {}", e))
        })?;

        if let Some(branch) = &self.default_branch {
            sanitize_branch(branch, &prefix).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default_branch: {}", e))
            })?;
        }

        if let Some(remote) = &self.remote {
            // A leading '-' would be parsed as an option by fetch and push.
            if remote.trim().is_empty()
                || remote.starts_with('-')
                || remote.contains(char::is_whitespace)
            {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid remote name '{}'",
                    remote
                )));
            }
        }

        if let Some(protected) = &self.protected_branches {
            for name in protected {
                BranchName::new(name.as_str()).map_err(|e| {
                    ConfigError::InvalidValue(format!("invalid protected branch: {}", e))
                })?;
            }
        }

        for (key, value) in [
            ("timeout_secs", self.timeout_secs),
            ("network_timeout_secs", self.network_timeout_secs),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!("{} must be positive", key)));
            }
        }

        if self.cas_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "cas_attempts must be at least 1".to_string(),
            ));
        }

        if let Some(identity) = &self.identity {
            identity.validate()?;
        }

        Ok(())
    }
}

/// Author/committer identity for memory commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl IdentityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for value in [&self.name, &self.email].into_iter().flatten() {
            if value.trim().is_empty() || value.contains(['<', '>', '\n']) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid identity value '{}'",
                    value
                )));
            }
        }
        Ok(())
    }
}
