use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::PrivateAccess;
use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub db_path: PathBuf,
    /// Page size used when a search does not ask for one.
    pub default_limit: u32,
    /// Upper bound applied to every requested page size.
    pub max_limit: u32,
    /// How long a writer waits for another connection's lock before
    /// reporting a conflict.
    pub busy_timeout_ms: u64,
    pub private_access: PrivateAccess,
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            return Err(Error::Config("max_limit must be positive".to_string()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(Error::Config(format!(
                "default_limit must be between 1 and max_limit ({})",
                self.max_limit
            )));
        }
        Ok(())
    }

    /// Resolves a requested page size against the configured default and cap.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/pepstore.db"),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            busy_timeout_ms: 5_000,
            private_access: PrivateAccess::Conceal,
        }
    }
}
