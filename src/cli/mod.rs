mod commands;
mod project;
mod search;

pub use commands::{Commands, NamespaceOrderArg, SortArg};
pub use project::{
    run_delete, run_digest, run_fork, run_pull, run_push, run_update, sample_count,
};
pub use search::{run_namespaces, run_search, run_stats};

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::agent::PepAgent;
use crate::config::AgentConfig;
use crate::types::CallerContext;

/// Resolves the configuration file and command line overrides.
pub fn load_config(config: Option<&Path>, db: Option<PathBuf>) -> anyhow::Result<AgentConfig> {
    let mut config = match config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(db) = db {
        config.db_path = db;
    }
    Ok(config)
}

/// Opens the agent, checking the database was initialized first.
pub fn open_agent(config: AgentConfig) -> anyhow::Result<PepAgent> {
    if !config.db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'pepstore init' first.",
            config.db_path.display()
        );
    }
    PepAgent::open(config).map_err(Into::into)
}

pub fn caller(owner: Option<String>, admin_of: Vec<String>) -> CallerContext {
    let caller = match owner {
        Some(namespace) => CallerContext::owner(namespace),
        None => CallerContext::anonymous(),
    };
    caller.with_admin_of(admin_of)
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
