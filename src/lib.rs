//! # Pepstore
//!
//! A metadata store for versioned sample projects, usable both as a
//! standalone binary and as a library.
//!
//! Projects are addressed by `namespace/name:tag`, identified by the digest
//! of their payload, and searched through their annotations. Private
//! projects are only visible to the owner and admins of their namespace.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! pepstore = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use pepstore::agent::PepAgent;
//! use pepstore::config::AgentConfig;
//! use pepstore::types::*;
//!
//! let agent = PepAgent::open(AgentConfig::default())?;
//! let caller = CallerContext::owner("databio");
//!
//! let key: ProjectKey = "databio/example:default".parse()?;
//! let payload = ProjectPayload::new(serde_json::json!({"_config": {}}))?;
//! agent.upsert(&NewProject::new(key, payload), UpsertOptions::create(), &caller)?;
//!
//! let page = agent.search_projects(&SearchRequest::new().text("example"), &caller)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod access;
pub mod agent;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod registry;
pub mod store;
pub mod types;
