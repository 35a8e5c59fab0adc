#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pepstore::agent::PepAgent;
use pepstore::config::AgentConfig;
use pepstore::digest::compute_digest;
use pepstore::store::{ProjectRecord, SqliteStore, Store, WriteMode};
use pepstore::types::*;
use serde_json::{Value, json};
use tempfile::TempDir;

pub struct TestAgent {
    pub temp_dir: TempDir,
    pub agent: Arc<PepAgent>,
}

impl TestAgent {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AgentConfig)) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut config = AgentConfig {
            db_path: temp_dir.path().join("pepstore.db"),
            ..AgentConfig::default()
        };
        adjust(&mut config);
        let agent = PepAgent::open(config).expect("open agent");
        Self {
            temp_dir,
            agent: Arc::new(agent),
        }
    }

    /// A second, independent connection to the same database file.
    pub fn second_agent(&self) -> PepAgent {
        let config = self.agent.config().clone();
        let store = SqliteStore::new(&config.db_path).expect("open store");
        store.set_busy_timeout(config.busy_timeout()).expect("busy timeout");
        store.initialize().expect("initialize");
        PepAgent::new(Arc::new(store) as Arc<dyn Store>, config)
    }

    pub fn push(&self, path: &str, document: Value) -> ProjectKey {
        let project = new_project(path, document);
        self.agent
            .upsert(&project, UpsertOptions::create(), &CallerContext::anonymous())
            .expect("upsert");
        project.key
    }

    pub fn push_private(&self, path: &str, document: Value) -> ProjectKey {
        let project = new_project(path, document).private(true);
        self.agent
            .upsert(&project, UpsertOptions::create(), &CallerContext::anonymous())
            .expect("upsert");
        project.key
    }
}

impl TestAgent {
    /// Writes a public project with both dates pinned to `at`.
    pub fn push_at(&self, path: &str, document: Value, at: DateTime<Utc>) -> ProjectKey {
        let key: ProjectKey = path.parse().expect("valid registry path");
        let record = ProjectRecord {
            key: key.clone(),
            digest: compute_digest(&document).expect("digest"),
            payload: document,
            description: None,
            is_private: false,
            number_of_samples: 0,
            pep_schema: None,
            submission_date: at,
            last_update_date: at,
            forked_from_id: None,
        };
        self.agent
            .store()
            .write_project(&record, WriteMode::CreateOnly, &Interrupt::none())
            .expect("write project");
        key
    }
}

pub fn new_project(path: &str, document: Value) -> NewProject {
    let key: ProjectKey = path.parse().expect("valid registry path");
    let payload = ProjectPayload::new(document).expect("object payload");
    NewProject::new(key, payload)
}

/// A small exported project with `samples` sample rows.
pub fn pep(name: &str, samples: usize) -> Value {
    let rows: Vec<Value> = (0..samples)
        .map(|i| json!({"sample_name": format!("{name}_{i}"), "file": format!("{name}_{i}.fastq")}))
        .collect();
    json!({
        "_config": {"pep_version": "2.1.0", "name": name},
        "_sample_dict": rows,
        "_subsample_list": [],
    })
}
