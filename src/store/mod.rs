mod query;
mod schema;
mod sqlite;

pub use query::{AnnotationQuery, NamespaceQuery};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::access::Visibility;
use crate::error::Result;
use crate::types::*;

/// A full project row as written by the agent.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub key: ProjectKey,
    pub digest: String,
    pub payload: Value,
    pub description: Option<String>,
    pub is_private: bool,
    pub number_of_samples: u64,
    pub pep_schema: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub last_update_date: DateTime<Utc>,
    pub forked_from_id: Option<i64>,
}

/// New content for a stored project: digest, payload and sample count together.
#[derive(Debug, Clone)]
pub struct ContentChange {
    pub digest: String,
    pub payload: Value,
    pub number_of_samples: u64,
}

/// Field changes applied by [`Store::update_project`].
#[derive(Debug, Clone)]
pub struct RecordChanges {
    /// Target key when the update renames the project.
    pub key: Option<ProjectKey>,
    pub content: Option<ContentChange>,
    pub description: Option<Option<String>>,
    pub is_private: Option<bool>,
    pub pep_schema: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `ProjectAlreadyExists` if the key is taken.
    CreateOnly,
    /// Replace an existing row, keeping its id, submission date and fork source.
    Overwrite,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityDates {
    pub submitted: Vec<DateTime<Utc>>,
    pub updated: Vec<DateTime<Utc>>,
}

/// Store defines the database interface.
///
/// Every call takes the caller's [`Interrupt`]; an implementation aborts the
/// running statement once it triggers and rolls back any open transaction.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Project writes
    fn write_project(
        &self,
        record: &ProjectRecord,
        mode: WriteMode,
        interrupt: &Interrupt,
    ) -> Result<UpsertOutcome>;
    fn update_project(
        &self,
        key: &ProjectKey,
        changes: &RecordChanges,
        interrupt: &Interrupt,
    ) -> Result<Project>;
    fn delete_project(&self, key: &ProjectKey, interrupt: &Interrupt) -> Result<bool>;

    // Project reads
    fn get_project(&self, key: &ProjectKey, interrupt: &Interrupt) -> Result<Option<Project>>;
    fn get_project_by_id(&self, id: i64, interrupt: &Interrupt) -> Result<Option<Project>>;
    fn list_projects_by_digest(
        &self,
        digest: &str,
        visibility: &Visibility,
        interrupt: &Interrupt,
    ) -> Result<Vec<Project>>;
    fn get_annotation(&self, key: &ProjectKey, interrupt: &Interrupt)
    -> Result<Option<Annotation>>;

    // Search
    fn search_annotations(
        &self,
        query: &AnnotationQuery,
        interrupt: &Interrupt,
    ) -> Result<(u64, Vec<Annotation>)>;
    fn search_namespaces(
        &self,
        query: &NamespaceQuery,
        interrupt: &Interrupt,
    ) -> Result<(u64, Vec<NamespaceSummary>)>;
    fn activity_dates(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
        visibility: &Visibility,
        interrupt: &Interrupt,
    ) -> Result<ActivityDates>;
}
