use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{
    Connection, OptionalExtension, Params, Row, TransactionBehavior, params, params_from_iter,
};
use serde_json::Value;

use super::query::{compile_annotations, compile_namespaces, visibility_predicate};
use super::schema::SCHEMA;
use super::{
    ActivityDates, AnnotationQuery, NamespaceQuery, ProjectRecord, RecordChanges, Store,
    WriteMode,
};
use crate::access::Visibility;
use crate::error::{Error, Result};
use crate::types::*;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite VM instructions between two cancellation checks.
const PROGRESS_INTERVAL: i32 = 1_000;

const FROM_PROJECTS: &str = "FROM projects p LEFT JOIN projects f ON f.id = p.forked_from_id";

const ANNOTATION_COLUMNS: &str = "p.namespace, p.name, p.tag, p.digest, p.description, \
     p.is_private, p.number_of_samples, p.pep_schema, p.submission_date, p.last_update_date, \
     f.namespace, f.name, f.tag";

const PROJECT_COLUMNS: &str = "p.namespace, p.name, p.tag, p.digest, p.description, \
     p.is_private, p.number_of_samples, p.pep_schema, p.submission_date, p.last_update_date, \
     f.namespace, f.name, f.tag, p.id, p.payload, p.forked_from_id";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// A project together with the raw fork link, which updates must carry over.
struct StoredProject {
    project: Project,
    forked_from_id: Option<i64>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// How long a write waits on another connection's lock before it
    /// fails with a retryable conflict.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn().busy_timeout(timeout)?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` with a progress handler that aborts the current statement
    /// once `interrupt` triggers.
    fn with_conn<T>(
        &self,
        interrupt: &Interrupt,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        interrupt.check()?;

        let mut conn = self.conn();
        let watch = AssertUnwindSafe(interrupt.clone());
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || watch.is_triggered()));

        let result = f(&mut *conn);

        conn.progress_handler(0, None::<fn() -> bool>);
        result
    }
}

pub(super) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width UTC timestamps, so text comparison in SQL orders by time.
pub(super) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn payload_text(payload: &Value) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| Error::InvalidPayload(e.to_string()))
}

fn fork_path(namespace: Option<String>, name: Option<String>, tag: Option<String>) -> Option<String> {
    match (namespace, name, tag) {
        (Some(namespace), Some(name), Some(tag)) => Some(format!("{namespace}/{name}:{tag}")),
        _ => None,
    }
}

fn annotation_from_row(row: &Row<'_>) -> rusqlite::Result<Annotation> {
    Ok(Annotation {
        namespace: row.get(0)?,
        name: row.get(1)?,
        tag: row.get(2)?,
        digest: row.get(3)?,
        description: row.get(4)?,
        is_private: row.get(5)?,
        number_of_samples: row.get(6)?,
        pep_schema: row.get(7)?,
        submission_date: parse_datetime(&row.get::<_, String>(8)?),
        last_update_date: parse_datetime(&row.get::<_, String>(9)?),
        forked_from: fork_path(row.get(10)?, row.get(11)?, row.get(12)?),
    })
}

fn stored_project_from_row(row: &Row<'_>) -> rusqlite::Result<StoredProject> {
    let payload_text: String = row.get(14)?;
    let payload: Value = serde_json::from_str(&payload_text).map_err(|e| {
        tracing::error!("Invalid payload in database: {}", e);
        rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e))
    })?;

    let project = Project {
        id: row.get(13)?,
        key: ProjectKey::from_stored(row.get(0)?, row.get(1)?, row.get(2)?),
        digest: row.get(3)?,
        payload,
        description: row.get(4)?,
        is_private: row.get(5)?,
        number_of_samples: row.get(6)?,
        pep_schema: row.get(7)?,
        submission_date: parse_datetime(&row.get::<_, String>(8)?),
        last_update_date: parse_datetime(&row.get::<_, String>(9)?),
        forked_from: fork_path(row.get(10)?, row.get(11)?, row.get(12)?),
    };

    Ok(StoredProject {
        project,
        forked_from_id: row.get(15)?,
    })
}

fn select_stored<P: Params>(
    conn: &Connection,
    condition: &str,
    params: P,
) -> Result<Option<StoredProject>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} {FROM_PROJECTS} WHERE {condition}"),
        params,
        stored_project_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn find_id(conn: &Connection, key: &ProjectKey) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM projects WHERE namespace = ?1 AND name = ?2 AND tag = ?3",
        params![key.namespace(), key.name(), key.tag()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::from)
}

/// Inserts a full row. `id` is `None` for new projects and the existing id
/// when a rename re-inserts a row.
fn insert_row(conn: &Connection, id: Option<i64>, record: &ProjectRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO projects (id, namespace, name, tag, digest, payload, number_of_samples,
                               description, is_private, pep_schema, submission_date,
                               last_update_date, forked_from_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id,
            record.key.namespace(),
            record.key.name(),
            record.key.tag(),
            record.digest,
            payload_text(&record.payload)?,
            record.number_of_samples,
            record.description,
            record.is_private,
            record.pep_schema,
            format_datetime(&record.submission_date),
            format_datetime(&record.last_update_date),
            record.forked_from_id,
        ],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => {
            Error::ProjectAlreadyExists(record.key.to_string())
        }
        _ => Error::from(e),
    })?;
    Ok(conn.last_insert_rowid())
}

fn update_row(conn: &Connection, id: i64, record: &ProjectRecord) -> Result<()> {
    conn.execute(
        "UPDATE projects SET digest = ?1, payload = ?2, number_of_samples = ?3,
                             description = ?4, is_private = ?5, pep_schema = ?6,
                             last_update_date = ?7
         WHERE id = ?8",
        params![
            record.digest,
            payload_text(&record.payload)?,
            record.number_of_samples,
            record.description,
            record.is_private,
            record.pep_schema,
            format_datetime(&record.last_update_date),
            id,
        ],
    )?;
    Ok(())
}

/// Applies `changes` on top of the stored row, producing the row to write.
fn merge_changes(current: StoredProject, key: ProjectKey, changes: &RecordChanges) -> ProjectRecord {
    let project = current.project;
    let (digest, payload, number_of_samples) = match &changes.content {
        Some(content) => (
            content.digest.clone(),
            content.payload.clone(),
            content.number_of_samples,
        ),
        None => (project.digest, project.payload, project.number_of_samples),
    };

    ProjectRecord {
        key,
        digest,
        payload,
        description: changes
            .description
            .clone()
            .unwrap_or(project.description),
        is_private: changes.is_private.unwrap_or(project.is_private),
        number_of_samples,
        pep_schema: changes.pep_schema.clone().unwrap_or(project.pep_schema),
        submission_date: project.submission_date,
        last_update_date: changes.updated_at,
        forked_from_id: current.forked_from_id,
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Project writes

    fn write_project(
        &self,
        record: &ProjectRecord,
        mode: WriteMode,
        interrupt: &Interrupt,
    ) -> Result<UpsertOutcome> {
        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let outcome = match (find_id(&tx, &record.key)?, mode) {
                (Some(_), WriteMode::CreateOnly) => {
                    return Err(Error::ProjectAlreadyExists(record.key.to_string()));
                }
                (Some(id), WriteMode::Overwrite) => {
                    update_row(&tx, id, record)?;
                    UpsertOutcome::Updated
                }
                (None, _) => {
                    insert_row(&tx, None, record)?;
                    UpsertOutcome::Created
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    fn update_project(
        &self,
        key: &ProjectKey,
        changes: &RecordChanges,
        interrupt: &Interrupt,
    ) -> Result<Project> {
        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = select_stored(
                &tx,
                "p.namespace = ?1 AND p.name = ?2 AND p.tag = ?3",
                params![key.namespace(), key.name(), key.tag()],
            )?
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()))?;
            let id = current.project.id;

            let target = changes.key.clone().unwrap_or_else(|| key.clone());
            let renamed = target != *key;
            let record = merge_changes(current, target, changes);

            if renamed {
                if find_id(&tx, &record.key)?.is_some() {
                    return Err(Error::ProjectAlreadyExists(record.key.to_string()));
                }
                tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
                interrupt.check()?;
                insert_row(&tx, Some(id), &record)?;
            } else {
                update_row(&tx, id, &record)?;
            }

            let updated = select_stored(&tx, "p.id = ?1", params![id])?
                .ok_or_else(|| Error::ProjectNotFound(record.key.to_string()))?;

            tx.commit()?;
            Ok(updated.project)
        })
    }

    fn delete_project(&self, key: &ProjectKey, interrupt: &Interrupt) -> Result<bool> {
        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(id) = find_id(&tx, key)? else {
                return Ok(false);
            };

            tx.execute(
                "UPDATE projects SET forked_from_id = NULL WHERE forked_from_id = ?1",
                params![id],
            )?;
            let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;

            tx.commit()?;
            Ok(rows > 0)
        })
    }

    // Project reads

    fn get_project(&self, key: &ProjectKey, interrupt: &Interrupt) -> Result<Option<Project>> {
        self.with_conn(interrupt, |conn| {
            let stored = select_stored(
                conn,
                "p.namespace = ?1 AND p.name = ?2 AND p.tag = ?3",
                params![key.namespace(), key.name(), key.tag()],
            )?;
            Ok(stored.map(|s| s.project))
        })
    }

    fn get_project_by_id(&self, id: i64, interrupt: &Interrupt) -> Result<Option<Project>> {
        self.with_conn(interrupt, |conn| {
            let stored = select_stored(conn, "p.id = ?1", params![id])?;
            Ok(stored.map(|s| s.project))
        })
    }

    fn list_projects_by_digest(
        &self,
        digest: &str,
        visibility: &Visibility,
        interrupt: &Interrupt,
    ) -> Result<Vec<Project>> {
        let mut params: Vec<SqlValue> = Vec::new();
        let visible = visibility_predicate(visibility, &mut params);
        params.push(SqlValue::Text(digest.to_string()));

        self.with_conn(interrupt, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} {FROM_PROJECTS}
                 WHERE {visible} AND p.digest = ?
                 ORDER BY p.namespace, p.name, p.tag"
            ))?;

            let rows = stmt.query_map(params_from_iter(params.iter()), stored_project_from_row)?;
            let stored = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(stored.into_iter().map(|s| s.project).collect())
        })
    }

    fn get_annotation(
        &self,
        key: &ProjectKey,
        interrupt: &Interrupt,
    ) -> Result<Option<Annotation>> {
        self.with_conn(interrupt, |conn| {
            conn.query_row(
                &format!(
                    "SELECT {ANNOTATION_COLUMNS} {FROM_PROJECTS}
                     WHERE p.namespace = ?1 AND p.name = ?2 AND p.tag = ?3"
                ),
                params![key.namespace(), key.name(), key.tag()],
                annotation_from_row,
            )
            .optional()
            .map_err(Error::from)
        })
    }

    // Search

    fn search_annotations(
        &self,
        query: &AnnotationQuery,
        interrupt: &Interrupt,
    ) -> Result<(u64, Vec<Annotation>)> {
        let compiled = compile_annotations(query);
        tracing::debug!(
            where_clause = %compiled.where_clause,
            order_clause = %compiled.order_clause,
            limit_offset = %compiled.limit_offset,
            "Searching annotations"
        );

        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction()?;

            let count: u64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM projects p {}", compiled.where_clause),
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )?;

            let results = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {ANNOTATION_COLUMNS} {FROM_PROJECTS} {} {} {}",
                    compiled.where_clause, compiled.order_clause, compiled.limit_offset
                ))?;
                let rows = stmt.query_map(params_from_iter(compiled.params.iter()), annotation_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.commit()?;
            Ok((count, results))
        })
    }

    fn search_namespaces(
        &self,
        query: &NamespaceQuery,
        interrupt: &Interrupt,
    ) -> Result<(u64, Vec<NamespaceSummary>)> {
        let compiled = compile_namespaces(query);
        tracing::debug!(
            where_clause = %compiled.where_clause,
            order_clause = %compiled.order_clause,
            "Searching namespaces"
        );

        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction()?;

            let count: u64 = tx.query_row(
                &format!(
                    "SELECT COUNT(DISTINCT p.namespace) FROM projects p {}",
                    compiled.where_clause
                ),
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )?;

            let results = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT p.namespace, COUNT(*) AS number_of_projects,
                            COALESCE(SUM(p.number_of_samples), 0)
                     FROM projects p {}
                     GROUP BY p.namespace {} {}",
                    compiled.where_clause, compiled.order_clause, compiled.limit_offset
                ))?;
                let rows = stmt.query_map(params_from_iter(compiled.params.iter()), |row| {
                    Ok(NamespaceSummary {
                        namespace: row.get(0)?,
                        number_of_projects: row.get(1)?,
                        number_of_samples: row.get(2)?,
                    })
                })?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.commit()?;
            Ok((count, results))
        })
    }

    fn activity_dates(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
        visibility: &Visibility,
        interrupt: &Interrupt,
    ) -> Result<ActivityDates> {
        let mut params: Vec<SqlValue> = Vec::new();
        let mut condition = visibility_predicate(visibility, &mut params);
        if let Some(namespace) = namespace {
            condition.push_str(" AND p.namespace = ?");
            params.push(SqlValue::Text(namespace.to_string()));
        }
        params.push(SqlValue::Text(format_datetime(&since)));

        self.with_conn(interrupt, |conn| {
            let tx = conn.transaction()?;
            let mut dates = ActivityDates::default();

            for (column, out) in [
                ("submission_date", &mut dates.submitted),
                ("last_update_date", &mut dates.updated),
            ] {
                let mut stmt = tx.prepare(&format!(
                    "SELECT p.{column} FROM projects p WHERE {condition} AND p.{column} >= ?"
                ))?;
                let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                for value in rows {
                    out.push(parse_datetime(&value?));
                }
            }

            tx.commit()?;
            Ok(dates)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::compute_digest;
    use rusqlite::hooks::Action;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn record(path: &str, payload: Value, is_private: bool) -> ProjectRecord {
        let now = Utc::now();
        ProjectRecord {
            key: path.parse().unwrap(),
            digest: compute_digest(&payload).unwrap(),
            payload,
            description: None,
            is_private,
            number_of_samples: 3,
            pep_schema: None,
            submission_date: now,
            last_update_date: now,
            forked_from_id: None,
        }
    }

    fn none() -> Interrupt {
        Interrupt::none()
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"projects".to_string()));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.initialize().unwrap();
    }

    #[test]
    fn test_project_crud() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let rec = record("lab/atlas:v1", json!({"name": "atlas"}), false);

        let outcome = store.write_project(&rec, WriteMode::CreateOnly, &none()).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let fetched = store.get_project(&rec.key, &none()).unwrap().unwrap();
        assert_eq!(fetched.key, rec.key);
        assert_eq!(fetched.digest, rec.digest);
        assert_eq!(fetched.payload, json!({"name": "atlas"}));
        assert_eq!(fetched.number_of_samples, 3);

        let by_id = store.get_project_by_id(fetched.id, &none()).unwrap().unwrap();
        assert_eq!(by_id.key, rec.key);

        assert!(store.delete_project(&rec.key, &none()).unwrap());
        assert!(store.get_project(&rec.key, &none()).unwrap().is_none());
        assert!(!store.delete_project(&rec.key, &none()).unwrap());
    }

    #[test]
    fn test_create_only_rejects_existing_key() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let rec = record("lab/atlas", json!({"v": 1}), false);
        store.write_project(&rec, WriteMode::CreateOnly, &none()).unwrap();

        let again = record("lab/atlas", json!({"v": 2}), false);
        let err = store
            .write_project(&again, WriteMode::CreateOnly, &none())
            .unwrap_err();
        assert!(matches!(err, Error::ProjectAlreadyExists(_)));

        let stored = store.get_project(&rec.key, &none()).unwrap().unwrap();
        assert_eq!(stored.payload, json!({"v": 1}));
    }

    #[test]
    fn test_overwrite_keeps_id_and_submission_date() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let rec = record("lab/atlas", json!({"v": 1}), false);
        store.write_project(&rec, WriteMode::CreateOnly, &none()).unwrap();
        let before = store.get_project(&rec.key, &none()).unwrap().unwrap();

        let mut newer = record("lab/atlas", json!({"v": 2}), true);
        newer.submission_date = before.submission_date + chrono::Duration::days(1);
        newer.last_update_date = before.last_update_date + chrono::Duration::days(1);
        let outcome = store.write_project(&newer, WriteMode::Overwrite, &none()).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let after = store.get_project(&rec.key, &none()).unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.submission_date, before.submission_date);
        assert!(after.last_update_date > before.last_update_date);
        assert!(after.is_private);
        assert_eq!(after.payload, json!({"v": 2}));
    }

    #[test]
    fn test_rename_keeps_id_and_fork_links() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let source = record("lab/atlas:v1", json!({"v": 1}), false);
        store.write_project(&source, WriteMode::CreateOnly, &none()).unwrap();
        let source_id = store.get_project(&source.key, &none()).unwrap().unwrap().id;

        let mut fork = record("geo/atlas", json!({"v": 1}), false);
        fork.forked_from_id = Some(source_id);
        store.write_project(&fork, WriteMode::CreateOnly, &none()).unwrap();

        let changes = RecordChanges {
            key: Some(source.key.with_tag("v2").unwrap()),
            content: None,
            description: Some(Some("renamed".into())),
            is_private: None,
            pep_schema: None,
            updated_at: Utc::now(),
        };
        let renamed = store.update_project(&source.key, &changes, &none()).unwrap();
        assert_eq!(renamed.id, source_id);
        assert_eq!(renamed.key.to_string(), "lab/atlas:v2");
        assert_eq!(renamed.description.as_deref(), Some("renamed"));
        assert!(store.get_project(&source.key, &none()).unwrap().is_none());

        let fork = store.get_project(&fork.key, &none()).unwrap().unwrap();
        assert_eq!(fork.forked_from.as_deref(), Some("lab/atlas:v2"));
    }

    #[test]
    fn test_delete_clears_fork_links() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let source = record("lab/atlas", json!({}), false);
        store.write_project(&source, WriteMode::CreateOnly, &none()).unwrap();
        let source_id = store.get_project(&source.key, &none()).unwrap().unwrap().id;

        let mut fork = record("geo/atlas", json!({}), false);
        fork.forked_from_id = Some(source_id);
        store.write_project(&fork, WriteMode::CreateOnly, &none()).unwrap();

        store.delete_project(&source.key, &none()).unwrap();
        let fork = store.get_project(&fork.key, &none()).unwrap().unwrap();
        assert!(fork.forked_from.is_none());
    }

    #[test]
    fn test_digest_lookup_filters_private() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let payload = json!({"shared": true});
        store
            .write_project(&record("lab/a", payload.clone(), false), WriteMode::CreateOnly, &none())
            .unwrap();
        store
            .write_project(&record("lab/b", payload.clone(), true), WriteMode::CreateOnly, &none())
            .unwrap();
        let digest = compute_digest(&payload).unwrap();

        let public = store
            .list_projects_by_digest(&digest, &Visibility::public_only(), &none())
            .unwrap();
        assert_eq!(public.len(), 1);

        let owner = Visibility::for_caller(&CallerContext::owner("lab"));
        let all = store.list_projects_by_digest(&digest, &owner, &none()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_cancelled_interrupt_skips_the_call() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let interrupt = Interrupt::none().with_deadline(std::time::Instant::now());
        let rec = record("lab/atlas", json!({}), false);

        let err = store
            .write_project(&rec, WriteMode::CreateOnly, &interrupt)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(store.get_project(&rec.key, &none()).unwrap().is_none());
    }

    #[test]
    fn test_rename_cancelled_after_delete_rolls_back() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let source = record("lab/atlas:v1", json!({"v": 1}), false);
        store.write_project(&source, WriteMode::CreateOnly, &none()).unwrap();
        let source_id = store.get_project(&source.key, &none()).unwrap().unwrap().id;

        let token = CancellationToken::new();
        let trigger = token.clone();
        store.conn().update_hook(Some(
            move |action: Action, _db: &str, table: &str, _rowid: i64| {
                if matches!(action, Action::SQLITE_DELETE) && table == "projects" {
                    trigger.cancel();
                }
            },
        ));

        let target = source.key.with_tag("v2").unwrap();
        let changes = RecordChanges {
            key: Some(target.clone()),
            content: None,
            description: None,
            is_private: None,
            pep_schema: None,
            updated_at: Utc::now(),
        };
        let interrupt = Interrupt::none().with_token(token.clone());
        let err = store
            .update_project(&source.key, &changes, &interrupt)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(token.is_cancelled());

        store
            .conn()
            .update_hook(None::<fn(Action, &str, &str, i64)>);
        let kept = store.get_project(&source.key, &none()).unwrap().unwrap();
        assert_eq!(kept.id, source_id);
        assert!(store.get_project(&target, &none()).unwrap().is_none());
    }

    #[test]
    fn test_timestamps_round_trip_at_microsecond_precision() {
        let now = Utc::now();
        let text = format_datetime(&now);
        assert!(text.ends_with('Z'));
        let parsed = parse_datetime(&text);
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
