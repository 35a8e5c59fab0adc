use chrono::Utc;
use tracing::{info, warn};

use super::PepAgent;
use crate::access::{is_annotation_visible, is_visible};
use crate::digest::{compute_digest, normalize_digest};
use crate::error::{Error, Result};
use crate::registry::parse_registry_path;
use crate::store::{ContentChange, ProjectRecord, RecordChanges, WriteMode};
use crate::types::*;

impl PepAgent {
    /// Creates a project, or replaces it when `options.overwrite` is set.
    ///
    /// On overwrite the row id, submission date and fork source are kept.
    pub fn upsert(
        &self,
        project: &NewProject,
        options: UpsertOptions,
        caller: &CallerContext,
    ) -> Result<UpsertOutcome> {
        let key = &project.key;
        let document = project.payload.document();
        let digest = compute_digest(document)?;
        let now = Utc::now();

        let record = ProjectRecord {
            key: key.clone(),
            digest,
            payload: document.clone(),
            description: project.description.clone(),
            is_private: project.is_private,
            number_of_samples: project.payload.sample_count(),
            pep_schema: project.pep_schema.clone(),
            submission_date: now,
            last_update_date: now,
            forked_from_id: None,
        };
        let mode = if options.overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::CreateOnly
        };

        let outcome = self
            .store
            .write_project(&record, mode, caller.interrupt())
            .map_err(|e| e.on_key(key))
            .inspect_err(|e| {
                if e.is_retryable() {
                    warn!("Write conflict on {}", key);
                }
            })?;

        match outcome {
            UpsertOutcome::Created => info!("Created project {} ({})", key, record.digest),
            UpsertOutcome::Updated => info!("Overwrote project {} ({})", key, record.digest),
        }
        Ok(outcome)
    }

    /// Applies a partial update. Changing the tag or name moves the project
    /// to the new key atomically and fails if that key is taken.
    ///
    /// Returns the stored row as written; only the empty update goes through
    /// the read filter.
    pub fn update(
        &self,
        key: &ProjectKey,
        update: &ProjectUpdate,
        caller: &CallerContext,
    ) -> Result<Project> {
        if update.is_empty() {
            return self.get(key, caller);
        }

        let mut target = key.clone();
        if let Some(name) = update.name.as_deref().filter(|n| !n.is_empty()) {
            target = target.with_name(name)?;
        }
        if let Some(tag) = update.tag.as_deref().filter(|t| !t.is_empty()) {
            target = target.with_tag(tag)?;
        }

        let content = match &update.payload {
            Some(payload) => Some(ContentChange {
                digest: compute_digest(payload.document())?,
                payload: payload.document().clone(),
                number_of_samples: payload.sample_count(),
            }),
            None => None,
        };

        let changes = RecordChanges {
            key: (target != *key).then_some(target),
            content,
            description: update.description.clone(),
            is_private: update.is_private,
            pep_schema: update.pep_schema.clone(),
            updated_at: Utc::now(),
        };

        let project = self
            .store
            .update_project(key, &changes, caller.interrupt())
            .map_err(|e| e.on_key(key))?;

        if project.key != *key {
            info!("Moved project {} to {}", key, project.key);
        } else {
            info!("Updated project {}", key);
        }
        Ok(project)
    }

    /// Copies a project the caller can see to a new key.
    pub fn fork(
        &self,
        source: &ProjectKey,
        request: &ForkRequest,
        caller: &CallerContext,
    ) -> Result<Project> {
        let original = self.get(source, caller)?;
        let target = &request.target;

        let record = ProjectRecord {
            key: target.clone(),
            digest: original.digest,
            payload: original.payload,
            description: request.description.clone().or(original.description),
            is_private: request.is_private,
            number_of_samples: original.number_of_samples,
            pep_schema: original.pep_schema,
            submission_date: original.submission_date,
            last_update_date: Utc::now(),
            forked_from_id: Some(original.id),
        };

        self.store
            .write_project(&record, WriteMode::CreateOnly, caller.interrupt())
            .map_err(|e| e.on_key(target))?;
        info!("Forked project {} to {}", source, target);

        self.store
            .get_project(target, caller.interrupt())?
            .ok_or_else(|| Error::ProjectNotFound(target.to_string()))
    }

    pub fn get(&self, key: &ProjectKey, caller: &CallerContext) -> Result<Project> {
        let project = self
            .store
            .get_project(key, caller.interrupt())?
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()))?;
        let visible = is_visible(&project, caller);
        self.reveal(project, visible, key)
    }

    pub fn get_by_registry_path(&self, path: &str, caller: &CallerContext) -> Result<Project> {
        let key = parse_registry_path(path)?;
        self.get(&key, caller)
    }

    pub fn get_by_id(&self, id: i64, caller: &CallerContext) -> Result<Project> {
        let what = format!("id {id}");
        let project = self
            .store
            .get_project_by_id(id, caller.interrupt())?
            .ok_or_else(|| Error::ProjectNotFound(what.clone()))?;
        let visible = is_visible(&project, caller);
        self.reveal(project, visible, what)
    }

    /// All visible projects whose payload hashes to `digest`. Zero matches
    /// is an empty list, not an error.
    pub fn get_by_digest(&self, digest: &str, caller: &CallerContext) -> Result<Vec<Project>> {
        let digest = normalize_digest(digest)?;
        self.store
            .list_projects_by_digest(&digest, &Self::visibility(caller), caller.interrupt())
    }

    pub fn locate(&self, locator: &Locator, caller: &CallerContext) -> Result<Vec<Project>> {
        match locator {
            Locator::ById(id) => self.get_by_id(*id, caller).map(|p| vec![p]),
            Locator::ByDigest(digest) => self.get_by_digest(digest, caller),
            Locator::ByRegistryPath(path) => self.get_by_registry_path(path, caller).map(|p| vec![p]),
            Locator::ByKey(key) => self.get(key, caller).map(|p| vec![p]),
        }
    }

    pub fn delete(&self, key: &ProjectKey, caller: &CallerContext) -> Result<()> {
        let deleted = self
            .store
            .delete_project(key, caller.interrupt())
            .map_err(|e| e.on_key(key))?;
        if !deleted {
            return Err(Error::ProjectNotFound(key.to_string()));
        }
        info!("Deleted project {}", key);
        Ok(())
    }

    pub fn delete_by_registry_path(&self, path: &str, caller: &CallerContext) -> Result<()> {
        let key = parse_registry_path(path)?;
        self.delete(&key, caller)
    }

    /// True if the project exists and the caller can see it.
    pub fn exists(&self, key: &ProjectKey, caller: &CallerContext) -> Result<bool> {
        let annotation = self.store.get_annotation(key, caller.interrupt())?;
        Ok(annotation.is_some_and(|a| is_annotation_visible(&a, caller)))
    }
}
