use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::ProjectKey;

/// A stored project: key, content digest, opaque payload and bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    #[serde(flatten)]
    pub key: ProjectKey,
    pub digest: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_private: bool,
    pub number_of_samples: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pep_schema: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub last_update_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<String>,
}

impl Project {
    #[must_use]
    pub fn annotation(&self) -> Annotation {
        Annotation {
            namespace: self.key.namespace().to_string(),
            name: self.key.name().to_string(),
            tag: self.key.tag().to_string(),
            digest: self.digest.clone(),
            description: self.description.clone(),
            is_private: self.is_private,
            number_of_samples: self.number_of_samples,
            pep_schema: self.pep_schema.clone(),
            submission_date: self.submission_date,
            last_update_date: self.last_update_date,
            forked_from: self.forked_from.clone(),
        }
    }
}

/// Metadata projection of a project, without its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub namespace: String,
    pub name: String,
    pub tag: String,
    pub digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_private: bool,
    pub number_of_samples: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pep_schema: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub last_update_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<String>,
}

impl Annotation {
    #[must_use]
    pub fn registry_path(&self) -> String {
        format!("{}/{}:{}", self.namespace, self.name, self.tag)
    }
}

/// Per-namespace aggregate over the projects a caller can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub namespace: String,
    pub number_of_projects: u64,
    pub number_of_samples: u64,
}

/// Project document handed over by the payload collaborator.
///
/// The document must be a JSON object. It is otherwise opaque: only its
/// digest and the reported sample count are derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPayload {
    document: Value,
    sample_count: Option<u64>,
}

impl ProjectPayload {
    pub fn new(document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(Error::InvalidPayload(
                "project document must be a JSON object".to_string(),
            ));
        }
        Ok(Self {
            document,
            sample_count: None,
        })
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        let document =
            serde_json::to_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        Self::new(document)
    }

    #[must_use]
    pub fn with_sample_count(mut self, count: u64) -> Self {
        self.sample_count = Some(count);
        self
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count.unwrap_or(0)
    }
}

/// A project to be written by [`crate::agent::PepAgent::upsert`].
#[derive(Debug, Clone)]
pub struct NewProject {
    pub key: ProjectKey,
    pub payload: ProjectPayload,
    pub description: Option<String>,
    pub is_private: bool,
    pub pep_schema: Option<String>,
}

impl NewProject {
    pub fn new(key: ProjectKey, payload: ProjectPayload) -> Self {
        Self {
            key,
            payload,
            description: None,
            is_private: false,
            pep_schema: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    #[must_use]
    pub fn pep_schema(mut self, schema: impl Into<String>) -> Self {
        self.pep_schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    pub overwrite: bool,
}

impl UpsertOptions {
    pub fn create() -> Self {
        Self { overwrite: false }
    }

    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Partial update of a stored project. Unset slots leave the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub(crate) tag: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<Option<String>>,
    pub(crate) is_private: Option<bool>,
    pub(crate) pep_schema: Option<Option<String>>,
    pub(crate) payload: Option<ProjectPayload>,
}

impl ProjectUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    #[must_use]
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = Some(is_private);
        self
    }

    #[must_use]
    pub fn pep_schema(mut self, schema: impl Into<String>) -> Self {
        self.pep_schema = Some(Some(schema.into()));
        self
    }

    #[must_use]
    pub fn clear_pep_schema(mut self) -> Self {
        self.pep_schema = Some(None);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: ProjectPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.is_private.is_none()
            && self.pep_schema.is_none()
            && self.payload.is_none()
    }
}

/// Copies a visible project to `target`, recording where it came from.
#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub target: ProjectKey,
    pub description: Option<String>,
    pub is_private: bool,
}

impl ForkRequest {
    pub fn new(target: ProjectKey) -> Self {
        Self {
            target,
            description: None,
            is_private: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }
}
