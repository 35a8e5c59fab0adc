use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_TAG: &str = "default";

const MAX_SEGMENT_LEN: usize = 255;
const INVALID_CHARS: &[char] = &['\0', '\n', '\r', '\t'];

/// Canonical composite key of a project: `namespace/name:tag`.
///
/// Namespace and name are stored lower-cased; the tag keeps its case.
/// Values can only be built through [`ProjectKey::new`] or by parsing a
/// registry path, so every key in circulation is normalized and valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectKey {
    namespace: String,
    name: String,
    tag: String,
}

impl ProjectKey {
    pub fn new(namespace: &str, name: &str, tag: Option<&str>) -> Result<Self> {
        let namespace = namespace.to_lowercase();
        let name = name.to_lowercase();
        let tag = match tag {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => DEFAULT_TAG.to_string(),
        };

        validate_segment("namespace", &namespace, &[':'])?;
        validate_segment("name", &name, &[':', '/', '?'])?;
        validate_segment("tag", &tag, &[':', '/', '?'])?;

        Ok(Self {
            namespace,
            name,
            tag,
        })
    }

    /// Rebuilds a key from values read back from the store.
    pub(crate) fn from_stored(namespace: String, name: String, tag: String) -> Self {
        Self {
            namespace,
            name,
            tag,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        Self::new(&self.namespace, &self.name, Some(tag))
    }

    pub fn with_name(&self, name: &str) -> Result<Self> {
        Self::new(&self.namespace, name, Some(&self.tag))
    }

    #[must_use]
    pub fn registry_path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.tag)
    }
}

impl FromStr for ProjectKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_registry_path(s)
    }
}

fn validate_segment(field: &'static str, value: &str, forbidden: &[char]) -> Result<()> {
    let invalid = |reason: String| Error::InvalidKey { field, reason };

    if value.trim().is_empty() {
        return Err(invalid("cannot be empty".to_string()));
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(invalid(format!("cannot exceed {MAX_SEGMENT_LEN} characters")));
    }
    if value.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(invalid("contains control characters".to_string()));
    }
    if let Some(c) = value.chars().find(|c| forbidden.contains(c)) {
        return Err(invalid(format!("'{c}' is not allowed")));
    }
    Ok(())
}

/// Parses `namespace/name[:tag]`.
///
/// Everything before the last `/` is the namespace; the rest is the name,
/// optionally followed by `:tag`. A missing tag resolves to [`DEFAULT_TAG`].
pub fn parse_registry_path(path: &str) -> Result<ProjectKey> {
    let malformed = |reason: String| Error::InvalidRegistryPath {
        path: path.to_string(),
        reason,
    };

    let (namespace, rest) = path
        .rsplit_once('/')
        .ok_or_else(|| malformed("expected 'namespace/name[:tag]'".to_string()))?;

    if path.matches(':').count() > 1 {
        return Err(malformed("more than one ':' separator".to_string()));
    }

    let (name, tag) = match rest.split_once(':') {
        Some((_, "")) => return Err(malformed("tag after ':' is empty".to_string())),
        Some((name, tag)) => (name, Some(tag)),
        None => (rest, None),
    };

    if namespace.is_empty() {
        return Err(malformed("namespace is empty".to_string()));
    }
    if name.is_empty() {
        return Err(malformed("name is empty".to_string()));
    }

    ProjectKey::new(namespace, name, tag).map_err(|err| match err {
        Error::InvalidKey { field, reason } => malformed(format!("{field} {reason}")),
        other => other,
    })
}

/// The ways a caller can address stored projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    ById(i64),
    ByDigest(String),
    ByRegistryPath(String),
    ByKey(ProjectKey),
}

impl From<ProjectKey> for Locator {
    fn from(key: ProjectKey) -> Self {
        Locator::ByKey(key)
    }
}
