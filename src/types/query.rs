use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Annotation, NamespaceSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    All,
    Namespace(String),
    NamespaceTag { namespace: String, tag: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    LastUpdateDate,
    SubmissionDate,
    Name,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateField {
    #[default]
    Submission,
    LastUpdate,
}

/// Inclusive date bounds over one of the project timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub field: DateField,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// `None` uses the configured default limit.
    pub limit: Option<u32>,
    pub offset: u64,
}

/// Filtered, ordered and paginated annotation search.
///
/// All filters are conjunctive. Blank text matches everything in scope.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub scope: SearchScope,
    pub text: Option<String>,
    pub digests: Vec<String>,
    pub registry_paths: Vec<String>,
    pub window: Option<DateWindow>,
    pub sort: SortField,
    pub direction: SortDirection,
    pub pagination: Pagination,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.scope = SearchScope::Namespace(namespace.into());
        self
    }

    #[must_use]
    pub fn namespace_tag(mut self, namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        self.scope = SearchScope::NamespaceTag {
            namespace: namespace.into(),
            tag: tag.into(),
        };
        self
    }

    #[must_use]
    /// Substring match over name, description and tag. Case folding
    /// covers ASCII letters only.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digests.push(digest.into());
        self
    }

    #[must_use]
    pub fn registry_path(mut self, path: impl Into<String>) -> Self {
        self.registry_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn order_by(mut self, sort: SortField, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = offset;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamespaceOrder {
    #[default]
    Name,
    NumberOfProjects,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceSearch {
    pub text: Option<String>,
    pub order: NamespaceOrder,
    pub pagination: Pagination,
}

impl NamespaceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: NamespaceOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = offset;
        self
    }
}

/// One page of results plus the total number of matches across all pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub limit: u32,
    pub offset: u64,
    pub results: Vec<T>,
}

pub type AnnotationPage = Page<Annotation>;
pub type NamespacePage = Page<NamespaceSummary>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsGranularity {
    #[default]
    Daily,
    Monthly,
}

impl StatsGranularity {
    /// Days of history covered by one stats call.
    pub fn window_days(self) -> i64 {
        match self {
            StatsGranularity::Daily => 3 * 30 + 1,
            StatsGranularity::Monthly => 36 * 30 + 1,
        }
    }

    pub fn bucket(self, date: &DateTime<Utc>) -> String {
        match self {
            StatsGranularity::Daily => date.format("%Y-%m-%d").to_string(),
            StatsGranularity::Monthly => date.format("%Y-%m").to_string(),
        }
    }
}

/// Creation and update activity, bucketed by day or month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub granularity: StatsGranularity,
    pub projects_created: BTreeMap<String, u64>,
    pub projects_updated: BTreeMap<String, u64>,
}
