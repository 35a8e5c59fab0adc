use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::PepAgent;
use crate::error::{Error, Result};
use crate::store::NamespaceQuery;
use crate::types::*;

impl PepAgent {
    /// Namespaces that hold at least one project visible to `caller`.
    pub fn search_namespaces(
        &self,
        search: &NamespaceSearch,
        caller: &CallerContext,
    ) -> Result<NamespacePage> {
        let limit = self.config.effective_limit(search.pagination.limit);
        let offset = search.pagination.offset;
        let query = NamespaceQuery {
            visibility: Self::visibility(caller),
            text: search.text.clone(),
            namespace: None,
            order: search.order,
            limit,
            offset,
        };

        let (count, results) = self.store.search_namespaces(&query, caller.interrupt())?;
        Ok(Page {
            count,
            limit,
            offset,
            results,
        })
    }

    pub fn get_namespace_info(
        &self,
        namespace: &str,
        caller: &CallerContext,
    ) -> Result<NamespaceSummary> {
        let namespace = namespace.to_lowercase();
        let query = NamespaceQuery {
            visibility: Self::visibility(caller),
            text: None,
            namespace: Some(namespace.clone()),
            order: NamespaceOrder::Name,
            limit: 1,
            offset: 0,
        };

        let (_, results) = self.store.search_namespaces(&query, caller.interrupt())?;
        results
            .into_iter()
            .next()
            .ok_or(Error::NamespaceNotFound(namespace))
    }

    /// Creation and update counts over the recent window of `granularity`,
    /// for one namespace or across all of them.
    pub fn namespace_stats(
        &self,
        namespace: Option<&str>,
        granularity: StatsGranularity,
        caller: &CallerContext,
    ) -> Result<NamespaceStats> {
        let namespace = namespace.map(str::to_lowercase);
        let since = Utc::now() - Duration::days(granularity.window_days());

        let dates = self.store.activity_dates(
            namespace.as_deref(),
            since,
            &Self::visibility(caller),
            caller.interrupt(),
        )?;

        if let Some(namespace) = &namespace {
            if dates.submitted.is_empty() && dates.updated.is_empty() {
                return Err(Error::NamespaceNotFound(namespace.clone()));
            }
        }

        Ok(NamespaceStats {
            projects_created: bucket_counts(&dates.submitted, granularity),
            projects_updated: bucket_counts(&dates.updated, granularity),
            namespace,
            granularity,
        })
    }
}

fn bucket_counts(dates: &[DateTime<Utc>], granularity: StatsGranularity) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for date in dates {
        *counts.entry(granularity.bucket(date)).or_insert(0) += 1;
    }
    counts
}
