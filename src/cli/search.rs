use super::print_json;
use crate::agent::PepAgent;
use crate::types::*;

#[allow(clippy::too_many_arguments)]
pub fn run_search(
    agent: &PepAgent,
    caller: &CallerContext,
    query: Option<String>,
    namespace: Option<String>,
    tag: Option<String>,
    digests: Vec<String>,
    paths: Vec<String>,
    sort: SortField,
    ascending: bool,
    limit: Option<u32>,
    offset: u64,
) -> anyhow::Result<()> {
    let mut request = SearchRequest::new().offset(offset);
    request = match (namespace, tag) {
        (Some(namespace), Some(tag)) => request.namespace_tag(namespace, tag),
        (Some(namespace), None) => request.namespace(namespace),
        (None, _) => request,
    };
    if let Some(query) = query {
        request = request.text(query);
    }
    if let Some(limit) = limit {
        request = request.limit(limit);
    }
    request.digests = digests;
    request.registry_paths = paths;
    let direction = if ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    request = request.order_by(sort, direction);

    print_json(&agent.search_projects(&request, caller)?)
}

pub fn run_namespaces(
    agent: &PepAgent,
    caller: &CallerContext,
    query: Option<String>,
    order: NamespaceOrder,
    limit: Option<u32>,
    offset: u64,
) -> anyhow::Result<()> {
    let mut search = NamespaceSearch::new().order(order).offset(offset);
    if let Some(query) = query {
        search = search.text(query);
    }
    if let Some(limit) = limit {
        search = search.limit(limit);
    }

    print_json(&agent.search_namespaces(&search, caller)?)
}

pub fn run_stats(
    agent: &PepAgent,
    caller: &CallerContext,
    namespace: Option<String>,
    monthly: bool,
) -> anyhow::Result<()> {
    let granularity = if monthly {
        StatsGranularity::Monthly
    } else {
        StatsGranularity::Daily
    };
    print_json(&agent.namespace_stats(namespace.as_deref(), granularity, caller)?)
}
