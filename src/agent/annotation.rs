use super::PepAgent;
use crate::access::is_annotation_visible;
use crate::digest::normalize_digest;
use crate::error::{Error, Result};
use crate::registry::parse_registry_path;
use crate::store::AnnotationQuery;
use crate::types::*;

impl PepAgent {
    /// Searches annotations visible to `caller`.
    ///
    /// `count` in the returned page is the total across all pages, taken
    /// in the same read transaction as the page itself.
    pub fn search_projects(
        &self,
        request: &SearchRequest,
        caller: &CallerContext,
    ) -> Result<AnnotationPage> {
        let scope = match &request.scope {
            SearchScope::All => SearchScope::All,
            SearchScope::Namespace(namespace) => SearchScope::Namespace(namespace.to_lowercase()),
            SearchScope::NamespaceTag { namespace, tag } => SearchScope::NamespaceTag {
                namespace: namespace.to_lowercase(),
                tag: tag.clone(),
            },
        };
        let keys = request
            .registry_paths
            .iter()
            .map(|path| parse_registry_path(path))
            .collect::<Result<Vec<_>>>()?;
        let digests = request
            .digests
            .iter()
            .map(|digest| normalize_digest(digest))
            .collect::<Result<Vec<_>>>()?;
        let limit = self.config.effective_limit(request.pagination.limit);
        let offset = request.pagination.offset;

        let query = AnnotationQuery {
            visibility: Self::visibility(caller),
            scope,
            text: request.text.clone(),
            digests,
            keys,
            window: request.window,
            sort: request.sort,
            direction: request.direction,
            limit,
            offset,
        };

        let (count, results) = self.store.search_annotations(&query, caller.interrupt())?;
        Ok(Page {
            count,
            limit,
            offset,
            results,
        })
    }

    pub fn get_annotation(&self, key: &ProjectKey, caller: &CallerContext) -> Result<Annotation> {
        let annotation = self
            .store
            .get_annotation(key, caller.interrupt())?
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()))?;
        let visible = is_annotation_visible(&annotation, caller);
        self.reveal(annotation, visible, key)
    }

    pub fn get_annotation_by_registry_path(
        &self,
        path: &str,
        caller: &CallerContext,
    ) -> Result<Annotation> {
        let key = parse_registry_path(path)?;
        self.get_annotation(&key, caller)
    }
}
