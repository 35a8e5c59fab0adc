use rusqlite::types::Value as SqlValue;

use super::sqlite::format_datetime;
use crate::access::Visibility;
use crate::types::*;

/// A fully resolved annotation search, ready to be compiled to SQL.
#[derive(Debug, Clone)]
pub struct AnnotationQuery {
    pub visibility: Visibility,
    pub scope: SearchScope,
    pub text: Option<String>,
    pub digests: Vec<String>,
    pub keys: Vec<ProjectKey>,
    pub window: Option<DateWindow>,
    pub sort: SortField,
    pub direction: SortDirection,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct NamespaceQuery {
    pub visibility: Visibility,
    pub text: Option<String>,
    /// Restricts the aggregate to one namespace.
    pub namespace: Option<String>,
    pub order: NamespaceOrder,
    pub limit: u32,
    pub offset: u64,
}

/// SQL fragments over the `projects p` alias plus their positional parameters.
#[derive(Debug)]
pub(crate) struct CompiledQuery {
    pub where_clause: String,
    pub order_clause: String,
    pub limit_offset: String,
    pub params: Vec<SqlValue>,
}

pub(crate) fn compile_annotations(query: &AnnotationQuery) -> CompiledQuery {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    conditions.push(visibility_predicate(&query.visibility, &mut params));

    match &query.scope {
        SearchScope::All => {}
        SearchScope::Namespace(namespace) => {
            conditions.push("p.namespace = ?".to_string());
            params.push(SqlValue::Text(namespace.clone()));
        }
        SearchScope::NamespaceTag { namespace, tag } => {
            conditions.push("p.namespace = ?".to_string());
            params.push(SqlValue::Text(namespace.clone()));
            conditions.push("p.tag = ?".to_string());
            params.push(SqlValue::Text(tag.clone()));
        }
    }

    if let Some(pattern) = like_pattern(query.text.as_deref()) {
        conditions.push(
            "(p.name LIKE ? ESCAPE '\\' OR p.description LIKE ? ESCAPE '\\' OR p.tag LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        for _ in 0..3 {
            params.push(SqlValue::Text(pattern.clone()));
        }
    }

    if !query.digests.is_empty() {
        conditions.push(format!("p.digest IN ({})", placeholders(query.digests.len())));
        params.extend(query.digests.iter().cloned().map(SqlValue::Text));
    }

    if !query.keys.is_empty() {
        let alternatives = vec!["(p.namespace = ? AND p.name = ? AND p.tag = ?)"; query.keys.len()];
        conditions.push(format!("({})", alternatives.join(" OR ")));
        for key in &query.keys {
            params.push(SqlValue::Text(key.namespace().to_string()));
            params.push(SqlValue::Text(key.name().to_string()));
            params.push(SqlValue::Text(key.tag().to_string()));
        }
    }

    if let Some(window) = &query.window {
        let column = match window.field {
            DateField::Submission => "p.submission_date",
            DateField::LastUpdate => "p.last_update_date",
        };
        if let Some(from) = &window.from {
            conditions.push(format!("{column} >= ?"));
            params.push(SqlValue::Text(format_datetime(from)));
        }
        if let Some(to) = &window.to {
            conditions.push(format!("{column} <= ?"));
            params.push(SqlValue::Text(format_datetime(to)));
        }
    }

    let column = match query.sort {
        SortField::LastUpdateDate => "p.last_update_date",
        SortField::SubmissionDate => "p.submission_date",
        SortField::Name => "p.name",
    };
    let direction = sql_direction(query.direction);
    let order_clause = if query.sort == SortField::Name {
        format!("ORDER BY p.name {direction}, p.namespace ASC, p.tag ASC")
    } else {
        format!("ORDER BY {column} {direction}, p.namespace ASC, p.name ASC, p.tag ASC")
    };

    CompiledQuery {
        where_clause: format!("WHERE {}", conditions.join(" AND ")),
        order_clause,
        limit_offset: limit_offset(query.limit, query.offset),
        params,
    }
}

pub(crate) fn compile_namespaces(query: &NamespaceQuery) -> CompiledQuery {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    conditions.push(visibility_predicate(&query.visibility, &mut params));

    if let Some(namespace) = &query.namespace {
        conditions.push("p.namespace = ?".to_string());
        params.push(SqlValue::Text(namespace.clone()));
    }

    if let Some(pattern) = like_pattern(query.text.as_deref()) {
        conditions.push("p.namespace LIKE ? ESCAPE '\\'".to_string());
        params.push(SqlValue::Text(pattern));
    }

    let order_clause = match query.order {
        NamespaceOrder::Name => "ORDER BY p.namespace ASC".to_string(),
        NamespaceOrder::NumberOfProjects => {
            "ORDER BY number_of_projects DESC, p.namespace ASC".to_string()
        }
    };

    CompiledQuery {
        where_clause: format!("WHERE {}", conditions.join(" AND ")),
        order_clause,
        limit_offset: limit_offset(query.limit, query.offset),
        params,
    }
}

/// `WHERE` term admitting public rows and private rows of privileged namespaces.
pub(crate) fn visibility_predicate(visibility: &Visibility, params: &mut Vec<SqlValue>) -> String {
    let privileged = visibility.privileged_namespaces();
    if privileged.is_empty() {
        return "p.is_private = 0".to_string();
    }
    params.extend(privileged.iter().cloned().map(SqlValue::Text));
    format!(
        "(p.is_private = 0 OR p.namespace IN ({}))",
        placeholders(privileged.len())
    )
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQLite reads integers above `i64::MAX` as reals, so the offset saturates.
fn limit_offset(limit: u32, offset: u64) -> String {
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    format!("LIMIT {limit} OFFSET {offset}")
}

fn sql_direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

/// Substring pattern for `LIKE ... ESCAPE '\'`, or `None` for blank text.
fn like_pattern(text: Option<&str>) -> Option<String> {
    let text = text.map(str::trim).filter(|t| !t.is_empty())?;
    Some(format!("%{}%", escape_like(text)))
}

pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> AnnotationQuery {
        AnnotationQuery {
            visibility: Visibility::public_only(),
            scope: SearchScope::All,
            text: None,
            digests: Vec::new(),
            keys: Vec::new(),
            window: None,
            sort: SortField::LastUpdateDate,
            direction: SortDirection::Descending,
            limit: 100,
            offset: 0,
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_blank_text_adds_no_filter() {
        let mut q = query();
        q.text = Some("   ".to_string());
        let compiled = compile_annotations(&q);
        assert_eq!(compiled.where_clause, "WHERE p.is_private = 0");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_visibility_predicate_binds_privileged_namespaces() {
        let mut params = Vec::new();
        let visibility = Visibility::for_caller(&CallerContext::owner("lab").with_admin_of(["geo"]));
        let sql = visibility_predicate(&visibility, &mut params);
        assert_eq!(sql, "(p.is_private = 0 OR p.namespace IN (?, ?))");
        assert_eq!(
            params,
            vec![SqlValue::Text("geo".into()), SqlValue::Text("lab".into())]
        );
    }

    #[test]
    fn test_filters_are_conjunctive_and_params_ordered() {
        let mut q = query();
        q.scope = SearchScope::NamespaceTag {
            namespace: "lab".into(),
            tag: "v1".into(),
        };
        q.text = Some("atlas".into());
        q.digests = vec!["d1".into(), "d2".into()];
        let compiled = compile_annotations(&q);

        assert_eq!(
            compiled.where_clause,
            "WHERE p.is_private = 0 AND p.namespace = ? AND p.tag = ? AND \
             (p.name LIKE ? ESCAPE '\\' OR p.description LIKE ? ESCAPE '\\' OR p.tag LIKE ? ESCAPE '\\') AND \
             p.digest IN (?, ?)"
        );
        assert_eq!(compiled.params.len(), 7);
        assert_eq!(compiled.params[3], SqlValue::Text("%atlas%".into()));
        assert_eq!(compiled.params[6], SqlValue::Text("d2".into()));
    }

    #[test]
    fn test_order_is_total() {
        let compiled = compile_annotations(&query());
        assert_eq!(
            compiled.order_clause,
            "ORDER BY p.last_update_date DESC, p.namespace ASC, p.name ASC, p.tag ASC"
        );

        let mut q = query();
        q.sort = SortField::Name;
        q.direction = SortDirection::Ascending;
        q.limit = 10;
        q.offset = 20;
        let compiled = compile_annotations(&q);
        assert_eq!(
            compiled.order_clause,
            "ORDER BY p.name ASC, p.namespace ASC, p.tag ASC"
        );
        assert_eq!(compiled.limit_offset, "LIMIT 10 OFFSET 20");

        q.offset = u64::MAX;
        let compiled = compile_annotations(&q);
        assert_eq!(
            compiled.limit_offset,
            format!("LIMIT 10 OFFSET {}", i64::MAX)
        );
    }

    #[test]
    fn test_namespace_query() {
        let compiled = compile_namespaces(&NamespaceQuery {
            visibility: Visibility::public_only(),
            text: Some("la".into()),
            namespace: None,
            order: NamespaceOrder::NumberOfProjects,
            limit: 5,
            offset: 0,
        });
        assert_eq!(
            compiled.where_clause,
            "WHERE p.is_private = 0 AND p.namespace LIKE ? ESCAPE '\\'"
        );
        assert_eq!(
            compiled.order_clause,
            "ORDER BY number_of_projects DESC, p.namespace ASC"
        );
    }
}
