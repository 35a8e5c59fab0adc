pub const SCHEMA: &str = r#"
-- Projects: one row per namespace/name:tag
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    tag TEXT NOT NULL,

    -- Content
    digest TEXT NOT NULL,
    payload TEXT NOT NULL,
    number_of_samples INTEGER NOT NULL DEFAULT 0,

    -- Annotation
    description TEXT,
    is_private INTEGER NOT NULL DEFAULT 0,
    pep_schema TEXT,

    -- Kept across overwrites and renames
    submission_date TEXT NOT NULL,
    last_update_date TEXT NOT NULL,

    -- Source of a fork. Not a foreign key: renames re-insert the row
    -- under the same id and must not cascade to forks.
    forked_from_id INTEGER,

    UNIQUE(namespace, name, tag)
);

CREATE INDEX IF NOT EXISTS idx_projects_digest ON projects(digest);
CREATE INDEX IF NOT EXISTS idx_projects_namespace_private ON projects(namespace, is_private);
CREATE INDEX IF NOT EXISTS idx_projects_last_update ON projects(last_update_date);
CREATE INDEX IF NOT EXISTS idx_projects_submission ON projects(submission_date);
CREATE INDEX IF NOT EXISTS idx_projects_forked_from ON projects(forked_from_id);
"#;
