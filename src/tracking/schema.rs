//! Tracking store schema

pub const SCHEMA: &str = r#"
-- Repositories marked for monitoring. (owner, name) is unique by lookup only.
CREATE TABLE IF NOT EXISTS tracked_repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- Projects V2 marked for monitoring, keyed by GitHub node id.
CREATE TABLE IF NOT EXISTS tracked_projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    organization TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tracked_repositories_owner_name
    ON tracked_repositories(owner COLLATE NOCASE, name COLLATE NOCASE);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tracked_projects_project_id
    ON tracked_projects(project_id);
"#;
