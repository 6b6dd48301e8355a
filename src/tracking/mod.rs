//! Local tracking list
//!
//! SQLite storage for the repositories and projects an agent has been asked
//! to keep an eye on. The two tables are independent:
//! - Repositories are identified by (owner, name), matched case-insensitively
//! - Projects are identified by their GitHub node id (unique index)
//!
//! Removal is a soft delete by default; a duplicate add reactivates the
//! existing row instead of inserting a new one.

mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use crate::error::{McpGithubError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRepository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TrackedRepository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedProject {
    pub id: i64,
    pub project_id: String,
    pub title: String,
    pub organization: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// What an add call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Created,
    Reactivated,
    AlreadyTracked,
}

/// What a remove call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Deactivated,
    Deleted,
}

const REPOSITORY_COLUMNS: &str = "id, owner, name, is_active, created_at";
const PROJECT_COLUMNS: &str = "id, project_id, title, organization, is_active, created_at";

/// Database handle for the tracking list
pub struct TrackingStore {
    conn: Connection,
}

impl TrackingStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn add_repository(&self, owner: &str, name: &str) -> Result<(TrackedRepository, AddOutcome)> {
        let existing = self
            .conn
            .query_row(
                &format!(
                    "SELECT {REPOSITORY_COLUMNS} FROM tracked_repositories
                     WHERE owner = ?1 COLLATE NOCASE AND name = ?2 COLLATE NOCASE
                     ORDER BY id LIMIT 1"
                ),
                params![owner, name],
                Self::row_to_repository,
            )
            .optional()?;

        if let Some(repo) = existing {
            if repo.is_active {
                return Ok((repo, AddOutcome::AlreadyTracked));
            }
            self.conn.execute(
                "UPDATE tracked_repositories SET is_active = 1 WHERE id = ?1",
                params![repo.id],
            )?;
            info!(id = repo.id, repo = %repo.full_name(), "Reactivated tracked repository");
            let repo = TrackedRepository {
                is_active: true,
                ..repo
            };
            return Ok((repo, AddOutcome::Reactivated));
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO tracked_repositories (owner, name, is_active, created_at)
             VALUES (?1, ?2, 1, ?3)",
            params![owner, name, created_at],
        )?;
        let repo = TrackedRepository {
            id: self.conn.last_insert_rowid(),
            owner: owner.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at,
        };
        info!(id = repo.id, repo = %repo.full_name(), "Tracking repository");
        Ok((repo, AddOutcome::Created))
    }

    pub fn get_repository(&self, id: i64) -> Result<Option<TrackedRepository>> {
        let repo = self
            .conn
            .query_row(
                &format!("SELECT {REPOSITORY_COLUMNS} FROM tracked_repositories WHERE id = ?1"),
                params![id],
                Self::row_to_repository,
            )
            .optional()?;
        Ok(repo)
    }

    pub fn list_repositories(&self, include_inactive: bool) -> Result<Vec<TrackedRepository>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM tracked_repositories
             WHERE ?1 OR is_active = 1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![include_inactive], Self::row_to_repository)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn remove_repository(&self, id: i64, hard_delete: bool) -> Result<(TrackedRepository, RemoveOutcome)> {
        let repo = self
            .get_repository(id)?
            .ok_or_else(|| McpGithubError::NotFound(format!("Tracked repository {}", id)))?;

        if hard_delete {
            self.conn
                .execute("DELETE FROM tracked_repositories WHERE id = ?1", params![id])?;
            info!(id, repo = %repo.full_name(), "Deleted tracked repository");
            return Ok((repo, RemoveOutcome::Deleted));
        }

        self.conn.execute(
            "UPDATE tracked_repositories SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        info!(id, repo = %repo.full_name(), "Deactivated tracked repository");
        let repo = TrackedRepository {
            is_active: false,
            ..repo
        };
        Ok((repo, RemoveOutcome::Deactivated))
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Track a project. The title and organization are refreshed on every call.
    pub fn add_project(
        &self,
        project_id: &str,
        title: &str,
        organization: &str,
    ) -> Result<(TrackedProject, AddOutcome)> {
        if let Some(project) = self.get_project_by_node_id(project_id)? {
            self.conn.execute(
                "UPDATE tracked_projects SET title = ?1, organization = ?2, is_active = 1
                 WHERE id = ?3",
                params![title, organization, project.id],
            )?;
            let outcome = if project.is_active {
                AddOutcome::AlreadyTracked
            } else {
                info!(id = project.id, project_id, "Reactivated tracked project");
                AddOutcome::Reactivated
            };
            let project = TrackedProject {
                title: title.to_string(),
                organization: organization.to_string(),
                is_active: true,
                ..project
            };
            return Ok((project, outcome));
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO tracked_projects (project_id, title, organization, is_active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![project_id, title, organization, created_at],
        )?;
        let project = TrackedProject {
            id: self.conn.last_insert_rowid(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            organization: organization.to_string(),
            is_active: true,
            created_at,
        };
        info!(id = project.id, project_id, title, "Tracking project");
        Ok((project, AddOutcome::Created))
    }

    pub fn get_project(&self, id: i64) -> Result<Option<TrackedProject>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM tracked_projects WHERE id = ?1"),
                params![id],
                Self::row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    pub fn get_project_by_node_id(&self, project_id: &str) -> Result<Option<TrackedProject>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM tracked_projects WHERE project_id = ?1"),
                params![project_id],
                Self::row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self, include_inactive: bool) -> Result<Vec<TrackedProject>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM tracked_projects
             WHERE ?1 OR is_active = 1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![include_inactive], Self::row_to_project)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn remove_project(&self, id: i64, hard_delete: bool) -> Result<(TrackedProject, RemoveOutcome)> {
        let project = self
            .get_project(id)?
            .ok_or_else(|| McpGithubError::NotFound(format!("Tracked project {}", id)))?;

        if hard_delete {
            self.conn
                .execute("DELETE FROM tracked_projects WHERE id = ?1", params![id])?;
            info!(id, project_id = %project.project_id, "Deleted tracked project");
            return Ok((project, RemoveOutcome::Deleted));
        }

        self.conn.execute(
            "UPDATE tracked_projects SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        info!(id, project_id = %project.project_id, "Deactivated tracked project");
        let project = TrackedProject {
            is_active: false,
            ..project
        };
        Ok((project, RemoveOutcome::Deactivated))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn row_to_repository(row: &Row<'_>) -> rusqlite::Result<TrackedRepository> {
        Ok(TrackedRepository {
            id: row.get(0)?,
            owner: row.get(1)?,
            name: row.get(2)?,
            is_active: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn row_to_project(row: &Row<'_>) -> rusqlite::Result<TrackedProject> {
        Ok(TrackedProject {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            organization: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TrackingStore {
        TrackingStore::in_memory().unwrap()
    }

    #[test]
    fn test_add_repository_creates_row() {
        let store = store();
        let (repo, outcome) = store.add_repository("octo-org", "widgets").unwrap();
        assert_eq!(outcome, AddOutcome::Created);
        assert!(repo.is_active);
        assert_eq!(repo.full_name(), "octo-org/widgets");
        assert_eq!(store.get_repository(repo.id).unwrap(), Some(repo));
    }

    #[test]
    fn test_add_repository_twice_does_not_duplicate() {
        let store = store();
        let (first, _) = store.add_repository("octo-org", "widgets").unwrap();
        let (second, outcome) = store.add_repository("octo-org", "widgets").unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyTracked);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_repositories(true).unwrap().len(), 1);
    }

    #[test]
    fn test_add_repository_lookup_ignores_case() {
        let store = store();
        let (first, _) = store.add_repository("Octo-Org", "Widgets").unwrap();
        let (second, outcome) = store.add_repository("octo-org", "widgets").unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyTracked);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_add_inactive_repository_reactivates() {
        let store = store();
        let (repo, _) = store.add_repository("octo-org", "widgets").unwrap();
        store.remove_repository(repo.id, false).unwrap();

        let (again, outcome) = store.add_repository("octo-org", "widgets").unwrap();
        assert_eq!(outcome, AddOutcome::Reactivated);
        assert_eq!(again.id, repo.id);
        assert!(again.is_active);
        assert_eq!(again.created_at, repo.created_at);

        let all = store.list_repositories(true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_active);
    }

    #[test]
    fn test_soft_delete_repository() {
        let store = store();
        let (repo, _) = store.add_repository("octo-org", "widgets").unwrap();
        let (removed, outcome) = store.remove_repository(repo.id, false).unwrap();
        assert_eq!(outcome, RemoveOutcome::Deactivated);
        assert!(!removed.is_active);

        assert!(store.list_repositories(false).unwrap().is_empty());
        let all = store.list_repositories(true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
    }

    #[test]
    fn test_hard_delete_repository() {
        let store = store();
        let (repo, _) = store.add_repository("octo-org", "widgets").unwrap();
        let (_, outcome) = store.remove_repository(repo.id, true).unwrap();
        assert_eq!(outcome, RemoveOutcome::Deleted);
        assert!(store.get_repository(repo.id).unwrap().is_none());
        assert!(store.list_repositories(true).unwrap().is_empty());
    }

    #[test]
    fn test_remove_unknown_repository() {
        let store = store();
        let err = store.remove_repository(99, false).unwrap_err();
        assert!(matches!(err, McpGithubError::NotFound(_)));
    }

    #[test]
    fn test_list_repositories_newest_first() {
        let store = store();
        let (a, _) = store.add_repository("octo-org", "a").unwrap();
        let (b, _) = store.add_repository("octo-org", "b").unwrap();
        let ids: Vec<i64> = store
            .list_repositories(false)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_add_project_refreshes_title() {
        let store = store();
        let (first, outcome) = store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        assert_eq!(outcome, AddOutcome::Created);

        let (second, outcome) = store
            .add_project("PVT_1", "Roadmap 2026", "octo-org")
            .unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyTracked);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Roadmap 2026");

        let stored = store.get_project(first.id).unwrap().unwrap();
        assert_eq!(stored.title, "Roadmap 2026");
        assert_eq!(store.list_projects(true).unwrap().len(), 1);
    }

    #[test]
    fn test_add_inactive_project_reactivates() {
        let store = store();
        let (project, _) = store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        store.remove_project(project.id, false).unwrap();
        assert!(store.list_projects(false).unwrap().is_empty());

        let (again, outcome) = store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        assert_eq!(outcome, AddOutcome::Reactivated);
        assert_eq!(again.id, project.id);
        assert_eq!(store.list_projects(false).unwrap().len(), 1);
    }

    #[test]
    fn test_hard_delete_project() {
        let store = store();
        let (project, _) = store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        let (_, outcome) = store.remove_project(project.id, true).unwrap();
        assert_eq!(outcome, RemoveOutcome::Deleted);
        assert!(store.get_project_by_node_id("PVT_1").unwrap().is_none());

        // A fresh add after a hard delete creates a new row.
        let (fresh, outcome) = store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        assert_eq!(outcome, AddOutcome::Created);
        assert_ne!(fresh.id, project.id);
    }

    #[test]
    fn test_project_node_id_is_unique() {
        let store = store();
        store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        let result = store.conn.execute(
            "INSERT INTO tracked_projects (project_id, title, organization, is_active, created_at)
             VALUES ('PVT_1', 'dup', 'octo-org', 1, ?1)",
            params![Utc::now()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_tables_are_independent() {
        let store = store();
        let (repo, _) = store.add_repository("octo-org", "widgets").unwrap();
        store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        store.remove_repository(repo.id, true).unwrap();
        assert_eq!(store.list_projects(false).unwrap().len(), 1);
    }

    #[test]
    fn test_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.db");

        {
            let store = TrackingStore::open(&path).unwrap();
            store.add_repository("octo-org", "widgets").unwrap();
            store.add_project("PVT_1", "Roadmap", "octo-org").unwrap();
        }

        let store = TrackingStore::open(&path).unwrap();
        let repos = store.list_repositories(false).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "widgets");
        assert_eq!(store.list_projects(false).unwrap()[0].title, "Roadmap");
    }
}
