use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        deleted: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_repository(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<RepositoryType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Repository {
        id: row.get(0)?,
        name: row.get(1)?,
        kind,
        description: row.get(3)?,
        long_description: row.get(4)?,
        remote_repository_url: row.get(5)?,
        homepage_url: row.get(6)?,
        user_id: row.get(7)?,
        deleted: row.get(8)?,
        times_downloaded: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

fn row_to_role(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    let role_type: String = row.get(3)?;
    let role_type = role_type.parse::<RoleType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        role_type,
        deleted: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepositoryMetadata> {
    let blob: String = row.get(5)?;
    let metadata = serde_json::from_str(&blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RepositoryMetadata {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        changeset_revision: row.get(2)?,
        downloadable: row.get(3)?,
        includes_tools_for_display_in_tool_panel: row.get(4)?,
        metadata,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const REPOSITORY_COLUMNS: &str = "id, name, type, description, long_description, \
     remote_repository_url, homepage_url, user_id, deleted, times_downloaded, \
     created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, email, is_admin, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![user.username, user.email, user.is_admin, format_datetime(&now)],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, is_admin, deleted, created_at, updated_at
             FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, is_admin, deleted, created_at, updated_at
             FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, email, is_admin, deleted, created_at, updated_at
             FROM users WHERE deleted = 0 ORDER BY email",
        )?;

        let rows = stmt.query_map([], row_to_user)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn has_admin_user(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_admin = 1 AND deleted = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Group operations

    fn create_group(&self, name: &str) -> Result<Group> {
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO groups (name, created_at) VALUES (?1, ?2)",
            params![name, format_datetime(&now)],
        )?;
        Ok(Group {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            deleted: false,
            created_at: now,
        })
    }

    fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, deleted, created_at FROM groups WHERE id = ?1",
            params![id],
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    deleted: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, deleted, created_at FROM groups WHERE name = ?1",
            params![name],
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    deleted: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, deleted, created_at FROM groups WHERE deleted = 0 ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                deleted: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn add_group_member(&self, user_id: i64, group_id: i64) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO user_group_associations (user_id, group_id) VALUES (?1, ?2)",
            params![user_id, group_id],
        )?;
        Ok(())
    }

    // Category operations

    fn create_category(&self, category: &NewCategory) -> Result<Category> {
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO categories (name, description, created_at) VALUES (?1, ?2, ?3)",
            params![category.name, category.description, format_datetime(&now)],
        )?;
        Ok(Category {
            id: conn.last_insert_rowid(),
            name: category.name.clone(),
            description: category.description.clone(),
            deleted: false,
            created_at: now,
        })
    }

    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, deleted, created_at FROM categories WHERE id = ?1",
            params![id],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    deleted: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, deleted, created_at FROM categories WHERE name = ?1",
            params![name],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    deleted: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, deleted, created_at
             FROM categories WHERE deleted = 0 ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                deleted: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Repository operations

    fn create_repository(
        &self,
        repository: &NewRepository,
        role_name: &str,
        role_description: &str,
        category_ids: &[i64],
    ) -> Result<(Repository, Role)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let now_text = format_datetime(&now);

        tx.execute(
            "INSERT INTO repositories (name, type, description, long_description,
                 remote_repository_url, homepage_url, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                repository.name,
                repository.kind.as_str(),
                repository.description,
                repository.long_description,
                repository.remote_repository_url,
                repository.homepage_url,
                repository.user_id,
                now_text,
            ],
        )?;
        let repository_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO roles (name, description, type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![role_name, role_description, RoleType::System.as_str(), now_text],
        )?;
        let role_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO user_role_associations (user_id, role_id) VALUES (?1, ?2)",
            params![repository.user_id, role_id],
        )?;
        tx.execute(
            "INSERT INTO repository_role_associations (repository_id, role_id) VALUES (?1, ?2)",
            params![repository_id, role_id],
        )?;

        for category_id in category_ids {
            tx.execute(
                "INSERT OR IGNORE INTO repository_category_associations (repository_id, category_id)
                 VALUES (?1, ?2)",
                params![repository_id, category_id],
            )?;
        }

        tx.commit()?;

        Ok((
            Repository {
                id: repository_id,
                name: repository.name.clone(),
                kind: repository.kind,
                description: repository.description.clone(),
                long_description: repository.long_description.clone(),
                remote_repository_url: repository.remote_repository_url.clone(),
                homepage_url: repository.homepage_url.clone(),
                user_id: repository.user_id,
                deleted: false,
                times_downloaded: 0,
                created_at: now,
                updated_at: now,
            },
            Role {
                id: role_id,
                name: role_name.to_string(),
                description: Some(role_description.to_string()),
                role_type: RoleType::System,
                deleted: false,
                created_at: now,
                updated_at: now,
            },
        ))
    }

    fn get_repository(&self, id: i64) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
            params![id],
            row_to_repository,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_by_name_and_owner(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT r.id, r.name, r.type, r.description, r.long_description,
                    r.remote_repository_url, r.homepage_url, r.user_id, r.deleted,
                    r.times_downloaded, r.created_at, r.updated_at
             FROM repositories r
             JOIN users u ON u.id = r.user_id
             WHERE r.name = ?1 AND u.username = ?2",
            params![name, owner],
            row_to_repository,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_repositories_by_category(
        &self,
        category_id: i64,
        installable_only: bool,
        sort_key: SortKey,
        sort_order: SortOrder,
        page: Option<u32>,
        per_page: u32,
    ) -> Result<Vec<RepositoryWithOwner>> {
        let conn = self.conn();

        let order_column = match sort_key {
            SortKey::Name => "r.name",
            SortKey::Owner => "u.username",
        };
        let order_direction = match sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let installable_filter = if installable_only {
            " AND EXISTS (SELECT 1 FROM repository_metadata rm
                  WHERE rm.repository_id = r.id AND rm.downloadable = 1)"
        } else {
            ""
        };
        let pagination = match page {
            Some(page) => format!(
                " LIMIT {} OFFSET {}",
                per_page,
                page.saturating_sub(1) * per_page
            ),
            None => String::new(),
        };

        let sql = format!(
            "SELECT r.id, r.name, r.type, r.description, r.long_description,
                    r.remote_repository_url, r.homepage_url, r.user_id, r.deleted,
                    r.times_downloaded, r.created_at, r.updated_at, u.username
             FROM repositories r
             JOIN users u ON u.id = r.user_id
             JOIN repository_category_associations rca ON rca.repository_id = r.id
             WHERE rca.category_id = ?1 AND r.deleted = 0{installable_filter}
             ORDER BY {order_column} {order_direction}{pagination}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![category_id], |row| {
            Ok(RepositoryWithOwner {
                repository: row_to_repository(row)?,
                owner: row.get(12)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn commit_repository_update(
        &self,
        repository: &Repository,
        category_ids: Option<&[i64]>,
        role_rename: Option<(&str, &str)>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        let rows = tx.execute(
            "UPDATE repositories SET name = ?1, type = ?2, description = ?3,
                 long_description = ?4, remote_repository_url = ?5, homepage_url = ?6,
                 updated_at = ?7
             WHERE id = ?8",
            params![
                repository.name,
                repository.kind.as_str(),
                repository.description,
                repository.long_description,
                repository.remote_repository_url,
                repository.homepage_url,
                now,
                repository.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::RepositoryNotFound);
        }

        if let Some(category_ids) = category_ids {
            tx.execute(
                "DELETE FROM repository_category_associations WHERE repository_id = ?1",
                params![repository.id],
            )?;
            for category_id in category_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO repository_category_associations (repository_id, category_id)
                     VALUES (?1, ?2)",
                    params![repository.id, category_id],
                )?;
            }
        }

        if let Some((old_name, new_name)) = role_rename {
            let rows = tx.execute(
                "UPDATE roles SET name = ?1, updated_at = ?2 WHERE name = ?3",
                params![new_name, now, old_name],
            )?;
            if rows == 0 {
                return Err(Error::RoleNotFound);
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn list_repository_categories(&self, repository_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.description, c.deleted, c.created_at
             FROM categories c
             JOIN repository_category_associations rca ON rca.category_id = c.id
             WHERE rca.repository_id = ?1
             ORDER BY c.name",
        )?;

        let rows = stmt.query_map(params![repository_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                deleted: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn increment_times_downloaded(&self, repository_id: i64) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET times_downloaded = times_downloaded + 1 WHERE id = ?1",
            params![repository_id],
        )?;

        if rows == 0 {
            return Err(Error::RepositoryNotFound);
        }
        Ok(())
    }

    fn set_repository_deleted(&self, repository_id: i64, deleted: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET deleted = ?1, updated_at = ?2 WHERE id = ?3",
            params![deleted, format_datetime(&Utc::now()), repository_id],
        )?;

        if rows == 0 {
            return Err(Error::RepositoryNotFound);
        }
        Ok(())
    }

    // Role operations

    fn get_role(&self, id: i64) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, type, deleted, created_at, updated_at
             FROM roles WHERE id = ?1",
            params![id],
            row_to_role,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, type, deleted, created_at, updated_at
             FROM roles WHERE name = ?1",
            params![name],
            row_to_role,
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_role_associations(
        &self,
        role_id: i64,
        user_ids: &[i64],
        group_ids: &[i64],
        repository_ids: &[i64],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM user_role_associations WHERE role_id = ?1",
            params![role_id],
        )?;
        tx.execute(
            "DELETE FROM group_role_associations WHERE role_id = ?1",
            params![role_id],
        )?;
        tx.execute(
            "DELETE FROM repository_role_associations WHERE role_id = ?1",
            params![role_id],
        )?;

        for user_id in user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO user_role_associations (user_id, role_id) VALUES (?1, ?2)",
                params![user_id, role_id],
            )?;
        }
        for group_id in group_ids {
            tx.execute(
                "INSERT OR IGNORE INTO group_role_associations (group_id, role_id) VALUES (?1, ?2)",
                params![group_id, role_id],
            )?;
        }
        for repository_id in repository_ids {
            tx.execute(
                "INSERT OR IGNORE INTO repository_role_associations (repository_id, role_id)
                 VALUES (?1, ?2)",
                params![repository_id, role_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_role_users(&self, role_id: i64) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.email, u.is_admin, u.deleted, u.created_at, u.updated_at
             FROM users u
             JOIN user_role_associations ura ON ura.user_id = u.id
             WHERE ura.role_id = ?1 AND u.deleted = 0
             ORDER BY u.email",
        )?;

        let rows = stmt.query_map(params![role_id], row_to_user)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_role_groups(&self, role_id: i64) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT g.id, g.name, g.deleted, g.created_at
             FROM groups g
             JOIN group_role_associations gra ON gra.group_id = g.id
             WHERE gra.role_id = ?1 AND g.deleted = 0
             ORDER BY g.name",
        )?;

        let rows = stmt.query_map(params![role_id], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                deleted: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn user_has_repository_role(&self, user_id: i64, repository_id: i64) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM repository_role_associations rra
             WHERE rra.repository_id = ?2
               AND (EXISTS (SELECT 1 FROM user_role_associations ura
                            WHERE ura.role_id = rra.role_id AND ura.user_id = ?1)
                    OR EXISTS (SELECT 1 FROM group_role_associations gra
                               JOIN user_group_associations uga ON uga.group_id = gra.group_id
                               WHERE gra.role_id = rra.role_id AND uga.user_id = ?1))",
            params![user_id, repository_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Metadata operations

    fn create_repository_metadata(
        &self,
        metadata: &NewRepositoryMetadata,
    ) -> Result<RepositoryMetadata> {
        let blob = serde_json::to_string(&metadata.metadata)?;
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO repository_metadata (repository_id, changeset_revision, downloadable,
                 includes_tools_for_display_in_tool_panel, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metadata.repository_id,
                metadata.changeset_revision,
                metadata.downloadable,
                metadata.includes_tools_for_display_in_tool_panel,
                blob,
                format_datetime(&now),
            ],
        )?;
        Ok(RepositoryMetadata {
            id: conn.last_insert_rowid(),
            repository_id: metadata.repository_id,
            changeset_revision: metadata.changeset_revision.clone(),
            downloadable: metadata.downloadable,
            includes_tools_for_display_in_tool_panel: metadata
                .includes_tools_for_display_in_tool_panel,
            metadata: metadata.metadata.clone(),
            created_at: now,
        })
    }

    fn get_repository_metadata(
        &self,
        repository_id: i64,
        changeset_revision: &str,
    ) -> Result<Option<RepositoryMetadata>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, repository_id, changeset_revision, downloadable,
                    includes_tools_for_display_in_tool_panel, metadata, created_at
             FROM repository_metadata
             WHERE repository_id = ?1 AND changeset_revision = ?2",
            params![repository_id, changeset_revision],
            row_to_metadata,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_downloadable_revisions(&self, repository_id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT changeset_revision FROM repository_metadata
             WHERE repository_id = ?1 AND downloadable = 1
             ORDER BY id",
        )?;

        let rows = stmt.query_map(params![repository_id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn new_repository(name: &str, user_id: i64) -> NewRepository {
        NewRepository {
            name: name.to_string(),
            kind: RepositoryType::Unrestricted,
            description: Some("a test repository".to_string()),
            long_description: None,
            remote_repository_url: None,
            homepage_url: None,
            user_id,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"groups".to_string()));
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"repositories".to_string()));
        assert!(tables.contains(&"roles".to_string()));
        assert!(tables.contains(&"repository_metadata".to_string()));
        assert!(tables.contains(&"repository_category_associations".to_string()));
        assert!(tables.contains(&"repository_role_associations".to_string()));
        assert!(tables.contains(&"user_role_associations".to_string()));
        assert!(tables.contains(&"group_role_associations".to_string()));
        assert!(tables.contains(&"user_group_associations".to_string()));
    }

    #[test]
    fn test_user_crud() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let user = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        assert!(user.id > 0);

        let fetched = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert!(!fetched.is_admin);

        let by_name = store.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        assert!(!store.has_admin_user().unwrap());
        store
            .create_user(&NewUser {
                username: "root".to_string(),
                email: "root@example.org".to_string(),
                is_admin: true,
            })
            .unwrap();
        assert!(store.has_admin_user().unwrap());
    }

    #[test]
    fn test_create_repository_creates_role_and_associations() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let category = store
            .create_category(&NewCategory {
                name: "Sequence Analysis".to_string(),
                description: None,
            })
            .unwrap();

        let (repository, role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[category.id],
            )
            .unwrap();

        assert_eq!(role.role_type, RoleType::System);
        assert!(store.user_has_repository_role(alice.id, repository.id).unwrap());

        let members = store.list_role_users(role.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "alice");

        let categories = store.list_repository_categories(repository.id).unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Sequence Analysis");

        let by_name = store
            .get_repository_by_name_and_owner("my_tool", "alice")
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, repository.id);
    }

    #[test]
    fn test_commit_repository_update_is_transactional() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let first = store
            .create_category(&NewCategory {
                name: "Assembly".to_string(),
                description: None,
            })
            .unwrap();
        let second = store
            .create_category(&NewCategory {
                name: "Variant Calling".to_string(),
                description: None,
            })
            .unwrap();

        let (mut repository, _role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[first.id],
            )
            .unwrap();

        repository.name = "my_tool_v2".to_string();
        repository.description = Some("updated".to_string());
        store
            .commit_repository_update(
                &repository,
                Some(&[second.id]),
                Some(("my_tool_alice_admin", "my_tool_v2_alice_admin")),
            )
            .unwrap();

        let fetched = store.get_repository(repository.id).unwrap().unwrap();
        assert_eq!(fetched.name, "my_tool_v2");
        assert_eq!(fetched.description.as_deref(), Some("updated"));

        let categories = store.list_repository_categories(repository.id).unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Variant Calling");

        assert!(store.get_role_by_name("my_tool_alice_admin").unwrap().is_none());
        assert!(store.get_role_by_name("my_tool_v2_alice_admin").unwrap().is_some());

        // A rename that misses its role rolls back the scalar update too.
        repository.name = "my_tool_v3".to_string();
        let result = store.commit_repository_update(
            &repository,
            None,
            Some(("no_such_role", "my_tool_v3_alice_admin")),
        );
        assert!(matches!(result, Err(Error::RoleNotFound)));

        let fetched = store.get_repository(repository.id).unwrap().unwrap();
        assert_eq!(fetched.name, "my_tool_v2");
    }

    #[test]
    fn test_set_role_associations_resets_membership() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let bob = store
            .create_user(&NewUser {
                username: "bob".to_string(),
                email: "bob@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let devs = store.create_group("devs").unwrap();

        let (repository, role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[],
            )
            .unwrap();

        store
            .set_role_associations(role.id, &[alice.id, bob.id], &[devs.id], &[repository.id])
            .unwrap();

        let members = store.list_role_users(role.id).unwrap();
        assert_eq!(members.len(), 2);
        let groups = store.list_role_groups(role.id).unwrap();
        assert_eq!(groups.len(), 1);

        store
            .set_role_associations(role.id, &[alice.id], &[], &[repository.id])
            .unwrap();
        let members = store.list_role_users(role.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "alice");
        assert!(store.list_role_groups(role.id).unwrap().is_empty());
        assert!(!store.user_has_repository_role(bob.id, repository.id).unwrap());
    }

    #[test]
    fn test_role_membership_through_groups() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let carol = store
            .create_user(&NewUser {
                username: "carol".to_string(),
                email: "carol@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let devs = store.create_group("devs").unwrap();
        store.add_group_member(carol.id, devs.id).unwrap();

        let (repository, role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[],
            )
            .unwrap();

        assert!(!store.user_has_repository_role(carol.id, repository.id).unwrap());
        store
            .set_role_associations(role.id, &[alice.id], &[devs.id], &[repository.id])
            .unwrap();
        assert!(store.user_has_repository_role(carol.id, repository.id).unwrap());
    }

    #[test]
    fn test_metadata_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let (repository, _role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[],
            )
            .unwrap();

        let blob = MetadataBlob {
            tools: Some(vec![serde_json::json!({"id": "my_tool", "version": "1.0"})]),
            ..MetadataBlob::default()
        };
        store
            .create_repository_metadata(&NewRepositoryMetadata {
                repository_id: repository.id,
                changeset_revision: "abc123def456".to_string(),
                downloadable: true,
                includes_tools_for_display_in_tool_panel: true,
                metadata: blob.clone(),
            })
            .unwrap();

        let fetched = store
            .get_repository_metadata(repository.id, "abc123def456")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.metadata, blob);
        assert!(fetched.includes_tools_for_display_in_tool_panel);
        assert!(store
            .get_repository_metadata(repository.id, "ffffffffffff")
            .unwrap()
            .is_none());

        assert_eq!(
            store.list_downloadable_revisions(repository.id).unwrap(),
            vec!["abc123def456".to_string()]
        );
    }

    #[test]
    fn test_list_repositories_by_category() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let bob = store
            .create_user(&NewUser {
                username: "bob".to_string(),
                email: "bob@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let category = store
            .create_category(&NewCategory {
                name: "Sequence Analysis".to_string(),
                description: None,
            })
            .unwrap();

        let (zeta, _) = store
            .create_repository(
                &new_repository("zeta_tool", alice.id),
                "zeta_tool_alice_admin",
                "Administrators of zeta_tool",
                &[category.id],
            )
            .unwrap();
        store
            .create_repository(
                &new_repository("alpha_tool", bob.id),
                "alpha_tool_bob_admin",
                "Administrators of alpha_tool",
                &[category.id],
            )
            .unwrap();

        let listed = store
            .list_repositories_by_category(
                category.id,
                false,
                SortKey::Name,
                SortOrder::Asc,
                None,
                25,
            )
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].repository.name, "alpha_tool");
        assert_eq!(listed[1].owner, "alice");

        let by_owner_desc = store
            .list_repositories_by_category(
                category.id,
                false,
                SortKey::Owner,
                SortOrder::Desc,
                None,
                25,
            )
            .unwrap();
        assert_eq!(by_owner_desc[0].owner, "bob");

        // Only zeta_tool has downloadable metadata.
        store
            .create_repository_metadata(&NewRepositoryMetadata {
                repository_id: zeta.id,
                changeset_revision: "abc123def456".to_string(),
                downloadable: true,
                includes_tools_for_display_in_tool_panel: false,
                metadata: MetadataBlob::default(),
            })
            .unwrap();
        let installable = store
            .list_repositories_by_category(
                category.id,
                true,
                SortKey::Name,
                SortOrder::Asc,
                None,
                25,
            )
            .unwrap();
        assert_eq!(installable.len(), 1);
        assert_eq!(installable[0].repository.name, "zeta_tool");

        let paged = store
            .list_repositories_by_category(
                category.id,
                false,
                SortKey::Name,
                SortOrder::Asc,
                Some(2),
                1,
            )
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].repository.name, "zeta_tool");
    }

    #[test]
    fn test_times_downloaded_and_soft_delete() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        let (repository, _role) = store
            .create_repository(
                &new_repository("my_tool", alice.id),
                "my_tool_alice_admin",
                "Administrators of my_tool",
                &[],
            )
            .unwrap();

        store.increment_times_downloaded(repository.id).unwrap();
        store.increment_times_downloaded(repository.id).unwrap();
        let fetched = store.get_repository(repository.id).unwrap().unwrap();
        assert_eq!(fetched.times_downloaded, 2);

        store.set_repository_deleted(repository.id, true).unwrap();
        let fetched = store.get_repository(repository.id).unwrap().unwrap();
        assert!(fetched.deleted);

        assert!(matches!(
            store.increment_times_downloaded(9999),
            Err(Error::RepositoryNotFound)
        ));
    }
}
