pub const SCHEMA: &str = r#"
-- Registered users; administrators are flagged directly on the row
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Browsing categories repositories can be filed under
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Repositories are soft-deleted; rows are never removed by this layer
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'unrestricted',
    description TEXT,
    long_description TEXT,
    remote_repository_url TEXT,
    homepage_url TEXT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    deleted INTEGER NOT NULL DEFAULT 0,
    times_downloaded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(user_id, name)
);

-- Access-control roles; each repository gets one 'system' admin role
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    type TEXT NOT NULL DEFAULT 'system',
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One extracted-metadata snapshot per (repository, changeset revision)
CREATE TABLE IF NOT EXISTS repository_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    changeset_revision TEXT NOT NULL,
    downloadable INTEGER NOT NULL DEFAULT 1,
    includes_tools_for_display_in_tool_panel INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL,  -- JSON blob

    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(repository_id, changeset_revision)
);

CREATE TABLE IF NOT EXISTS repository_category_associations (
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (repository_id, category_id)
);

CREATE TABLE IF NOT EXISTS repository_role_associations (
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (repository_id, role_id)
);

CREATE TABLE IF NOT EXISTS user_role_associations (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS group_role_associations (
    group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (group_id, role_id)
);

CREATE TABLE IF NOT EXISTS user_group_associations (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, group_id)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_repositories_user ON repositories(user_id);
CREATE INDEX IF NOT EXISTS idx_repository_metadata_repository ON repository_metadata(repository_id);
CREATE INDEX IF NOT EXISTS idx_category_associations_category ON repository_category_associations(category_id);
CREATE INDEX IF NOT EXISTS idx_role_associations_role ON repository_role_associations(role_id);
CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_role_associations(role_id);
CREATE INDEX IF NOT EXISTS idx_group_roles_role ON group_role_associations(role_id);
CREATE INDEX IF NOT EXISTS idx_user_groups_group ON user_group_associations(group_id);
"#;
