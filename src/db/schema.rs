//! Database schema and migrations for Cumulus.
//!
//! Migrations are applied in order; `schema_version` records which ones ran.
//! Timestamps are written by the application (see `crate::datetime`), except
//! for refresh tokens which use SQLite's clock.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users and refresh tokens
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE,   -- stored lowercased
    password        TEXT NOT NULL,          -- Argon2 hash
    storage_limit   INTEGER NOT NULL,       -- bytes
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE refresh_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    revoked_at  TEXT
);

CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id);
"#,
    // v2: folders with a materialized ancestor path ('/' for root, '/1/5/' below)
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    path        TEXT NOT NULL DEFAULT '/',
    is_public   INTEGER NOT NULL DEFAULT 0,
    public_link TEXT,
    is_starred  INTEGER NOT NULL DEFAULT 0,
    starred_at  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX idx_folders_owner_parent ON folders(owner_id, parent_id);
CREATE INDEX idx_folders_path ON folders(path);
"#,
    // v3: files
    r#"
CREATE TABLE files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    url         TEXT NOT NULL,
    object_id   TEXT NOT NULL,
    size        INTEGER NOT NULL,
    kind        TEXT NOT NULL DEFAULT 'other',  -- image, video, pdf, other
    extension   TEXT NOT NULL DEFAULT '',
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    is_public   INTEGER NOT NULL DEFAULT 0,
    public_link TEXT,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    is_starred  INTEGER NOT NULL DEFAULT 0,
    starred_at  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX idx_files_owner_folder ON files(owner_id, folder_id);
CREATE INDEX idx_files_owner_deleted ON files(owner_id, is_deleted);
CREATE INDEX idx_files_updated_at ON files(updated_at);
"#,
    // v4: share lists, one entry per (entity, user)
    r#"
CREATE TABLE file_shares (
    resource_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    permission  TEXT NOT NULL CHECK (permission IN ('viewer', 'editor')),
    created_at  TEXT NOT NULL,
    PRIMARY KEY (resource_id, user_id)
);

CREATE TABLE folder_shares (
    resource_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    permission  TEXT NOT NULL CHECK (permission IN ('viewer', 'editor')),
    created_at  TEXT NOT NULL,
    PRIMARY KEY (resource_id, user_id)
);

CREATE INDEX idx_file_shares_user ON file_shares(user_id);
CREATE INDEX idx_folder_shares_user ON folder_shares(user_id);
"#,
];
