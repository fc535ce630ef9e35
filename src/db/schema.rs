//! SQL DDL for the administrator identity table.

/// PostgreSQL schema.
/// - `email` UNIQUE: the backstop that makes concurrent bootstraps converge
/// - `token_hash` hex SHA-256 of the token; the token itself is never stored
pub const POSTGRES_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    token_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// SQLite schema, same shape. Used for local development and tests.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    token_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Split a DDL script into individual statements.
pub(crate) fn statements(ddl: &str) -> impl Iterator<Item = &str> {
    ddl.split(';').map(str::trim).filter(|s| !s.is_empty())
}
