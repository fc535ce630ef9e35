use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use crate::db::models::AdminIdentity;
use crate::db::schema::{POSTGRES_INIT, SQLITE_INIT, statements};
use crate::error::PortalError;

/// Storage operations the admin bootstrap needs from a borrowed connection.
pub trait AdminStore: Send {
    /// Create the `admins` table if it does not exist yet.
    fn init_schema(&mut self) -> impl Future<Output = Result<(), PortalError>> + Send;

    fn find_admin(
        &mut self,
        email: &str,
    ) -> impl Future<Output = Result<Option<AdminIdentity>, PortalError>> + Send;

    /// Insert unless the email is already taken. Returns whether a row was created;
    /// a conflicting concurrent insert yields `false`, not an error.
    fn insert_admin(
        &mut self,
        email: &str,
        token_hash: &str,
    ) -> impl Future<Output = Result<bool, PortalError>> + Send;
}

/// SQLSTATEs Postgres raises when two sessions race on `CREATE ... IF NOT EXISTS`:
/// `unique_violation` on the catalog, `duplicate_table`, `duplicate_object`.
const DDL_RACE_CODES: [&str; 3] = ["23505", "42P07", "42710"];

pub(crate) fn is_ddl_race_code(code: &str) -> bool {
    DDL_RACE_CODES.contains(&code)
}

fn is_ddl_race(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| is_ddl_race_code(&code))
}

impl AdminStore for PgConnection {
    async fn init_schema(&mut self) -> Result<(), PortalError> {
        for stmt in statements(POSTGRES_INIT) {
            match sqlx::query(stmt).execute(&mut *self).await {
                Ok(_) => {}
                // a concurrent session created the same object first
                Err(e) if is_ddl_race(&e) => {
                    debug!(error = %e, "schema object created concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn find_admin(&mut self, email: &str) -> Result<Option<AdminIdentity>, PortalError> {
        let row = sqlx::query_as::<_, AdminIdentity>(
            "SELECT id, email, token_hash FROM admins WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self)
        .await?;
        Ok(row)
    }

    async fn insert_admin(&mut self, email: &str, token_hash: &str) -> Result<bool, PortalError> {
        let result = sqlx::query(
            r#"INSERT INTO admins (email, token_hash) VALUES ($1, $2)
               ON CONFLICT (email) DO NOTHING"#,
        )
        .bind(email)
        .bind(token_hash)
        .execute(&mut *self)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl AdminStore for SqliteConnection {
    async fn init_schema(&mut self) -> Result<(), PortalError> {
        // sqlx::query runs one statement at a time
        for stmt in statements(SQLITE_INIT) {
            sqlx::query(stmt).execute(&mut *self).await?;
        }
        Ok(())
    }

    async fn find_admin(&mut self, email: &str) -> Result<Option<AdminIdentity>, PortalError> {
        let row = sqlx::query_as::<_, AdminIdentity>(
            "SELECT id, email, token_hash FROM admins WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&mut *self)
        .await?;
        Ok(row)
    }

    async fn insert_admin(&mut self, email: &str, token_hash: &str) -> Result<bool, PortalError> {
        let result = sqlx::query(
            r#"INSERT INTO admins (email, token_hash) VALUES (?, ?)
               ON CONFLICT(email) DO NOTHING"#,
        )
        .bind(email)
        .bind(token_hash)
        .execute(&mut *self)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_create_codes_are_recognised() {
        assert!(is_ddl_race_code("23505"));
        assert!(is_ddl_race_code("42P07"));
        assert!(is_ddl_race_code("42710"));
    }

    #[test]
    fn other_failures_are_not_ddl_races() {
        // insufficient_privilege, undefined_table, syntax_error
        for code in ["42501", "42P01", "42601"] {
            assert!(!is_ddl_race_code(code), "{code}");
        }
    }
}
