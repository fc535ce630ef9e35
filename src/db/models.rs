use serde::Serialize;
use sqlx::FromRow;

/// Stored administrator record. Only the token hash is ever persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, FromRow)]
pub struct AdminIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
}
