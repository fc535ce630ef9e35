use axum::{Json, extract::State};
use serde::Serialize;

use crate::db::{AdminIdentity, AdminStore};
use crate::error::PortalError;
use crate::middleware::auth::RequireAdmin;
use crate::router::PortalState;
use crate::service::connection::{ConnectionHandle, UnreachableReason};

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub database: &'static str,
    pub reason: Option<UnreachableReason>,
    pub admin_bootstrapped: bool,
    pub bootstrap_failures: u32,
}

/// GET /admin/status -> fresh probe result with the classified failure reason.
pub async fn admin_status_handler(
    _admin: RequireAdmin,
    State(state): State<PortalState>,
) -> Json<AdminStatus> {
    let mut handle = ConnectionHandle::default();
    let reason = handle.acquire(&state.manager).await.err();
    handle.release().await;

    Json(AdminStatus {
        database: if reason.is_none() { "connected" } else { "unreachable" },
        reason,
        admin_bootstrapped: state.admin_bootstrapped(),
        bootstrap_failures: state.bootstrap_failures(),
    })
}

/// GET /admin/identity -> the stored administrator record (never its token hash).
pub async fn admin_identity_handler(
    _admin: RequireAdmin,
    State(state): State<PortalState>,
) -> Result<Json<AdminIdentity>, PortalError> {
    let Some(admin) = state.config.admin_credentials() else {
        return Err(PortalError::NotFound);
    };

    let mut handle = ConnectionHandle::default();
    let found = match handle.acquire(&state.manager).await {
        Ok(conn) => conn.find_admin(admin.email).await,
        Err(reason) => Err(PortalError::Unavailable(reason)),
    };
    handle.release().await;

    found?.map(Json).ok_or(PortalError::NotFound)
}
