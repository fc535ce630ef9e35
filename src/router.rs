use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Configuration;
use crate::handlers::admin::{admin_identity_handler, admin_status_handler};
use crate::db::AdminStore;
use crate::handlers::home::home_handler;
use crate::service::admin_bootstrap::{BootstrapOutcome, ensure_admin};
use crate::service::connection::ConnectionManager;

/// Failed bootstrap attempts tolerated per process before giving up.
pub const MAX_BOOTSTRAP_FAILURES: u32 = 3;

/// Shared, read-only state plus the admin bootstrap cadence counters.
#[derive(Clone)]
pub struct PortalState {
    pub config: Arc<Configuration>,
    pub manager: ConnectionManager,
    admin_bootstrapped: Arc<AtomicBool>,
    bootstrap_failures: Arc<AtomicU32>,
}

impl PortalState {
    pub fn new(config: Arc<Configuration>) -> Self {
        let manager = ConnectionManager::new(&config);
        Self {
            config,
            manager,
            admin_bootstrapped: Arc::new(AtomicBool::new(false)),
            bootstrap_failures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn admin_bootstrapped(&self) -> bool {
        self.admin_bootstrapped.load(Ordering::Acquire)
    }

    pub fn bootstrap_failures(&self) -> u32 {
        self.bootstrap_failures.load(Ordering::Acquire)
    }

    /// Run the admin bootstrap until it has settled once in this process.
    ///
    /// A failure leaves the flag unset so a later connected request retries,
    /// up to [`MAX_BOOTSTRAP_FAILURES`] attempts. Returns `None` when no attempt
    /// was made.
    pub async fn bootstrap_admin_once<S: AdminStore>(
        &self,
        store: &mut S,
    ) -> Option<BootstrapOutcome> {
        if self.admin_bootstrapped() || self.bootstrap_failures() >= MAX_BOOTSTRAP_FAILURES {
            return None;
        }

        let outcome = ensure_admin(store, &self.config).await;
        if outcome.is_settled() {
            self.admin_bootstrapped.store(true, Ordering::Release);
        } else {
            let failures = self.bootstrap_failures.fetch_add(1, Ordering::AcqRel) + 1;
            if failures >= MAX_BOOTSTRAP_FAILURES {
                error!(
                    failures,
                    "admin bootstrap keeps failing; no further attempts until restart"
                );
            }
        }
        Some(outcome)
    }
}

pub fn portal_router(state: PortalState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/admin/status", get(admin_status_handler))
        .route("/admin/identity", get(admin_identity_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
