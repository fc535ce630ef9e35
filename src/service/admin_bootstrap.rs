use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::db::AdminStore;
use crate::error::PortalError;

/// Result of one bootstrap attempt.
#[derive(Debug)]
pub enum BootstrapOutcome {
    Created,
    /// The email was already registered, possibly by a concurrent attempt.
    AlreadyExists,
    /// Admin pair not fully configured.
    Skipped,
    Failed(PortalError),
}

impl BootstrapOutcome {
    /// Whether the identity is known to be present (or deliberately absent).
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Lowercase hex SHA-256 of the admin token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Ensure the configured administrator exists, without ever overwriting one.
pub async fn ensure_admin<S: AdminStore>(store: &mut S, config: &Configuration) -> BootstrapOutcome {
    let Some(admin) = config.admin_credentials() else {
        debug!("admin credentials incomplete; bootstrap skipped");
        return BootstrapOutcome::Skipped;
    };

    let outcome = match try_ensure(store, admin.email, admin.token).await {
        Ok(true) => BootstrapOutcome::Created,
        Ok(false) => BootstrapOutcome::AlreadyExists,
        Err(e) => BootstrapOutcome::Failed(e),
    };

    match &outcome {
        BootstrapOutcome::Created => info!(email = %admin.email, "admin identity created"),
        BootstrapOutcome::AlreadyExists => {
            debug!(email = %admin.email, "admin identity already present")
        }
        BootstrapOutcome::Failed(e) => {
            warn!(email = %admin.email, error = %e, "admin bootstrap failed")
        }
        BootstrapOutcome::Skipped => {}
    }
    outcome
}

async fn try_ensure<S: AdminStore>(store: &mut S, email: &str, token: &str) -> Result<bool, PortalError> {
    store.init_schema().await?;
    if store.find_admin(email).await?.is_some() {
        return Ok(false);
    }
    store.insert_admin(email, &hash_token(token)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = hash_token("secret");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
        assert_ne!(hash, "secret");
    }
}
