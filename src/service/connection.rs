use std::fmt;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, warn};

use crate::config::Configuration;

/// Why a probe could not produce a usable connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachableReason {
    AuthenticationFailed,
    NetworkUnavailable,
    Timeout,
    Unknown,
}

impl UnreachableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkUnavailable => "network_unavailable",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a driver error onto the probe failure taxonomy.
pub fn classify(error: &sqlx::Error) -> UnreachableReason {
    match error {
        sqlx::Error::Io(e) if e.kind() == ErrorKind::TimedOut => UnreachableReason::Timeout,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => UnreachableReason::NetworkUnavailable,
        sqlx::Error::PoolTimedOut => UnreachableReason::Timeout,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // invalid_password, invalid_authorization_specification
            Some("28P01") | Some("28000") => UnreachableReason::AuthenticationFailed,
            _ => UnreachableReason::Unknown,
        },
        _ => UnreachableReason::Unknown,
    }
}

/// Request-scoped connection state.
///
/// Starts `Unresolved`, is resolved by the first [`acquire`](Self::acquire),
/// and is never re-probed afterwards. Dropping a `Connected` handle closes the
/// socket; [`release`](Self::release) does so gracefully.
#[derive(Default)]
pub enum ConnectionHandle {
    #[default]
    Unresolved,
    Connected(PgConnection),
    Unreachable(UnreachableReason),
}

impl ConnectionHandle {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn reason(&self) -> Option<UnreachableReason> {
        match self {
            Self::Unreachable(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Probe on first use, then hand out the live connection or the cached failure.
    pub async fn acquire(
        &mut self,
        manager: &ConnectionManager,
    ) -> Result<&mut PgConnection, UnreachableReason> {
        if matches!(self, Self::Unresolved) {
            *self = manager.probe().await;
        }
        match self {
            Self::Connected(conn) => Ok(conn),
            Self::Unreachable(reason) => Err(*reason),
            Self::Unresolved => Err(UnreachableReason::Unknown),
        }
    }

    pub async fn release(self) {
        if let Self::Connected(conn) = self
            && let Err(e) = conn.close().await
        {
            debug!(error = %e, "database connection close failed; dropped instead");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => f.write_str("Unresolved"),
            Self::Connected(_) => f.write_str("Connected"),
            Self::Unreachable(reason) => f.debug_tuple("Unreachable").field(reason).finish(),
        }
    }
}

/// Opens single, bounded connection attempts against the managed instance.
#[derive(Clone)]
pub struct ConnectionManager {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(config: &Configuration) -> Self {
        let settings = &config.connection;
        let options = PgConnectOptions::new()
            .port(settings.port)
            .username(&config.db_user)
            .password(&config.db_password)
            .database(&config.db_name)
            .application_name("impact-portal")
            .options([("search_path", "public")]);
        let options = match settings.host.as_deref() {
            Some(host) => options.host(host),
            None => options.socket(settings.socket_dir.join(&config.instance_connection_name)),
        };
        Self {
            options,
            connect_timeout: settings.connect_timeout,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// One connection attempt; never `Unresolved`.
    pub async fn probe(&self) -> ConnectionHandle {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.connect_timeout, self.options.connect()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(conn)) => {
                debug!(?elapsed, "database probe succeeded");
                ConnectionHandle::Connected(conn)
            }
            Ok(Err(e)) => {
                let reason = classify(&e);
                warn!(%reason, ?elapsed, error = %e, "database probe failed");
                ConnectionHandle::Unreachable(reason)
            }
            Err(_) => {
                warn!(
                    reason = %UnreachableReason::Timeout,
                    timeout = ?self.connect_timeout,
                    "database probe timed out"
                );
                ConnectionHandle::Unreachable(UnreachableReason::Timeout)
            }
        }
    }
}
