pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;

pub use config::{ConfigResolver, Configuration};
pub use error::{ConfigError, PortalError};
pub use service::admin_bootstrap::{BootstrapOutcome, ensure_admin};
pub use service::connection::{ConnectionHandle, ConnectionManager, UnreachableReason};
