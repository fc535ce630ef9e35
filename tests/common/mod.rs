#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use impact_portal::Configuration;
use impact_portal::config::{ConnectionSettings, ServerSettings};

pub const DB_PASSWORD: &str = "pa55-w0rd-never-shown";
pub const ADMIN_EMAIL: &str = "admin@aiforimpact.local";
pub const ADMIN_TOKEN: &str = "admin-token-never-shown";

pub fn test_config(connection: ConnectionSettings) -> Configuration {
    Configuration {
        instance_connection_name: "impact-project:europe-west1:portal-db".to_string(),
        db_user: "portal".to_string(),
        db_password: DB_PASSWORD.to_string(),
        db_name: "portal".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        connection,
        server: ServerSettings::default(),
    }
}

/// Socket directory with no Postgres socket in it.
pub fn missing_socket(dir: &Path) -> ConnectionSettings {
    ConnectionSettings {
        socket_dir: dir.to_path_buf(),
        host: None,
        port: 5432,
        connect_timeout: Duration::from_secs(2),
    }
}

pub fn tcp(host: &str, port: u16, timeout: Duration) -> ConnectionSettings {
    ConnectionSettings {
        socket_dir: PathBuf::from("/nonexistent"),
        host: Some(host.to_string()),
        port,
        connect_timeout: timeout,
    }
}
