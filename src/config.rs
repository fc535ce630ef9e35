//! Configuration resolution.
//!
//! Values come from two layers, merged with `figment`:
//! 1. the `env_variables` mapping of a declarative YAML file (`app.yaml`);
//! 2. the process environment, merged on top.
//!
//! The environment always wins for a key it sets. A variable that is set but
//! blank counts as unset and falls back to the file. Environment values are
//! taken verbatim as strings; numeric knobs are parsed after merging.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
    value::{Dict, Value},
};
use serde::{Deserialize, Deserializer, de};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "app.yaml";

/// Keys that must resolve for the process to start, in reporting order.
pub const REQUIRED_KEYS: [&str; 4] =
    ["INSTANCE_CONNECTION_NAME", "DB_USER", "DB_PASS", "DB_NAME"];

/// Every key the resolver reads from either layer.
pub const KNOWN_KEYS: [&str; 12] = [
    "INSTANCE_CONNECTION_NAME",
    "DB_USER",
    "DB_PASS",
    "DB_NAME",
    "ADMIN_EMAIL",
    "ADMIN_TOKEN",
    "DB_SOCKET_DIR",
    "DB_HOST",
    "DB_PORT",
    "DB_CONNECT_TIMEOUT_SECS",
    "PORT",
    "LOGLEVEL",
];

pub const DEFAULT_SOCKET_DIR: &str = "/cloudsql";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_LOGLEVEL: &str = "info";

/// Resolved, immutable portal configuration.
#[derive(Clone)]
pub struct Configuration {
    pub instance_connection_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub admin_email: Option<String>,
    pub admin_token: Option<String>,
    pub connection: ConnectionSettings,
    pub server: ServerSettings,
}

/// Borrowed view of a complete administrator pair.
#[derive(Clone, Copy)]
pub struct AdminCredentials<'a> {
    pub email: &'a str,
    pub token: &'a str,
}

impl Configuration {
    /// Both admin fields, or `None` when either is absent.
    pub fn admin_credentials(&self) -> Option<AdminCredentials<'_>> {
        match (self.admin_email.as_deref(), self.admin_token.as_deref()) {
            (Some(email), Some(token)) => Some(AdminCredentials { email, token }),
            _ => None,
        }
    }

    /// Non-fatal findings the host should report at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        match (&self.admin_email, &self.admin_token) {
            (Some(_), None) => warnings.push(
                "ADMIN_EMAIL is set without ADMIN_TOKEN; admin bootstrap disabled".to_string(),
            ),
            (None, Some(_)) => warnings.push(
                "ADMIN_TOKEN is set without ADMIN_EMAIL; admin bootstrap disabled".to_string(),
            ),
            _ => {}
        }
        warnings
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("instance_connection_name", &self.instance_connection_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("admin_email", &self.admin_email)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("connection", &self.connection)
            .field("server", &self.server)
            .finish()
    }
}

/// How the connection manager reaches the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Parent directory of per-instance unix sockets.
    pub socket_dir: PathBuf,
    /// TCP host; when set it takes precedence over the socket.
    pub host: Option<String>,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            host: None,
            port: DEFAULT_DB_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub port: u16,
    pub loglevel: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            loglevel: DEFAULT_LOGLEVEL.to_string(),
        }
    }
}

/// Merged view of both layers before validation.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default, deserialize_with = "lenient_string")]
    instance_connection_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_pass: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    admin_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    admin_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_socket_dir: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_host: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_port: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    db_connect_timeout_secs: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    port: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    loglevel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppFile {
    #[serde(default)]
    env_variables: Dict,
}

/// Reads configuration from the environment and a declarative file.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    file: PathBuf,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl ConfigResolver {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Resolve the configuration. Fails with the list of absent required keys.
    pub fn resolve(&self) -> Result<Configuration, ConfigError> {
        let raw: RawSettings = Figment::new()
            .merge(Serialized::defaults(file_variables(&self.file)))
            .merge(Serialized::defaults(env_variables()))
            .extract()?;
        build(raw)
    }
}

/// Known, non-blank environment variables with lowercased keys.
/// Values stay strings: `007` or `[x]` in `DB_PASS` must reach Postgres as typed.
fn env_variables() -> Dict {
    KNOWN_KEYS
        .iter()
        .filter_map(|key| {
            let value = std::env::var(key).ok().filter(|v| !v.trim().is_empty())?;
            Some((key.to_ascii_lowercase(), Value::from(value)))
        })
        .collect()
}

/// `env_variables` of the file with lowercased keys; empty when unusable.
fn file_variables(path: &Path) -> Dict {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found; using environment only");
        return Dict::new();
    }

    match Figment::from(Yaml::file(path)).extract::<AppFile>() {
        Ok(file) => file
            .env_variables
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect(),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file; using environment only"
            );
            Dict::new()
        }
    }
}

fn build(raw: RawSettings) -> Result<Configuration, ConfigError> {
    let mut missing = Vec::new();
    let instance_connection_name =
        required(&mut missing, REQUIRED_KEYS[0], raw.instance_connection_name);
    let db_user = required(&mut missing, REQUIRED_KEYS[1], raw.db_user);
    let db_password = required(&mut missing, REQUIRED_KEYS[2], raw.db_pass);
    let db_name = required(&mut missing, REQUIRED_KEYS[3], raw.db_name);

    if !missing.is_empty() {
        return Err(ConfigError::Missing { keys: missing });
    }

    let connect_timeout_secs: u64 = parse_knob(
        "DB_CONNECT_TIMEOUT_SECS",
        raw.db_connect_timeout_secs,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    )?;
    if connect_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "DB_CONNECT_TIMEOUT_SECS must be greater than zero".to_string(),
        ));
    }

    let connection = ConnectionSettings {
        socket_dir: non_blank(raw.db_socket_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR)),
        host: non_blank(raw.db_host),
        port: parse_knob("DB_PORT", raw.db_port, DEFAULT_DB_PORT)?,
        connect_timeout: Duration::from_secs(connect_timeout_secs),
    };
    let server = ServerSettings {
        port: parse_knob("PORT", raw.port, DEFAULT_HTTP_PORT)?,
        loglevel: non_blank(raw.loglevel).unwrap_or_else(|| DEFAULT_LOGLEVEL.to_string()),
    };

    Ok(Configuration {
        instance_connection_name,
        db_user,
        db_password,
        db_name,
        admin_email: non_blank(raw.admin_email),
        admin_token: non_blank(raw.admin_token),
        connection,
        server,
    })
}

fn required(missing: &mut Vec<&'static str>, key: &'static str, value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| {
        missing.push(key);
        String::new()
    })
}

fn parse_knob<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match non_blank(value) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a non-negative integer"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accept any YAML/env scalar as its string form.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScalarVisitor;

    impl<'de> de::Visitor<'de> for ScalarVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or scalar value")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_char<E: de::Error>(self, v: char) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}
