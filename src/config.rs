//! Configuration Module
//!
//! Loads and validates the favicon cache settings, either from environment
//! variables or from a `favicons.toml` file.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Version of the TOML configuration schema understood by this crate.
pub const CONFIG_SCHEMA: i64 = 1;

/// Default hold time: 30 days.
pub const DEFAULT_HOLD_TIME: u64 = 60 * 60 * 24 * 30;
/// Default limit of all stored blob bytes: 1 GiB.
pub const DEFAULT_LIMIT_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;
/// Default per-blob ceiling: 10 KiB.
pub const DEFAULT_BLOB_MAX_BYTES: u64 = 1024 * 10;
/// Default maintenance period: one hour.
pub const DEFAULT_MAINTENANCE_PERIOD: u64 = 60 * 60;

// == Backend Kind ==
/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Persistent SQLite database
    Sqlite,
    /// Process memory, development only
    Memory,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "persistent" => Ok(Self::Sqlite),
            "mem" | "memory" => Ok(Self::Memory),
            other => Err(CacheError::Config(format!(
                "favicons db_type '{}' is unknown",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "mem"),
        }
    }
}

// == Maintenance Mode ==
/// How cache maintenance gets triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    /// Inline in `store` once the maintenance period has elapsed
    Auto,
    /// Periodic background task
    Background,
    /// Only on explicit request (external process or API call)
    Off,
}

impl FromStr for MaintenanceMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "background" => Ok(Self::Background),
            "off" => Ok(Self::Off),
            other => Err(CacheError::Config(format!(
                "maintenance mode '{}' is unknown (expected auto, background or off)",
                other
            ))),
        }
    }
}

impl fmt::Display for MaintenanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Background => write!(f, "background"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Favicon cache configuration.
///
/// Times are in seconds, sizes in bytes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend to construct at startup
    pub db_type: BackendKind,
    /// Path of the SQLite database file (`:memory:` is accepted for tests)
    pub db_url: PathBuf,
    /// Age after which a mapping entry is dropped by maintenance
    pub hold_time: u64,
    /// Soft limit of all blob bytes, enforced at maintenance
    pub limit_total_bytes: u64,
    /// Blobs larger than this are never cached
    pub blob_max_bytes: u64,
    /// Interval between maintenance runs
    pub maintenance_period: u64,
    /// Maintenance trigger
    pub maintenance_mode: MaintenanceMode,
    /// HTTP port of the operational API
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FAVICON_DB_TYPE` - `sqlite` or `mem` (default: sqlite)
    /// - `FAVICON_DB_URL` - database path (default: `<tmp>/faviconcache.db`)
    /// - `FAVICON_HOLD_TIME` - hold time in seconds (default: 30 days)
    /// - `FAVICON_LIMIT_TOTAL_BYTES` - total byte limit (default: 1 GiB)
    /// - `FAVICON_BLOB_MAX_BYTES` - per-blob ceiling (default: 10 KiB)
    /// - `FAVICON_MAINTENANCE_PERIOD` - seconds between runs (default: 3600)
    /// - `FAVICON_MAINTENANCE_MODE` - `auto`, `background` or `off` (default: auto)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unset variables fall back to defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            db_type: env_parse("FAVICON_DB_TYPE", defaults.db_type)?,
            db_url: env::var("FAVICON_DB_URL")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_url),
            hold_time: env_parse("FAVICON_HOLD_TIME", defaults.hold_time)?,
            limit_total_bytes: env_parse("FAVICON_LIMIT_TOTAL_BYTES", defaults.limit_total_bytes)?,
            blob_max_bytes: env_parse("FAVICON_BLOB_MAX_BYTES", defaults.blob_max_bytes)?,
            maintenance_period: env_parse(
                "FAVICON_MAINTENANCE_PERIOD",
                defaults.maintenance_period,
            )?,
            maintenance_mode: env_parse("FAVICON_MAINTENANCE_MODE", defaults.maintenance_mode)?,
            server_port: env_parse("SERVER_PORT", defaults.server_port)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a `favicons.toml` file, see [`Config::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            CacheError::Config(msg) => CacheError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parses the TOML layout of `favicons.toml`.
    ///
    /// The settings live in a `[favicons]` table (or at top level) which must
    /// declare `cfg_schema = 1`. Cache settings are read from
    /// `[favicons.cache]`, accepting both `HOLD_TIME` and `hold_time` spellings.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut root: toml::Table = toml::from_str(contents)
            .map_err(|e| CacheError::Config(format!("invalid TOML: {}", e)))?;

        let section = match root.remove("favicons") {
            Some(toml::Value::Table(table)) => table,
            Some(_) => {
                return Err(CacheError::Config(
                    "'favicons' must be a table".to_string(),
                ))
            }
            None => root,
        };

        let file: FaviconsFile = toml::Value::Table(section)
            .try_into()
            .map_err(|e| CacheError::Config(format!("invalid favicons config: {}", e)))?;

        if file.cfg_schema != Some(CONFIG_SCHEMA) {
            return Err(CacheError::Config(format!(
                "config schema version {} is needed, version {} is given",
                CONFIG_SCHEMA,
                file.cfg_schema
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "<none>".to_string())
            )));
        }

        let mut config = Self::default();
        let cache = file.cache;
        if let Some(kind) = cache.db_type {
            config.db_type = kind.parse()?;
        }
        if let Some(url) = cache.db_url {
            config.db_url = url;
        }
        if let Some(v) = cache.hold_time {
            config.hold_time = v;
        }
        if let Some(v) = cache.limit_total_bytes {
            config.limit_total_bytes = v;
        }
        if let Some(v) = cache.blob_max_bytes {
            config.blob_max_bytes = v;
        }
        if let Some(v) = cache.maintenance_period {
            config.maintenance_period = v;
        }
        if let Some(mode) = cache.maintenance_mode {
            config.maintenance_mode = mode.parse()?;
        }
        if let Some(port) = file.server.port {
            config.server_port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations the cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.db_url.as_os_str().is_empty() {
            return Err(CacheError::Config("db_url must not be empty".to_string()));
        }
        if self.blob_max_bytes == 0 {
            return Err(CacheError::Config(
                "blob_max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.maintenance_period == 0 && self.maintenance_mode != MaintenanceMode::Off {
            return Err(CacheError::Config(format!(
                "maintenance_period must be greater than zero in '{}' mode",
                self.maintenance_mode
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_type: BackendKind::Sqlite,
            db_url: env::temp_dir().join("faviconcache.db"),
            hold_time: DEFAULT_HOLD_TIME,
            limit_total_bytes: DEFAULT_LIMIT_TOTAL_BYTES,
            blob_max_bytes: DEFAULT_BLOB_MAX_BYTES,
            maintenance_period: DEFAULT_MAINTENANCE_PERIOD,
            maintenance_mode: MaintenanceMode::Auto,
            server_port: 3000,
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| CacheError::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(default),
    }
}

// TOML file layout

#[derive(Debug, Deserialize)]
struct FaviconsFile {
    cfg_schema: Option<i64>,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    db_type: Option<String>,
    db_url: Option<PathBuf>,
    #[serde(alias = "HOLD_TIME")]
    hold_time: Option<u64>,
    #[serde(alias = "LIMIT_TOTAL_BYTES")]
    limit_total_bytes: Option<u64>,
    #[serde(alias = "BLOB_MAX_BYTES")]
    blob_max_bytes: Option<u64>,
    #[serde(alias = "MAINTENANCE_PERIOD")]
    maintenance_period: Option<u64>,
    #[serde(alias = "MAINTENANCE_MODE")]
    maintenance_mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<u16>,
}
