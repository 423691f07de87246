//! Configuration Module
//!
//! Loads gateway settings from environment variables.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::PgTables;
use crate::error::ConfigError;
use crate::monitor::MonitorConfig;

/// Gateway configuration.
///
/// Every value can be set through an environment variable; see
/// [`Config::from_env`] for names and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Backend connection descriptor
    pub database_url: String,
    pub db_pool_size: u32,
    /// Reconnection attempts before the process gives up
    pub reconnection_attempts: u32,
    /// Delay between reconnection attempts in milliseconds
    pub reconnection_delay_ms: u64,
    /// Backend probe period in seconds
    pub health_check_interval: u64,
    /// TTL of temporarily cached responses in seconds
    pub cache_timeout: u64,
    /// Expired-entry sweep period in seconds, 0 = lazy eviction only
    pub cache_sweep_interval: u64,
    pub url_prefix: String,
    pub public_dir: PathBuf,
    pub robots_file: PathBuf,
    pub root_redirect: String,
    pub language_locale: String,
    pub language_default: String,
    /// Redirect requests forwarded as plain http to https
    pub redirect_http: bool,
    pub compression: bool,
    /// Mount the data API routes
    pub data_api: bool,
    /// Mount the floodwatch route
    pub floodwatch_api: bool,
    /// Report query window in seconds
    pub time_window: u64,
    /// Sensor and gauge query window in seconds
    pub floodgauge_time_window: u64,
    pub report_limit: i64,
    pub tables: PgTables,
    /// Infrastructure layer name to table
    pub infrastructure_tables: BTreeMap<String, String>,
    /// Answer every request error with an empty 204 instead of its status
    pub legacy_empty_errors: bool,
    /// Upper bound on the log flush during shutdown, in milliseconds
    pub shutdown_flush_timeout_ms: u64,
    /// Instance name, used as the log file name
    pub instance: String,
    /// Directory for the rolling log file; `None` logs to stdout only
    pub log_directory: Option<PathBuf>,
    /// Lowest level written, one of trace, debug, info, warn, error
    pub log_level: String,
    /// Rotated log files kept on disk
    pub log_max_files: usize,
}

impl Config {
    /// Creates a Config from the process environment.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` (8081), `DATABASE_URL`, `DB_POOL_SIZE` (5)
    /// - `RECONNECTION_ATTEMPTS` (5), `RECONNECTION_DELAY_MS` (5000)
    /// - `HEALTH_CHECK_INTERVAL_SECS` (10)
    /// - `CACHE_TIMEOUT_SECS` (60), `CACHE_SWEEP_INTERVAL_SECS` (60)
    /// - `URL_PREFIX` (banjir), `PUBLIC_DIR` (public), `ROBOTS_FILE` (robots.txt)
    /// - `ROOT_REDIRECT` (banjir), `LANGUAGE_LOCALE` (id), `LANGUAGE_DEFAULT` (en)
    /// - `REDIRECT_HTTP`, `COMPRESSION`, `FLOODWATCH_API` (false), `DATA_API` (true)
    /// - `TIME_WINDOW_SECS` (3600), `FLOODGAUGE_TIME_WINDOW_SECS` (10800), `REPORT_LIMIT` (1000)
    /// - `TBL_REPORTS`, `TBL_SENSOR_DATA`, `TBL_SENSOR_METADATA`, `TBL_CITY_POLYGONS`
    /// - `INFRASTRUCTURE_TABLES` as `name:table,name:table`
    /// - `LEGACY_EMPTY_ERRORS` (false), `SHUTDOWN_FLUSH_TIMEOUT_MS` (500)
    /// - `INSTANCE` (disaster_gateway), `LOG_DIRECTORY` (unset), `LOG_LEVEL` (info),
    ///   `LOG_MAX_FILES` (10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a Config reading each variable through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let tables = PgTables {
            reports: identifier(&lookup, "TBL_REPORTS", &defaults.tables.reports)?,
            sensor_data: identifier(&lookup, "TBL_SENSOR_DATA", &defaults.tables.sensor_data)?,
            sensor_metadata: identifier(
                &lookup,
                "TBL_SENSOR_METADATA",
                &defaults.tables.sensor_metadata,
            )?,
            city_polygons: identifier(&lookup, "TBL_CITY_POLYGONS", &defaults.tables.city_polygons)?,
        };

        let infrastructure_tables = match lookup("INFRASTRUCTURE_TABLES") {
            Some(raw) => parse_table_map(&raw)?,
            None => defaults.infrastructure_tables.clone(),
        };

        let reconnection_attempts = number(&lookup, "RECONNECTION_ATTEMPTS", defaults.reconnection_attempts)?;
        if reconnection_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RECONNECTION_ATTEMPTS".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let log_level = text("LOG_LEVEL", &defaults.log_level).trim().to_ascii_lowercase();
        if tracing::Level::from_str(&log_level).is_err() {
            return Err(ConfigError::Invalid {
                key: "LOG_LEVEL".to_string(),
                message: format!("'{}' is not a log level", log_level),
            });
        }

        let log_max_files = number(&lookup, "LOG_MAX_FILES", defaults.log_max_files)?;
        if log_max_files == 0 {
            return Err(ConfigError::Invalid {
                key: "LOG_MAX_FILES".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            server_port: number(&lookup, "SERVER_PORT", defaults.server_port)?,
            database_url: text("DATABASE_URL", &defaults.database_url),
            db_pool_size: number(&lookup, "DB_POOL_SIZE", defaults.db_pool_size)?,
            reconnection_attempts,
            reconnection_delay_ms: number(&lookup, "RECONNECTION_DELAY_MS", defaults.reconnection_delay_ms)?,
            health_check_interval: number(
                &lookup,
                "HEALTH_CHECK_INTERVAL_SECS",
                defaults.health_check_interval,
            )?,
            cache_timeout: number(&lookup, "CACHE_TIMEOUT_SECS", defaults.cache_timeout)?,
            cache_sweep_interval: number(
                &lookup,
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval,
            )?,
            url_prefix: text("URL_PREFIX", &defaults.url_prefix)
                .trim_matches('/')
                .to_string(),
            public_dir: lookup("PUBLIC_DIR").map(PathBuf::from).unwrap_or(defaults.public_dir),
            robots_file: lookup("ROBOTS_FILE").map(PathBuf::from).unwrap_or(defaults.robots_file),
            root_redirect: text("ROOT_REDIRECT", &defaults.root_redirect)
                .trim_matches('/')
                .to_string(),
            language_locale: text("LANGUAGE_LOCALE", &defaults.language_locale),
            language_default: text("LANGUAGE_DEFAULT", &defaults.language_default),
            redirect_http: flag(&lookup, "REDIRECT_HTTP", defaults.redirect_http)?,
            compression: flag(&lookup, "COMPRESSION", defaults.compression)?,
            data_api: flag(&lookup, "DATA_API", defaults.data_api)?,
            floodwatch_api: flag(&lookup, "FLOODWATCH_API", defaults.floodwatch_api)?,
            time_window: number(&lookup, "TIME_WINDOW_SECS", defaults.time_window)?,
            floodgauge_time_window: number(
                &lookup,
                "FLOODGAUGE_TIME_WINDOW_SECS",
                defaults.floodgauge_time_window,
            )?,
            report_limit: number(&lookup, "REPORT_LIMIT", defaults.report_limit)?,
            tables,
            infrastructure_tables,
            legacy_empty_errors: flag(&lookup, "LEGACY_EMPTY_ERRORS", defaults.legacy_empty_errors)?,
            shutdown_flush_timeout_ms: number(
                &lookup,
                "SHUTDOWN_FLUSH_TIMEOUT_MS",
                defaults.shutdown_flush_timeout_ms,
            )?,
            instance: text("INSTANCE", &defaults.instance),
            log_directory: lookup("LOG_DIRECTORY")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            log_level,
            log_max_files,
        })
    }

    /// TTL applied to temporarily cached responses.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_timeout)
    }

    /// Reconnection limits for the connection monitor.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            max_attempts: self.reconnection_attempts,
            delay: Duration::from_millis(self.reconnection_delay_ms),
        }
    }

    pub fn shutdown_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_flush_timeout_ms)
    }

    /// Table backing the infrastructure layer `name`, if configured.
    pub fn infrastructure_table(&self, name: &str) -> Option<&str> {
        self.infrastructure_tables.get(name).map(String::as_str)
    }

    /// Path prefix of every data route, e.g. `/banjir/data`.
    pub fn data_prefix(&self) -> String {
        format!("/{}/data", self.url_prefix)
    }
}

impl Default for Config {
    fn default() -> Self {
        let infrastructure_tables = [
            ("waterways", "waterways"),
            ("pumps", "pumps"),
            ("floodgates", "floodgates"),
            ("floodgauges", "floodgauge_reports"),
        ]
        .into_iter()
        .map(|(name, table)| (name.to_string(), table.to_string()))
        .collect();

        Self {
            server_port: 8081,
            database_url: "postgres://postgres@localhost/cognicity".to_string(),
            db_pool_size: 5,
            reconnection_attempts: 5,
            reconnection_delay_ms: 5000,
            health_check_interval: 10,
            cache_timeout: 60,
            cache_sweep_interval: 60,
            url_prefix: "banjir".to_string(),
            public_dir: PathBuf::from("public"),
            robots_file: PathBuf::from("robots.txt"),
            root_redirect: "banjir".to_string(),
            language_locale: "id".to_string(),
            language_default: "en".to_string(),
            redirect_http: false,
            compression: false,
            data_api: true,
            floodwatch_api: false,
            time_window: 3600,
            floodgauge_time_window: 10800,
            report_limit: 1000,
            tables: PgTables {
                reports: "all_reports".to_string(),
                sensor_data: "sensor_data".to_string(),
                sensor_metadata: "sensor_metadata".to_string(),
                city_polygons: "jkt_city_boundary".to_string(),
            },
            infrastructure_tables,
            legacy_empty_errors: false,
            shutdown_flush_timeout_ms: 500,
            instance: "disaster_gateway".to_string(),
            log_directory: None,
            log_level: "info".to_string(),
            log_max_files: 10,
        }
    }
}

// == Parsing Helpers ==
fn number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{}' is not a valid number", raw),
        }),
        None => Ok(default),
    }
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", other),
        }),
        None => Ok(default),
    }
}

fn identifier<F>(lookup: &F, key: &str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    if is_sql_identifier(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{}' is not a plain table name", value),
        })
    }
}

/// Accepts `table` or `schema.table` made of ASCII letters, digits and `_`.
pub fn is_sql_identifier(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Parses `name:table,name:table` into a map.
fn parse_table_map(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        key: "INFRASTRUCTURE_TABLES".to_string(),
        message,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, table) = pair
                .split_once(':')
                .ok_or_else(|| invalid(format!("'{}' is not a name:table pair", pair)))?;
            let (name, table) = (name.trim(), table.trim());
            if name.is_empty() || !is_sql_identifier(table) {
                return Err(invalid(format!("'{}' is not a name:table pair", pair)));
            }
            Ok((name.to_string(), table.to_string()))
        })
        .collect()
}
