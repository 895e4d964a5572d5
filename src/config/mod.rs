//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "feedline";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_JOB_FANOUT_MAIN_CONCURRENCY: u32 = 2;
const DEFAULT_JOB_FANOUT_BATCH_CONCURRENCY: u32 = 8;
const DEFAULT_JOB_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_JOB_BATCH_TIME_LIMIT_SECS: u64 = 3600;
const DEFAULT_FANOUT_BATCH_SIZE: u32 = 1000;
const DEFAULT_CACHE_LIST_LENGTH_LIMIT: u32 = 200;
const DEFAULT_CACHE_KEY_TTL_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_CACHE_MAX_KEYS: u32 = 100_000;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_UPSIDE_PAGINATE: u32 = 100;
const DEFAULT_NEWSFEED_GATE: &str = "switch_newsfeed_to_hbase";
const DEFAULT_FRIENDSHIP_GATE: &str = "switch_friendship_to_hbase";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 1;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 5;

/// Command-line arguments for the feedline binary.
#[derive(Debug, Parser)]
#[command(name = "feedline", version, about = "Feed fanout and pagination service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FEEDLINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service and fanout workers.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the fanout coordinator worker concurrency.
    #[arg(long = "jobs-fanout-main-concurrency", value_name = "COUNT")]
    pub jobs_fanout_main_concurrency: Option<u32>,

    /// Override the fanout batch worker concurrency.
    #[arg(long = "jobs-fanout-batch-concurrency", value_name = "COUNT")]
    pub jobs_fanout_batch_concurrency: Option<u32>,

    /// Override the number of attempts a fanout job gets before it is failed.
    #[arg(long = "jobs-max-attempts", value_name = "COUNT")]
    pub jobs_max_attempts: Option<u32>,

    /// Override the execution budget for one fanout batch.
    #[arg(long = "jobs-batch-time-limit-seconds", value_name = "SECONDS")]
    pub jobs_batch_time_limit_seconds: Option<u64>,

    /// Override the number of subscribers handled by one fanout batch.
    #[arg(long = "fanout-batch-size", value_name = "COUNT")]
    pub fanout_batch_size: Option<u32>,

    /// Override the maximum length of a cached feed list.
    #[arg(long = "cache-list-length-limit", value_name = "COUNT")]
    pub cache_list_length_limit: Option<u32>,

    /// Override the time-to-live of a cached feed list.
    #[arg(long = "cache-key-ttl-seconds", value_name = "SECONDS")]
    pub cache_key_ttl_seconds: Option<u64>,

    /// Override the maximum number of feed lists held in memory.
    #[arg(long = "cache-max-keys", value_name = "COUNT")]
    pub cache_max_keys: Option<u32>,

    /// Override the default page size for feed reads.
    #[arg(long = "pagination-default-page-size", value_name = "COUNT")]
    pub pagination_default_page_size: Option<u32>,

    /// Override the maximum page size a client may request.
    #[arg(long = "pagination-max-page-size", value_name = "COUNT")]
    pub pagination_max_page_size: Option<u32>,

    /// Override the newer-entry ceiling beyond which clients must reload.
    #[arg(long = "pagination-max-upside-paginate", value_name = "COUNT")]
    pub pagination_max_upside_paginate: Option<u32>,

    /// Override the feed read rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the feed read rate limit ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub fanout: FanoutSettings,
    pub cache: CacheSettings,
    pub pagination: PaginationSettings,
    pub gates: GateSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub fanout_main_concurrency: NonZeroU32,
    pub fanout_batch_concurrency: NonZeroU32,
    pub max_attempts: NonZeroU32,
    pub batch_time_limit: Duration,
}

#[derive(Debug, Clone)]
pub struct FanoutSettings {
    pub batch_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub list_length_limit: NonZeroU32,
    pub key_ttl: Duration,
    pub max_keys: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub default_page_size: NonZeroU32,
    pub max_page_size: NonZeroU32,
    pub max_upside_paginate: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub newsfeed_gate: String,
    pub friendship_gate: String,
    /// Initial percentages for the in-process gatekeeper, keyed by gate name.
    pub seeds: Vec<(String, u8)>,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FEEDLINE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    jobs: RawJobsSettings,
    fanout: RawFanoutSettings,
    cache: RawCacheSettings,
    pagination: RawPaginationSettings,
    gates: RawGateSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_http_max_connections {
            self.database.http_max_connections = Some(max);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(value) = overrides.jobs_fanout_main_concurrency {
            self.jobs.fanout_main_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_fanout_batch_concurrency {
            self.jobs.fanout_batch_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_max_attempts {
            self.jobs.max_attempts = Some(value);
        }
        if let Some(value) = overrides.jobs_batch_time_limit_seconds {
            self.jobs.batch_time_limit_seconds = Some(value);
        }
        if let Some(value) = overrides.fanout_batch_size {
            self.fanout.batch_size = Some(value);
        }
        if let Some(value) = overrides.cache_list_length_limit {
            self.cache.list_length_limit = Some(value);
        }
        if let Some(value) = overrides.cache_key_ttl_seconds {
            self.cache.key_ttl_seconds = Some(value);
        }
        if let Some(value) = overrides.cache_max_keys {
            self.cache.max_keys = Some(value);
        }
        if let Some(value) = overrides.pagination_default_page_size {
            self.pagination.default_page_size = Some(value);
        }
        if let Some(value) = overrides.pagination_max_page_size {
            self.pagination.max_page_size = Some(value);
        }
        if let Some(value) = overrides.pagination_max_upside_paginate {
            self.pagination.max_upside_paginate = Some(value);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    /// Built-in defaults with CLI-style overrides applied; no file or environment sources.
    pub fn from_overrides(overrides: &ServeOverrides) -> Result<Self, LoadError> {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(overrides);
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            jobs,
            fanout,
            cache,
            pagination,
            gates,
            rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            jobs: build_jobs_settings(jobs)?,
            fanout: build_fanout_settings(fanout)?,
            cache: build_cache_settings(cache)?,
            pagination: build_pagination_settings(pagination)?,
            gates: build_gate_settings(gates)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        http_max_connections: non_zero_u32(http_value.into(), "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let main = jobs
        .fanout_main_concurrency
        .unwrap_or(DEFAULT_JOB_FANOUT_MAIN_CONCURRENCY);
    let batch = jobs
        .fanout_batch_concurrency
        .unwrap_or(DEFAULT_JOB_FANOUT_BATCH_CONCURRENCY);
    let attempts = jobs.max_attempts.unwrap_or(DEFAULT_JOB_MAX_ATTEMPTS);

    let time_limit_secs = jobs
        .batch_time_limit_seconds
        .unwrap_or(DEFAULT_JOB_BATCH_TIME_LIMIT_SECS);
    if time_limit_secs == 0 {
        return Err(LoadError::invalid(
            "jobs.batch_time_limit_seconds",
            "must be greater than zero",
        ));
    }

    Ok(JobsSettings {
        fanout_main_concurrency: non_zero_u32(main.into(), "jobs.fanout_main_concurrency")?,
        fanout_batch_concurrency: non_zero_u32(batch.into(), "jobs.fanout_batch_concurrency")?,
        max_attempts: non_zero_u32(attempts.into(), "jobs.max_attempts")?,
        batch_time_limit: Duration::from_secs(time_limit_secs),
    })
}

fn build_fanout_settings(fanout: RawFanoutSettings) -> Result<FanoutSettings, LoadError> {
    let batch_size = fanout.batch_size.unwrap_or(DEFAULT_FANOUT_BATCH_SIZE);
    Ok(FanoutSettings {
        batch_size: non_zero_u32(batch_size.into(), "fanout.batch_size")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let length = cache
        .list_length_limit
        .unwrap_or(DEFAULT_CACHE_LIST_LENGTH_LIMIT);
    let max_keys = cache.max_keys.unwrap_or(DEFAULT_CACHE_MAX_KEYS);

    let ttl_secs = cache.key_ttl_seconds.unwrap_or(DEFAULT_CACHE_KEY_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.key_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        list_length_limit: non_zero_u32(length.into(), "cache.list_length_limit")?,
        key_ttl: Duration::from_secs(ttl_secs),
        max_keys: non_zero_u32(max_keys.into(), "cache.max_keys")?,
    })
}

fn build_pagination_settings(
    pagination: RawPaginationSettings,
) -> Result<PaginationSettings, LoadError> {
    let default_page_size = non_zero_u32(
        pagination
            .default_page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .into(),
        "pagination.default_page_size",
    )?;
    let max_page_size = non_zero_u32(
        pagination
            .max_page_size
            .unwrap_or(DEFAULT_MAX_PAGE_SIZE)
            .into(),
        "pagination.max_page_size",
    )?;
    let max_upside_paginate = non_zero_u32(
        pagination
            .max_upside_paginate
            .unwrap_or(DEFAULT_MAX_UPSIDE_PAGINATE)
            .into(),
        "pagination.max_upside_paginate",
    )?;

    if default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "pagination.default_page_size",
            "must not exceed pagination.max_page_size",
        ));
    }

    Ok(PaginationSettings {
        default_page_size,
        max_page_size,
        max_upside_paginate,
    })
}

fn build_gate_settings(gates: RawGateSettings) -> Result<GateSettings, LoadError> {
    let newsfeed_gate = non_empty_name(gates.newsfeed, DEFAULT_NEWSFEED_GATE, "gates.newsfeed")?;
    let friendship_gate =
        non_empty_name(gates.friendship, DEFAULT_FRIENDSHIP_GATE, "gates.friendship")?;

    let mut seeds: Vec<(String, u8)> = Vec::with_capacity(gates.percent.len());
    for (name, percent) in gates.percent {
        if percent > 100 {
            return Err(LoadError::invalid(
                "gates.percent",
                format!("gate `{name}` percent must be between 0 and 100"),
            ));
        }
        seeds.push((name, percent));
    }
    seeds.sort();

    Ok(GateSettings {
        newsfeed_gate,
        friendship_gate,
        seeds,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds = non_zero_u32(
        rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        "rate_limit.window_seconds",
    )?;
    let max_requests = non_zero_u32(
        rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        "rate_limit.max_requests",
    )?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    fanout_main_concurrency: Option<u32>,
    fanout_batch_concurrency: Option<u32>,
    max_attempts: Option<u32>,
    batch_time_limit_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFanoutSettings {
    batch_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    list_length_limit: Option<u32>,
    key_ttl_seconds: Option<u64>,
    max_keys: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPaginationSettings {
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
    max_upside_paginate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGateSettings {
    newsfeed: Option<String>,
    friendship: Option<String>,
    percent: std::collections::HashMap<String, u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_name(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        None => Ok(default.to_string()),
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(LoadError::invalid(key, "gate name must not be empty"));
            }
            Ok(trimmed.to_string())
        }
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.fanout.batch_size.get(), 1000);
        assert_eq!(settings.cache.list_length_limit.get(), 200);
        assert_eq!(settings.cache.key_ttl, Duration::from_secs(604_800));
        assert_eq!(settings.pagination.default_page_size.get(), 20);
        assert_eq!(settings.pagination.max_upside_paginate.get(), 100);
        assert_eq!(settings.jobs.batch_time_limit, Duration::from_secs(3600));
        assert_eq!(settings.gates.newsfeed_gate, "switch_newsfeed_to_hbase");
        assert_eq!(settings.gates.friendship_gate, "switch_friendship_to_hbase");
        assert_eq!(settings.rate_limit.max_requests.get(), 5);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut raw = RawSettings::default();
        raw.fanout.batch_size = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero batch size rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "fanout.batch_size",
                ..
            }
        ));
    }

    #[test]
    fn default_page_size_cannot_exceed_maximum() {
        let mut raw = RawSettings::default();
        raw.pagination.default_page_size = Some(50);
        raw.pagination.max_page_size = Some(10);

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn gate_percent_above_hundred_is_rejected() {
        let mut raw = RawSettings::default();
        raw.gates
            .percent
            .insert("switch_newsfeed_to_hbase".to_string(), 101);

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["feedline"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_migrate_arguments() {
        let args = CliArgs::parse_from([
            "feedline",
            "migrate",
            "--database-url",
            "postgres://example",
        ]);

        match args.command.expect("migrate command") {
            Command::Migrate(migrate) => {
                assert_eq!(
                    migrate.database.database_url.as_deref(),
                    Some("postgres://example")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "feedline",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--fanout-batch-size",
            "250",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.fanout_batch_size, Some(250));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
