//! Configuration layer: typed settings with layered precedence
//! (files → environment → legacy deployment variables → CLI).

mod cli;

use std::{
    collections::HashSet,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderValue;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::api_keys::hash_secret;
use crate::application::orchestrator::BatchLimits;
use crate::cache::CacheBackend;
use crate::domain::api_keys::{ApiKeyRecord, ApiScope};

pub use cli::{
    CheckModelArgs, CliArgs, Command, InitModelArgs, ModelKindArg, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scorecast";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8000;
const DEFAULT_ADMIN_PORT: u16 = 8001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MODEL_PATH: &str = "models/model.json";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_KEY_PREFIX: &str = "scorecast:";
const DEFAULT_SCORE_TTL_SECS: u64 = 3600;
const DEFAULT_CLUSTER_TTL_SECS: u64 = 300;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 1000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_BATCH_MAX_SIZE: u64 = 100;
const DEFAULT_BATCH_CHUNK_SIZE: u64 = 50;
const DEFAULT_API_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_API_RATE_LIMIT_MAX_REQUESTS: u64 = 120;
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 30;
const DEFAULT_CORS_MAX_AGE_SECS: u64 = 600;
const LEGACY_API_KEY_NAME: &str = "default";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub model: ModelSettings,
    pub cluster_model: ClusterModelSettings,
    pub cache: CacheSettings,
    pub batch: BatchSettings,
    pub auth: AuthSettings,
    pub api_rate_limit: ApiRateLimitSettings,
    pub cors: CorsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
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
pub struct ModelSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ClusterModelSettings {
    /// Cluster endpoints answer 503 when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub score_ttl: Duration,
    pub cluster_ttl: Duration,
    pub operation_timeout: Duration,
    pub connect_timeout: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub max_size: NonZeroUsize,
    pub chunk_size: NonZeroUsize,
}

impl From<&BatchSettings> for BatchLimits {
    fn from(settings: &BatchSettings) -> Self {
        Self {
            max_size: settings.max_size.get(),
            chunk_size: settings.chunk_size.get(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub keys: Vec<ApiKeyRecord>,
    /// `POST /auth/token` is only mounted when a signing secret is set.
    pub tokens: Option<TokenSettings>,
}

#[derive(Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub origins: CorsOrigins,
    pub max_age: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// No CORS headers are emitted.
    Disabled,
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct ApiRateLimitSettings {
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

/// Load settings using the configured precedence.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SCORECAST").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_legacy_env(|name| std::env::var(name).ok());

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::InitModel(_)) | Some(Command::CheckModel(_)) | None => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    model: RawModelSettings,
    cluster_model: RawModelSettings,
    cache: RawCacheSettings,
    batch: RawBatchSettings,
    auth: RawAuthSettings,
    api_rate_limit: RawApiRateLimitSettings,
    cors: RawCorsSettings,
}

impl RawSettings {
    /// Variables understood by earlier deployments of this service.
    fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(port) = lookup("PORT").and_then(|value| value.trim().parse().ok()) {
            self.server.public_port = Some(port);
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.redis_url = Some(url);
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(secret) = lookup("JWT_SECRET_KEY") {
            self.auth.token_secret = Some(secret);
        }
        if let Some(secret) = lookup("API_KEY") {
            self.auth.keys.push(RawApiKey {
                name: Some(LEGACY_API_KEY_NAME.to_string()),
                secret: Some(secret),
                scopes: Some(
                    ApiScope::all()
                        .iter()
                        .map(|scope| scope.as_str().to_string())
                        .collect(),
                ),
            });
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
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
        if let Some(path) = overrides.model_path.as_ref() {
            self.model.path = Some(path.clone());
        }
        if let Some(path) = overrides.cluster_model_path.as_ref() {
            self.cluster_model.path = Some(path.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(max) = overrides.batch_max_size {
            self.batch.max_size = Some(max);
        }
        if let Some(chunk) = overrides.batch_chunk_size {
            self.batch.chunk_size = Some(chunk);
        }
        if let Some(window) = overrides.api_rate_limit_window_seconds {
            self.api_rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.api_rate_limit_max_requests {
            self.api_rate_limit.max_requests = Some(max);
        }
        if !overrides.cors_allow_origins.is_empty() {
            self.cors.allowed_origins = Some(overrides.cors_allow_origins.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            model,
            cluster_model,
            cache,
            batch,
            auth,
            api_rate_limit,
            cors,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let model = ModelSettings {
            path: non_empty_path(model.path, "model.path")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
        };
        let cluster_model = ClusterModelSettings {
            path: non_empty_path(cluster_model.path, "cluster_model.path")?,
        };
        let cache = build_cache_settings(cache)?;
        let batch = build_batch_settings(batch)?;
        let auth = build_auth_settings(auth)?;
        let api_rate_limit = build_api_rate_limit_settings(api_rate_limit)?;
        let cors = build_cors_settings(cors)?;

        Ok(Self {
            server,
            logging,
            model,
            cluster_model,
            cache,
            batch,
            auth,
            api_rate_limit,
            cors,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            format!("admin listener would share {public_addr} with the public listener"),
        ));
    }

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
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.trim()).map_err(|err| {
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

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache.backend {
        Some(value) => CacheBackend::parse(&value).ok_or_else(|| {
            LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{value}`; expected `redis` or `memory`"),
            )
        })?,
        None => CacheBackend::Redis,
    };

    let redis_url = cache
        .redis_url
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if redis_url.is_empty() {
        return Err(LoadError::invalid("cache.redis_url", "must not be empty"));
    }

    let key_prefix = cache
        .key_prefix
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.contains(['*', '?', '[', ']', '\\']) {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "must not contain glob characters",
        ));
    }

    let score_ttl = non_zero_secs(
        cache.score_ttl_seconds.unwrap_or(DEFAULT_SCORE_TTL_SECS),
        "cache.score_ttl_seconds",
    )?;
    let cluster_ttl = non_zero_secs(
        cache.cluster_ttl_seconds.unwrap_or(DEFAULT_CLUSTER_TTL_SECS),
        "cache.cluster_ttl_seconds",
    )?;
    let operation_timeout = non_zero_millis(
        cache
            .operation_timeout_ms
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS),
        "cache.operation_timeout_ms",
    )?;
    let connect_timeout = non_zero_millis(
        cache.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        "cache.connect_timeout_ms",
    )?;
    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        backend,
        redis_url,
        key_prefix,
        score_ttl,
        cluster_ttl,
        operation_timeout,
        connect_timeout,
        memory_capacity,
    })
}

fn build_batch_settings(batch: RawBatchSettings) -> Result<BatchSettings, LoadError> {
    let max_size = non_zero_usize(
        batch.max_size.unwrap_or(DEFAULT_BATCH_MAX_SIZE),
        "batch.max_size",
    )?;
    let chunk_size = non_zero_usize(
        batch
            .chunk_size
            .unwrap_or(DEFAULT_BATCH_CHUNK_SIZE.min(max_size.get() as u64)),
        "batch.chunk_size",
    )?;
    if chunk_size > max_size {
        return Err(LoadError::invalid(
            "batch.chunk_size",
            format!("{chunk_size} exceeds batch.max_size {max_size}"),
        ));
    }

    Ok(BatchSettings {
        max_size,
        chunk_size,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let mut names = HashSet::new();
    let mut keys = Vec::with_capacity(auth.keys.len());

    for raw in auth.keys {
        let name = raw
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LoadError::invalid("auth.keys.name", "every key needs a name"))?;
        if !names.insert(name.clone()) {
            return Err(LoadError::invalid(
                "auth.keys.name",
                format!("duplicate key name `{name}`"),
            ));
        }

        let secret = raw
            .secret
            .map(|secret| secret.trim().to_string())
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                LoadError::invalid("auth.keys.secret", format!("key `{name}` has no secret"))
            })?;

        let scopes = raw
            .scopes
            .unwrap_or_else(|| vec![ApiScope::Predict.as_str().to_string()])
            .iter()
            .map(|scope| {
                ApiScope::from_str(scope.trim()).map_err(|_| {
                    LoadError::invalid(
                        "auth.keys.scopes",
                        format!("key `{name}` has unknown scope `{scope}`"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if scopes.is_empty() {
            return Err(LoadError::invalid(
                "auth.keys.scopes",
                format!("key `{name}` grants no scopes"),
            ));
        }

        keys.push(ApiKeyRecord {
            name,
            hashed_secret: hash_secret(&secret),
            scopes,
        });
    }

    let tokens = match auth.token_secret.map(|secret| secret.trim().to_string()) {
        Some(secret) if secret.is_empty() => {
            return Err(LoadError::invalid(
                "auth.token_secret",
                "must not be blank; omit it to disable tokens",
            ));
        }
        Some(secret) => Some(TokenSettings {
            secret,
            ttl: non_zero_secs(
                auth.token_ttl_minutes
                    .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES)
                    .saturating_mul(60),
                "auth.token_ttl_minutes",
            )?,
        }),
        None => None,
    };

    Ok(AuthSettings { keys, tokens })
}

fn build_cors_settings(cors: RawCorsSettings) -> Result<CorsSettings, LoadError> {
    let origins: Vec<String> = cors
        .allowed_origins
        .unwrap_or_default()
        .into_iter()
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    let origins = if origins.is_empty() {
        CorsOrigins::Disabled
    } else if origins.iter().any(|origin| origin == "*") {
        if origins.len() > 1 {
            return Err(LoadError::invalid(
                "cors.allowed_origins",
                "`*` cannot be combined with explicit origins",
            ));
        }
        CorsOrigins::Any
    } else {
        let parsed = origins
            .iter()
            .map(|origin| {
                if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                    return Err(LoadError::invalid(
                        "cors.allowed_origins",
                        format!("`{origin}` must start with http:// or https://"),
                    ));
                }
                HeaderValue::from_str(origin).map_err(|err| {
                    LoadError::invalid("cors.allowed_origins", format!("`{origin}`: {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsOrigins::List(parsed)
    };

    Ok(CorsSettings {
        origins,
        max_age: Duration::from_secs(cors.max_age_seconds.unwrap_or(DEFAULT_CORS_MAX_AGE_SECS)),
    })
}

fn build_api_rate_limit_settings(
    rate_limit: RawApiRateLimitSettings,
) -> Result<ApiRateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_API_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "api_rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_API_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "api_rate_limit.max_requests")?;

    Ok(ApiRateLimitSettings {
        window_seconds,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
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
struct RawModelSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    backend: Option<String>,
    redis_url: Option<String>,
    key_prefix: Option<String>,
    score_ttl_seconds: Option<u64>,
    cluster_ttl_seconds: Option<u64>,
    operation_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBatchSettings {
    max_size: Option<u64>,
    chunk_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    keys: Vec<RawApiKey>,
    token_secret: Option<String>,
    token_ttl_minutes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    allowed_origins: Option<Vec<String>>,
    max_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiKey {
    name: Option<String>,
    secret: Option<String>,
    scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(path: Option<PathBuf>, key: &'static str) -> Result<Option<PathBuf>, LoadError> {
    match path {
        Some(path) if path.as_os_str().is_empty() => {
            Err(LoadError::invalid(key, "path must not be empty"))
        }
        other => Ok(other),
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

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
