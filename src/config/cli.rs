use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

use crate::application::model::baseline::BaselineKind;

/// Command-line arguments for the scorecast binary.
#[derive(Debug, Parser)]
#[command(name = "scorecast", version, about = "Student score prediction service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SCORECAST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the prediction and admin HTTP services.
    Serve(Box<ServeArgs>),
    /// Write baseline model artifacts for development deployments.
    #[command(name = "init-model")]
    InitModel(InitModelArgs),
    /// Load a model artifact, validate it and score the reference student.
    #[command(name = "check-model")]
    CheckModel(CheckModelArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

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

    /// Override the score model artifact path.
    #[arg(long = "model-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub model_path: Option<PathBuf>,

    /// Override the cluster model artifact path.
    #[arg(long = "cluster-model-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub cluster_model_path: Option<PathBuf>,

    /// Toggle the prediction cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache backend (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the largest accepted batch.
    #[arg(long = "batch-max-size", value_name = "COUNT")]
    pub batch_max_size: Option<u64>,

    /// Override how many cache misses reach the model per call.
    #[arg(long = "batch-chunk-size", value_name = "COUNT")]
    pub batch_chunk_size: Option<u64>,

    /// Override the API rate limit window size.
    #[arg(long = "api-rate-limit-window-seconds", value_name = "SECONDS")]
    pub api_rate_limit_window_seconds: Option<u64>,

    /// Override the API rate limit request ceiling.
    #[arg(long = "api-rate-limit-max-requests", value_name = "COUNT")]
    pub api_rate_limit_max_requests: Option<u64>,

    /// Allow browser calls from this origin (repeatable; `*` for any).
    #[arg(long = "cors-allow-origin", value_name = "ORIGIN")]
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKindArg {
    Linear,
    Forest,
}

impl From<ModelKindArg> for BaselineKind {
    fn from(kind: ModelKindArg) -> Self {
        match kind {
            ModelKindArg::Linear => BaselineKind::Linear,
            ModelKindArg::Forest => BaselineKind::Forest,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct InitModelArgs {
    /// Where to write the score model artifact.
    #[arg(long = "out", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Regressor family of the baseline.
    #[arg(long = "kind", value_enum, default_value_t = ModelKindArg::Linear)]
    pub kind: ModelKindArg,

    /// Also write a baseline cluster model here.
    #[arg(long = "cluster-out", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub cluster_out: Option<PathBuf>,

    /// Replace existing files.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CheckModelArgs {
    /// Artifact to validate.
    #[arg(value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub path: PathBuf,

    /// Treat the artifact as a cluster model.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub cluster: bool,
}
