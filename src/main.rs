use std::{
    fs,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use scorecast::{
    application::{
        api_keys::ApiKeyRegistry,
        error::AppError,
        model::{
            ClusterModel, ModelLoadError, Predictor, ScoreModel,
            baseline::{self, REFERENCE_FEATURES},
        },
        orchestrator::{BatchLimits, BatchOrchestrator},
        tokens::TokenIssuer,
    },
    cache::{CacheConfig, PredictionCache},
    config,
    infra::{
        error::InfraError,
        http::{self, AdminState, ApiGuard, ApiRateLimiter, ApiState},
        telemetry,
    },
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::{sync::watch, task::JoinError, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::InitModel(args) => run_init_model(args),
        config::Command::CheckModel(args) => run_check_model(args),
    }
}

struct ApplicationContext {
    api_state: ApiState,
    admin_state: AdminState,
    guard: ApiGuard,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let metrics = telemetry::install_metrics_exporter()?;
    let app = build_application_context(&settings, metrics)?;

    if app.guard.api_keys.is_empty() {
        warn!(
            target = "scorecast::startup",
            "no API keys configured; every protected route will answer 401"
        );
    }

    info!(
        target = "scorecast::startup",
        model = app.api_state.model_kind(),
        cluster_model = app.api_state.clusters.is_some(),
        cache_backend = app.api_state.cache.backend(),
        cache = app.api_state.cache.health().await.as_str(),
        api_keys = app.guard.api_keys.len(),
        token_exchange = app.guard.tokens.is_some(),
        "application context ready"
    );

    serve_http(&settings, app).await
}

fn build_application_context(
    settings: &config::Settings,
    metrics: PrometheusHandle,
) -> Result<ApplicationContext, AppError> {
    let score_model = Arc::new(ScoreModel::load(&settings.model.path)?);
    let cluster_model = settings
        .cluster_model
        .path
        .as_deref()
        .map(ClusterModel::load)
        .transpose()?
        .map(Arc::new);

    let cache = Arc::new(PredictionCache::from_config(CacheConfig::from(
        &settings.cache,
    ))?);
    let limits = BatchLimits::from(&settings.batch);

    let scores = BatchOrchestrator::new(score_model, cache.clone(), limits);
    let clusters = cluster_model.map(|model| BatchOrchestrator::new(model, cache.clone(), limits));

    let guard = ApiGuard {
        api_keys: ApiKeyRegistry::new(settings.auth.keys.clone()),
        rate_limiter: Arc::new(ApiRateLimiter::from_settings(&settings.api_rate_limit)),
        tokens: settings
            .auth
            .tokens
            .as_ref()
            .map(|tokens| TokenIssuer::new(&tokens.secret, tokens.ttl)),
    };

    let admin_state = AdminState {
        cache: cache.clone(),
        model_kind: scores.predictor().kind(),
        cluster_model: clusters.is_some(),
        metrics,
    };

    let api_state = ApiState {
        scores,
        clusters,
        cache,
    };

    Ok(ApplicationContext {
        api_state,
        admin_state,
        guard,
    })
}

async fn serve_http(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let public_router = http::with_cors(
        http::build_api_router(app.api_state, app.guard.clone()),
        &settings.cors,
    );
    let admin_router = http::build_admin_router(app.admin_state, app.guard);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "scorecast::startup",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let mut servers = tokio::spawn(async move { try_join!(public_server, admin_server) });

    tokio::select! {
        joined = &mut servers => return server_outcome(joined),
        () = shutdown_signal() => {
            info!(target = "scorecast::shutdown", "shutdown signal received; draining connections");
            shutdown_tx.send_replace(true);
        }
    }

    let grace = settings.server.graceful_shutdown;
    match tokio::time::timeout(grace, &mut servers).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "scorecast::shutdown",
                grace_seconds = grace.as_secs(),
                "connections still open after grace period; aborting"
            );
            servers.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<Result<((), ()), std::io::Error>, JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(InfraError::server(err.to_string()).into()),
        Err(err) => Err(InfraError::server(format!("server task failed: {err}")).into()),
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "scorecast::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "scorecast::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn run_init_model(args: config::InitModelArgs) -> Result<(), AppError> {
    let score = baseline::score_artifact(args.kind.into());
    write_artifact(&args.out, &score, args.force)?;
    info!(
        target = "scorecast::init_model",
        path = %args.out.display(),
        kind = ?args.kind,
        "score model written"
    );

    if let Some(path) = args.cluster_out.as_ref() {
        write_artifact(path, &baseline::cluster_artifact(), args.force)?;
        info!(
            target = "scorecast::init_model",
            path = %path.display(),
            clusters = baseline::PERSONAS.len(),
            "cluster model written"
        );
    }

    Ok(())
}

fn write_artifact<T: Serialize>(path: &Path, artifact: &T, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::unexpected(format!(
            "`{}` already exists; pass --force to replace it",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(InfraError::from)?;
    }

    let json = serde_json::to_string_pretty(artifact)
        .map_err(|err| AppError::unexpected(format!("failed to encode artifact: {err}")))?;
    fs::write(path, json).map_err(InfraError::from)?;
    Ok(())
}

#[derive(Serialize)]
struct CheckReport<T> {
    path: PathBuf,
    model: &'static str,
    reference_prediction: T,
}

fn run_check_model(args: config::CheckModelArgs) -> Result<(), AppError> {
    let report = if args.cluster {
        let model = ClusterModel::load(&args.path)?;
        let assignment = model
            .predict(&REFERENCE_FEATURES)
            .map_err(|err| ModelLoadError::invalid(format!("reference prediction failed: {err}")))?;
        serde_json::to_value(CheckReport {
            path: args.path,
            model: ClusterModel::NAME,
            reference_prediction: assignment,
        })
    } else {
        let model = ScoreModel::load(&args.path)?;
        let score = model
            .predict(&REFERENCE_FEATURES)
            .map_err(|err| ModelLoadError::invalid(format!("reference prediction failed: {err}")))?;
        serde_json::to_value(CheckReport {
            path: args.path,
            model: model.kind(),
            reference_prediction: score,
        })
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;

    println!("{report:#}");
    Ok(())
}
