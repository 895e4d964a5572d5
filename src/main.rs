use std::{process, sync::Arc, time::Duration};

use apalis::{
    layers::{WorkerBuilderExt, retry::RetryPolicy},
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use feedline::{
    application::error::AppError,
    application::jobs::{FanoutJobContext, process_fanout_batch_job, process_fanout_main_job},
    config,
    domain::types::JobType,
    infra::{
        context::{Adapters, AppContext},
        db::PostgresRepositories,
        error::InfraError,
        http, telemetry,
        memory::{MemoryRepositories, MemoryTable, drain_jobs},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const MEMORY_JOB_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
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
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = require_database_url(&settings)?;
    let pool = PostgresRepositories::connect(database_url, 1)
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!(target = "feedline::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    match settings.database.url.as_deref() {
        Some(url) => serve_postgres(&settings, url).await,
        None => serve_memory(&settings).await,
    }
}

async fn serve_postgres(settings: &config::Settings, database_url: &str) -> Result<(), AppError> {
    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(InfraError::from)?;
    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(InfraError::from)?;

    let http_repositories = Arc::new(PostgresRepositories::new(http_pool));
    let job_repositories = Arc::new(PostgresRepositories::new(jobs_pool));

    let app = AppContext::build(Adapters::postgres(http_repositories), settings)
        .await
        .map_err(InfraError::from)?;

    let monitor_handle = spawn_job_monitor(job_repositories, app.jobs.clone(), &settings.jobs);
    let result = serve_http(settings, &app).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;
    result
}

async fn serve_memory(settings: &config::Settings) -> Result<(), AppError> {
    warn!(
        target = "feedline::serve",
        "no database url configured; serving from in-process stores"
    );
    let repositories = Arc::new(MemoryRepositories::new());
    let adapters = Adapters::memory(repositories.clone(), Arc::new(MemoryTable::new()));
    let app = AppContext::build(adapters, settings)
        .await
        .map_err(InfraError::from)?;

    let context = app.jobs.clone();
    let runner_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_JOB_POLL_INTERVAL);
        loop {
            interval.tick().await;
            let report = drain_jobs(&repositories, &context).await;
            if report.failed > 0 {
                warn!(
                    target = "feedline::serve",
                    failed = report.failed,
                    "in-process fanout jobs failed"
                );
            }
        }
    });

    let result = serve_http(settings, &app).await;

    runner_handle.abort();
    let _ = runner_handle.await;
    result
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: FanoutJobContext,
    jobs: &config::JobsSettings,
) -> tokio::task::JoinHandle<()> {
    let main_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutMain.as_str()),
    );
    let batch_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutBatch.as_str()),
    );

    let retries = jobs.max_attempts.get().saturating_sub(1) as usize;

    let main_worker = WorkerBuilder::new("fanout-main-worker")
        .concurrency(jobs.fanout_main_concurrency.get() as usize)
        .retry(RetryPolicy::retries(retries))
        .data(context.clone())
        .backend(main_storage)
        .build_fn(process_fanout_main_job);
    let batch_worker = WorkerBuilder::new("fanout-batch-worker")
        .concurrency(jobs.fanout_batch_concurrency.get() as usize)
        .retry(RetryPolicy::retries(retries))
        .data(context)
        .backend(batch_storage)
        .build_fn(process_fanout_batch_job);

    let monitor = Monitor::new().register(main_worker).register(batch_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, app: &AppContext) -> Result<(), AppError> {
    let router = http::build_router(app.api_state(settings));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;
    info!(
        target = "feedline::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| InfraError::Serve(err).into())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(
        target = "feedline::serve",
        grace_secs = grace.as_secs(),
        "shutdown requested; draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "feedline::serve",
            "graceful shutdown window elapsed; exiting"
        );
        process::exit(0);
    });
}

fn require_database_url(settings: &config::Settings) -> Result<&str, InfraError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or(InfraError::MissingDatabaseUrl)
}
