use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use mosaic::{
    application::{
        compose::FragmentComposer, error::AppError, repos::TodosRepo, todos::TodoService,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryTodos,
        telemetry,
    },
    presentation::views::TemplateViewResolver,
};
use tokio::sync::oneshot;
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

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repo = init_repository(&settings).await?;
    let todos = Arc::new(TodoService::new(repo));

    let resolver = Arc::new(TemplateViewResolver::with_defaults());
    let composer = FragmentComposer::new(resolver, settings.compose.default_locale.clone())
        .with_failure_policy(settings.compose.failure_policy)
        .with_stream_timeout(settings.compose.stream_timeout);

    let state = HttpState {
        todos,
        composer: Arc::new(composer),
    };

    info!(
        target = "mosaic::startup",
        failure_policy = %settings.compose.failure_policy,
        default_locale = %settings.compose.default_locale,
        stream_timeout_secs = settings.compose.stream_timeout.map(|d| d.as_secs()),
        "composer configured"
    );

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    info!(target = "mosaic::migrate", "migrations applied");
    Ok(())
}

/// Postgres when a URL is configured, otherwise a process-local store.
async fn init_repository(settings: &config::Settings) -> Result<Arc<dyn TodosRepo>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "mosaic::startup",
            "no database url configured, todos are kept in memory"
        );
        return Ok(Arc::new(InMemoryTodos::new()));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| InfraError::bind(addr, err))?;
    info!(target = "mosaic::startup", %addr, "listening");

    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(());
        },
    );

    tokio::select! {
        result = server.into_future() => result.map_err(InfraError::Serve)?,
        _ = drain_deadline(stopping_rx, settings.server.graceful_shutdown) => {
            warn!(
                target = "mosaic::shutdown",
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "in-flight requests did not finish in time"
            );
        }
    }

    info!(target = "mosaic::shutdown", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "mosaic::shutdown", error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!(target = "mosaic::shutdown", "shutdown requested, draining connections");
}

async fn drain_deadline(stopping: oneshot::Receiver<()>, grace: Duration) {
    if stopping.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
