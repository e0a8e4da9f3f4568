use crate::{
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use connectors::http::HttpGateway;
use engine_config::settings::{CoordinatorSettings, ShopshiftConfig, env::apply_env_overrides};
use engine_core::gateway::MigrationGateway;
use engine_runtime::{
    coordinator::{
        MigrationLock,
        broadcast::BroadcastCoordinator,
        channel::BroadcastChannel,
    },
    execution::{
        session::MigrationOutcome,
        worker::{MigrationWorker, Subscribers},
    },
};
use model::{
    events::{EntityCountsUpdated, ProgressUpdated, StatusChanged},
    migration::request::MigrationRequest,
};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "shopshift",
    version = "0.1.0",
    about = "Client-driven shop data migration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_env("SHOPSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(err) => {
            error!(error = %err, "shopshift failed");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::Migrate {
            selection,
            config,
            env_file,
            output,
        } => {
            let config = load_settings(config.as_deref(), env_file.as_deref())?;
            let request = load_selection(&selection).await?;
            let outcome = migrate(config, request).await?;

            match output {
                Some(path) => output::write_report(&outcome, &path).await?,
                None => output::print_report(&outcome)?,
            }

            if outcome.errors.is_empty() {
                Ok(ExitCode::Success)
            } else {
                Ok(ExitCode::CompletedWithErrors)
            }
        }
        Commands::Settings { config, env_file } => {
            let mut config = load_settings(config.as_deref(), env_file.as_deref())?;
            if config.gateway.access_token.is_some() {
                config.gateway.access_token = Some("********".to_string());
            }
            println!("{}", config.to_toml_string()?);
            Ok(ExitCode::Success)
        }
    }
}

/// Settings file, then `SHOPSHIFT_*` variables from the process and the
/// optional .env file, then validation.
fn load_settings(
    path: Option<&Path>,
    env_file: Option<&Path>,
) -> Result<ShopshiftConfig, CliError> {
    let mut config = ShopshiftConfig::load(path)?;

    let mut env = EnvManager::new();
    if let Some(env_file) = env_file {
        env.load_from_file(env_file)?;
    }
    let applied = apply_env_overrides(&mut config, env.all())?;
    debug!(applied, "Applied environment overrides");

    config.validate()?;
    Ok(config)
}

async fn load_selection(path: &Path) -> Result<MigrationRequest, CliError> {
    let source = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&source).map_err(CliError::SelectionParse)
}

async fn migrate(
    config: ShopshiftConfig,
    request: MigrationRequest,
) -> Result<MigrationOutcome, CliError> {
    let gateway: Arc<dyn MigrationGateway> = Arc::new(HttpGateway::new(&config.gateway)?);
    let channel = coordination_channel(&config.migration.coordinator)?;
    let lock: Arc<dyn MigrationLock> = Arc::new(BroadcastCoordinator::new(
        channel,
        config.migration.coordinator.wait_window(),
    ));
    let worker = MigrationWorker::new(gateway, lock, config.migration);

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();
    let cancel = shutdown.cancel_token();

    info!(run_id = %request.run_id, base_url = %config.gateway.base_url, "Starting migration");

    tokio::select! {
        outcome = worker.start(request, console_subscribers()) => Ok(outcome?),
        _ = cancel.cancelled() => {
            info!(requested = shutdown.is_shutdown_requested(), "Migration abandoned");
            Err(CliError::ShutdownRequested)
        }
    }
}

#[cfg(unix)]
fn coordination_channel(
    settings: &CoordinatorSettings,
) -> Result<Arc<dyn BroadcastChannel>, CliError> {
    use engine_runtime::coordinator::socket::SocketBroadcastChannel;

    let dir = settings.socket_dir();
    debug!(dir = %dir.display(), "Joining sibling contexts");
    Ok(Arc::new(SocketBroadcastChannel::bind(&dir)?))
}

#[cfg(not(unix))]
fn coordination_channel(
    _settings: &CoordinatorSettings,
) -> Result<Arc<dyn BroadcastChannel>, CliError> {
    use engine_runtime::coordinator::channel::LocalBroadcastHub;

    tracing::warn!("Cross-process coordination is unavailable on this platform");
    Ok(Arc::new(LocalBroadcastHub::default()))
}

fn console_subscribers() -> Subscribers {
    Subscribers::default()
        .on_status(|e: &StatusChanged| info!(run_id = %e.run_id, status = %e.status, "Status"))
        .on_progress(|e: &ProgressUpdated| {
            info!(
                entity = %e.entity_name,
                progress = e.entity_group_progress_value,
                of = e.entity_count,
                "Progress"
            )
        })
        .on_entity_count(|e: &EntityCountsUpdated| {
            for group in &e.entity_groups {
                info!(group = %group.id, count = group.count, "Records to write");
            }
        })
}
