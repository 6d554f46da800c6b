mod config;
mod telemetry;

use catalog::{Catalog, CatalogError, GamepassId, UserId};
use clap::{Parser, Subcommand};
use gateway::responses::{CheckResponse, ListResponse, OwnedResponse};
use gateway::GatewayError;
use serde::Serialize;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser)]
#[command(version, about = "Gamepass catalog API")]
struct Cli {
    /// YAML config file. Defaults apply when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the HTTP API (default)
    Serve,
    /// List the gamepasses of every experience of a user
    List { user_id: UserId },
    /// Check whether a user owns a gamepass
    Check {
        user_id: UserId,
        gamepass_id: GamepassId,
    },
    /// Check a user against the configured gamepass catalog
    Owned { user_id: UserId },
}

#[derive(thiserror::Error, Debug)]
enum RunError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("could not encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = telemetry::init_logging(config.logging.as_ref());

    if let Some(metrics) = &config.metrics
        && let Err(e) = telemetry::init_metrics(metrics)
    {
        tracing::error!(error = %e, "could not set up metrics");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(CliCommand::Serve);
    match runtime.block_on(run(command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "passport exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, config: config::Config) -> Result<(), RunError> {
    let catalog = Catalog::new(config.upstream, config.session_cookie)?;
    if !catalog.has_session() {
        tracing::info!("no upstream session configured, using public listings only");
    }

    match command {
        CliCommand::Serve => serve(catalog, config.listener, config.admin_listener).await,
        CliCommand::List { user_id } => {
            print_json(&ListResponse::from(catalog.list_gamepasses(user_id).await?))
        }
        CliCommand::Check {
            user_id,
            gamepass_id,
        } => {
            let owns = catalog.owns_gamepass(user_id, gamepass_id).await?;
            print_json(&CheckResponse { owns })
        }
        CliCommand::Owned { user_id } => {
            print_json(&OwnedResponse::from(catalog.owned_gamepasses(user_id).await))
        }
    }
}

async fn serve(
    catalog: Catalog,
    listener: gateway::Listener,
    admin_listener: Option<gateway::Listener>,
) -> Result<(), RunError> {
    let ready = Arc::new(AtomicBool::new(false));

    let api_task = async {
        gateway::serve(&listener, catalog, ready.clone())
            .await
            .map_err(RunError::from)
    };

    let admin_task = async {
        let Some(admin) = &admin_listener else {
            return Ok(());
        };
        let probe = ready.clone();
        let service = AdminService::<_, io::Error>::new(move || probe.load(Ordering::Relaxed));
        run_http_service(&admin.host, admin.port, service)
            .await
            .map_err(RunError::from)
    };

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

fn print_json<T: Serialize>(body: &T) -> Result<(), RunError> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}
