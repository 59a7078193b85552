use anyhow::{Context, Result};
use app_core::{CoreBuilder, EventInterpreter, Scheduler, SchedulerConfig};
use cr_single_instance::CrSingleInstance;
use db_sqlite::SqliteDb;
use server::{
    build_router,
    config::AppConfig,
    rcon_client::RconClient,
    steam_resolver::{DisabledSteamResolver, SteamWebResolver},
};
use shared::{AppState, AuthTokens};
use std::{process::ExitCode, sync::Arc};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

fn init_tracing_bunyan() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum=info"));

    // Name identifies the service in log streams
    let formatting_layer = BunyanFormattingLayer::new(
        "matchzy-auto-tournament".into(),
        std::io::stdout, // single sink: JSON to stdout
    );

    // - JsonStorageLayer: propagates span fields to child events
    // - BunyanFormattingLayer: strict Bunyan JSON output
    // - ErrorLayer: enrich errors with span context
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    // Load .env first if present; ignore if missing (Docker sets envs)
    let _ = dotenvy::dotenv();
    // map all log! calls in dependencies to tracing
    if LogTracer::init().is_err() {
        eprintln!("log tracer already installed");
    }
    if let Err(e) = init_tracing_bunyan() {
        eprintln!("tracing init failed: {e:#}");
        return ExitCode::from(1);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "configuration_invalid");
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            ExitCode::from(1)
        }
    }
}

async fn run(config: AppConfig) -> Result<ExitCode> {
    // store: open + migrate (exit code 2 on migration failure)
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!(error = %e, dir = %config.data_dir.display(), "data_dir_unusable");
        return Ok(ExitCode::from(2));
    }
    let db_path = config.data_dir.join("tournament.db");
    let db = match SqliteDb::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, "store_open_failed");
            return Ok(ExitCode::from(2));
        }
    };
    if let Err(e) = db.run_migration().await {
        error!(error = %e, "store_migration_failed");
        return Ok(ExitCode::from(2));
    }

    // ports
    let registry = Arc::new(CrSingleInstance::new());
    let steam: Arc<dyn app_core::SteamResolverPort> = match &config.steam_api_key {
        Some(key) => Arc::new(SteamWebResolver::new(key.clone())),
        None => {
            info!("steam_resolver_disabled");
            Arc::new(DisabledSteamResolver)
        }
    };
    let core = Arc::new(
        CoreBuilder::new()
            .set_db(db)
            .set_cr(registry)
            .set_rcon(Arc::new(RconClient))
            .set_steam(steam)
            .build(),
    );

    // background tasks share one cooperative shutdown flag
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_cfg = SchedulerConfig::new(config.base_url.as_str(), config.server_token.as_str());
    let (scheduler, scheduler_handle) =
        Scheduler::new(core.clone(), scheduler_cfg.clone(), shutdown_rx.clone());
    let scheduler_task = tokio::spawn(scheduler.run());
    let interpreter = EventInterpreter::new(
        core.clone(),
        scheduler_handle.clone(),
        scheduler_cfg.clone(),
        shutdown_rx,
    );

    let state = AppState {
        core,
        interpreter,
        scheduler: scheduler_handle,
        scheduler_cfg: Arc::new(scheduler_cfg),
        auth: Arc::new(AuthTokens {
            api_token: config.api_token.clone(),
            server_token: config.server_token.clone(),
        }),
        demo_dir: Arc::new(config.demo_dir.clone()),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening on http server");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown_requested");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    // the scheduler finishes its current cycle before exiting
    let _ = scheduler_task.await;
    info!("shutdown_complete");
    Ok(ExitCode::SUCCESS)
}
