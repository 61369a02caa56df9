//! importcheck-engine - import validation service
//!
//! Hosts the validation registry behind the request middleware pipeline and
//! serves it to the front-end over HTTP (`POST /invoke/:channel`).

use anyhow::{Context, Result};
use clap::Parser;
use importcheck_common::config::{resolve_root_folder, DATABASE_FILE, ROOT_FOLDER_ENV};
use importcheck_common::db::{init_database_pool, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use importcheck_engine::config::EngineConfig;
use importcheck_engine::{build_router, AppState, ValidationRegistry};

#[derive(Parser, Debug)]
#[command(name = "importcheck-engine")]
#[command(about = "Import validation engine")]
#[command(version)]
struct Args {
    /// Root folder holding config.toml and the database
    #[arg(long, env = "IMPORTCHECK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (default: <root>/config.toml)
    #[arg(long, env = "IMPORTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides [server].bind
    #[arg(long, env = "IMPORTCHECK_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("importcheck_engine=info,importcheck_common=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting importcheck-engine v{} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let config_path = args.config.unwrap_or_else(|| root_folder.join("config.toml"));
    let config = EngineConfig::load_or_default(&config_path)?;

    let db_path = config
        .database
        .path
        .clone()
        .unwrap_or_else(|| root_folder.join(DATABASE_FILE));
    info!("Database: {}", db_path.display());
    let pool = init_database_pool(&db_path).await?;

    let registry = Arc::new(ValidationRegistry::with_builtin());
    registry.set_database(Arc::new(SqliteStore::new(pool))).await;

    let state = AppState::new(registry.clone(), &config);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    registry.cleanup().await;
    info!("importcheck-engine stopped");

    Ok(())
}
