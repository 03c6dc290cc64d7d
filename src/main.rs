use anyhow::Result;
use crowdwatch::api::{AppState, RestApi};
use crowdwatch::config::{self, CONFIG_ENV_VAR};
use crowdwatch::db::repositories::AlertsRepository;
use crowdwatch::db::{AlertStore, DatabaseService};
use crowdwatch::messaging::ChannelLayer;
use crowdwatch::security::auth::AuthService;
use crowdwatch::security::SecurityService;
use crowdwatch::services::AlertIngestService;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

async fn run_app() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    // Initialize logging; RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting crowdwatch alert service");
    match &config_path {
        Some(path) => info!("Configuration loaded from {:?}", path),
        None => info!("No {} set, using default configuration", CONFIG_ENV_VAR),
    }

    // Create database connection pool and apply migrations
    let database = DatabaseService::new(&config.database).await?;
    if !database.health_check().await {
        warn!("Database health check failed; alert writes will error until it recovers");
    }

    let store: Arc<dyn AlertStore> = Arc::new(AlertsRepository::new(database.pool.clone()));
    let channels = Arc::new(ChannelLayer::new());

    let ingest = Arc::new(AlertIngestService::new(
        store.clone(),
        channels.clone(),
        &config.ingest,
    ));
    info!("Alert ingestion using {:?} policy", ingest.policy());

    let security = Arc::new(SecurityService::new(config.security.clone()));
    if !security.require_ws_auth() {
        warn!("Alert socket authentication is disabled");
    }
    let auth = Arc::new(AuthService::new(
        database.pool.clone(),
        security.clone(),
        &config.security,
    ));

    let state = AppState {
        ingest,
        store,
        channels,
        security,
        auth,
    };

    let http_server = RestApi::new(&config.api, &config.ingest, state)?;
    http_server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
        })
        .await?;

    database.pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_app()) {
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
