use tracing::{error, info};

use cumulus::drive::build_store;
use cumulus::web::WebServer;
use cumulus::{Config, Database};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = cumulus::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        cumulus::logging::init_console_only(&config.logging.level);
    }

    info!("Cumulus drive server");

    if let Err(e) = run(config).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> cumulus::Result<()> {
    config.validate()?;

    let db = Database::open(&config.database.path).await?;
    info!("Database opened at {}", config.database.path);

    let store = build_store(&config.storage)?;
    info!("Object store: {}", store.backend_name());

    let server = WebServer::new(&config, db, store)?;
    server.run().await?;
    Ok(())
}
