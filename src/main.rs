use clap::Parser;
use std::path::Path;

mod cli;

use crate::cli::Args;
use password_details::{Config, PasswordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    let dotenv_loaded = Path::new(".env").exists() && dotenvy::dotenv().is_ok();

    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(db) = &args.db {
        config.database_url = db.clone();
    }

    // RUST_LOG takes precedence over LOG_LEVEL
    env_logger::Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .format_module_path(true)
        .parse_default_env()
        .init();

    if dotenv_loaded {
        log::debug!("Loaded .env file");
    }
    log::debug!("Loaded config: {:?}", config);

    let store = match PasswordStore::connect(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Database connection failed ({:?}): {}", e.kind(), e);
            eprintln!("❌ Could not open {}: {}", config.redacted_database_url(), e);
            eprintln!("• Is your DB server running and reachable?");
            eprintln!("• Set DATABASE_URL in the environment or `.env`, or pass --db");
            return Err(e.into());
        }
    };

    let result = cli::handlers::handle_command(&store, args.command, args.json).await;

    log::info!("Closing database connections...");
    store.close().await;

    if let Err(e) = &result {
        log::error!("Command failed: {:#}", e);
    }
    result
}
