use clap::Parser;
use deadline_bot::bot::{BotContext, Dispatcher};
use deadline_bot::config::BotConfig;
use deadline_bot::db::{self, CredentialStore};
use deadline_bot::lms::MoodleClient;
use deadline_bot::logging::init_logging;
use deadline_bot::services::encryption_service::TokenCipher;
use deadline_bot::telegram::TelegramClient;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match BotConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load bot configuration: {e}");
            return Err(e.into());
        }
    };

    let _log_guard = init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting deadline bot.");

    // --- Database ---
    let pool = match db::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to open the database.");
            return Err(e.into());
        }
    };
    db::migrate(&pool).await?;

    let cipher = match config.credential_encryption_key.as_deref() {
        Some(key) => Some(TokenCipher::from_hex(key)?),
        None => {
            warn!("CREDENTIAL_ENCRYPTION_KEY is not set, tokens are stored in plain text.");
            None
        }
    };
    let store = CredentialStore::new(pool, cipher);

    // --- Remote APIs ---
    let lms = MoodleClient::new(&config.lms_url, config.request_timeout())?;
    let telegram = TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.request_timeout(),
    )?;

    let ctx = BotContext::new(config.clone(), Arc::new(telegram), Arc::new(lms), store);
    Dispatcher::new(ctx).run().await;

    info!("Deadline bot stopped.");
    Ok(())
}
