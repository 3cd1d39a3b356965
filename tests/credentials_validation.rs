//! Live-credential validation, skipped by default.

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use duytu_report_bot::config::Settings;
use duytu_report_bot::drive::DriveUploader;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[test]
#[ignore = "Requires real credentials"]
fn test_credentials_validation() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Starting credentials validation...");

    let settings = Settings::new().map_err(|e| anyhow!("configuration: {e}"))?;
    validate_telegram_token(&settings.bot_token);
    validate_chat_ids(&settings)?;

    DriveUploader::from_authorized_user_file(&settings.drive_token_path)
        .map_err(|e| anyhow!("drive credential bundle: {e}"))?;

    info!("Credentials validation passed successfully.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn validate_telegram_token(token: &str) {
    assert!(
        token.contains(':'),
        "BOT_TOKEN does not look like a Telegram bot token"
    );
}

fn validate_chat_ids(settings: &Settings) -> Result<()> {
    if settings.chat_id_nhom == settings.chat_id_canhan {
        return Err(anyhow!(
            "CHAT_ID_NHOM and CHAT_ID_CANHAN point at the same chat"
        ));
    }
    Ok(())
}
