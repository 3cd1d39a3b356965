use dotenvy::dotenv;
use duytu_report_bot::bot::handlers::{self, Command};
use duytu_report_bot::config::Settings;
use duytu_report_bot::drive::DriveUploader;
use duytu_report_bot::state::FileSessionStore;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from log output
struct RedactionPatterns {
    token_in_url: Regex,
    bare_token: Regex,
}

impl RedactionPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_in_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)")?,
            bare_token: Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let pass = self.token_in_url.replace_all(input, "$1[BOT_TOKEN]");
        self.bare_token.replace_all(&pass, "[BOT_TOKEN]").to_string()
    }
}

struct RedactingWriter {
    inner: io::Stderr,
    patterns: Arc<RedactionPatterns>,
}

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.patterns.redact(&s).as_bytes())?;
        // Report the original length to satisfy the contract even when the
        // redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingStderr {
    patterns: Arc<RedactionPatterns>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RedactingStderr {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting bot báo cáo duy tu...");

    let settings = init_settings();
    let drive = init_drive(&settings);
    let store = Arc::new(FileSessionStore::new(settings.state_file.clone()));

    let bot = Bot::new(settings.bot_token.clone());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, store, drive])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(RedactingStderr { patterns }))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_drive(settings: &Settings) -> Arc<DriveUploader> {
    match DriveUploader::from_authorized_user_file(&settings.drive_token_path) {
        Ok(d) => {
            info!("Drive uploader initialized.");
            Arc::new(d)
        }
        Err(e) => {
            error!("Failed to initialize Drive uploader: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_relay))
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_relay(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    store: Arc<FileSessionStore>,
    drive: Arc<DriveUploader>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_group_message(bot, msg, settings, store, drive).await {
        error!("Relay handler error: {}", e);
    }
    respond(())
}
