//! IRIS command-line client.
//!
//! Signs in with `IRIS_USER` / `IRIS_PASSWORD`, optionally imports the stock
//! screener CSV given as the first argument, then signs out.

#![deny(clippy::all)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use iris_client::{open_token_store, AppError, AuthSession, Config, HttpClient, SqasApi};

const DEFAULT_EXTRACT_LOCALE: &str = "ja_JP";

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only log if it's not a "file not found" error
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = match Config::load().map_err(|e| AppError::Config(format!("{:#}", e))) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} ({})", e.user_message(), e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging.level);
    info!("Starting {} v{}", config.app.name, env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config, std::env::args_os().nth(1).map(PathBuf::from)).await {
        error!("{} ({})", e.user_message(), e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn required_var(name: &str) -> Result<String, AppError> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{} is not set", name)))
}

async fn run(config: Config, csv: Option<PathBuf>) -> Result<(), AppError> {
    let user = required_var("IRIS_USER")?;
    let password = Zeroizing::new(required_var("IRIS_PASSWORD")?);
    let locale =
        std::env::var("IRIS_EXTRACT_LOCALE").unwrap_or_else(|_| DEFAULT_EXTRACT_LOCALE.to_string());

    let kind = config
        .token_store_kind()
        .map_err(|e| AppError::Config(e.to_string()))?;
    let client = HttpClient::builder(config.client_options())
        .token_store(open_token_store(kind)?)
        .on_logout(|| warn!("Session expired, signed out"))
        .build()?;

    let session = AuthSession::new(client.clone());
    session
        .login(Some(config.api.base_url.as_str()), &user, &password)
        .await?;

    let imported = match &csv {
        Some(path) => import_csv(&SqasApi::new(client), path, &locale).await,
        None => Ok(()),
    };

    match &imported {
        // The server already considers the session gone
        Err(e) if e.requires_sign_out() => session.forget()?,
        _ => match session.logout().await {
            Ok(true) => {}
            Ok(false) => warn!("Server refused logout"),
            Err(e) => {
                warn!("Logout failed, dropping local session: {}", e);
                session.forget()?;
            }
        },
    }

    imported
}

async fn import_csv(api: &SqasApi, path: &Path, locale: &str) -> Result<(), AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .inspect_err(|e| error!("Failed to read {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "screener.csv".to_string());

    let parsed = api
        .parse_stock_screener_csv(&file_name, bytes, Utc::now(), locale)
        .await?;
    api.put_stock_info(parsed.key).await?;

    info!("Imported {} rows from {}", parsed.data.len(), path.display());
    Ok(())
}
