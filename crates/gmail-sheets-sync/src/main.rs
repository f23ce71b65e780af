use anyhow::{Context, Result};
use chrono::Local;
use gmail_sheets_sync::auth;
use gmail_sheets_sync::gmail_client::GmailClient;
use gmail_sheets_sync::sheets_client::SheetsClient;
use gmail_sheets_sync::state::StateStore;
use gmail_sheets_sync::{Config, RunSummary, SyncController, SyncError, SyncOptions};
use tracing_subscriber::EnvFilter;

const BANNER_RULE: &str = "============================================================";

#[tokio::main]
async fn main() {
    // Before the subscriber so RUST_LOG from .env applies
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("A rustls crypto provider was already installed");
    }

    println!("{}", BANNER_RULE);
    println!("Gmail to Google Sheets Sync");
    println!("Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", BANNER_RULE);

    // Every outcome exits 0; failures are only logged
    let outcome = tokio::select! {
        result = run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Sync interrupted by user");
            return;
        }
    };

    match outcome {
        Ok(summary) => print_summary(&summary),
        Err(e) if is_setup_failure(&e) => {
            tracing::error!("Setup failed, nothing was synced: {:?}", e)
        }
        Err(e) => tracing::error!("Sync failed: {:?}", e),
    }
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Configuration and authentication errors stop the run before any API call
fn is_setup_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_fatal)
}

async fn run() -> Result<RunSummary> {
    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.validate()?;

    tracing::info!("[Step 1] Authenticating with Google...");
    let authenticator = auth::authenticate(&config.auth).await?;
    let gmail = GmailClient::new(authenticator.clone())?;
    let sheets = SheetsClient::new(&config, authenticator)?;
    tracing::info!("Authentication successful");

    let controller = SyncController::new(
        gmail,
        sheets,
        StateStore::new(&config.state_path),
        SyncOptions::from(&config),
    );

    Ok(controller.run().await?)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", BANNER_RULE);
    println!("SYNC COMPLETED");
    println!("{}", BANNER_RULE);
    println!("{}", summary);
    println!("Completed at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", BANNER_RULE);
}
