mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use campuscruz_client::api::ApiClient;
use campuscruz_client::config::AppConfig;
use campuscruz_client::session::Session;
use clap::Parser;
use cli::Cli;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_writer(std::io::stderr)
        .init();

    debug!("Using backend at {}", config.api_url);

    let client = Arc::new(ApiClient::from_config(&config)?);
    let mut session = Session::new(client.clone(), config.allowed_email_domains.clone());
    session.bootstrap().await;

    let outcome = cli::run(args.command, &mut session, &config).await;

    if session.sync_login_required() || client.is_login_required() {
        eprintln!("Session expired. Please log in again.");
        return Ok(ExitCode::FAILURE);
    }

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            if cfg!(debug_assertions) {
                error!("Command failed: {:?}", e);
            }
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
