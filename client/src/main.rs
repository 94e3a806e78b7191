// client/src/main.rs
//! Command-line demo: sign in to the auth backend with a local key.
use siwe_client::{ClientAgent, ClientConfig, HttpAuthBackend, LocalWallet};
use siwe_common::setup_tracing;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load()?;

    let level = tracing::Level::from_str(&config.log_level)
        .map_err(|_| format!("invalid log level {:?}", config.log_level))?;
    setup_tracing(level)?;

    let private_key = config
        .wallet_private_key
        .clone()
        .ok_or("wallet_private_key is not set; supply it via CLIENT__WALLET_PRIVATE_KEY")?;
    let wallet = Arc::new(LocalWallet::from_hex(&private_key, config.chain_id)?);
    let backend = Arc::new(HttpAuthBackend::new(&config.api_base_url)?);

    tracing::info!("Using auth backend at {}", config.api_base_url);
    let agent = ClientAgent::new(config, backend, wallet);

    if let Some(address) = agent.probe_session().await? {
        tracing::info!("Existing session for {}", address);
    }

    let address = agent.sign_in().await?;
    println!("signed in as {}", address);

    if std::env::args().any(|arg| arg == "--sign-out") {
        agent.sign_out().await;
        println!("signed out");
    }

    let state = agent.state();
    println!("phase: {:?}", state.phase());
    Ok(())
}
