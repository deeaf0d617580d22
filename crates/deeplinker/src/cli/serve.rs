//! `serve`: run the resolution server until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use deeplinker_handoff::CancellationToken;
use deeplinker_protocol::DeeplinkerConfig;
use deeplinker_store::JsonFileLinkStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::error::HelpfulError;
use deeplinker::{app, serve};

#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    pub bind: Option<String>,
    pub public_url: Option<String>,
}

pub async fn run(mut config: DeeplinkerConfig, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(public_url) = args.public_url {
        config.server.public_base_url = public_url;
    }
    config
        .validate()
        .map_err(|err| {
            HelpfulError::new("Invalid server options")
                .with_context(err.to_string())
                .with_suggestion("TRY: deeplinker serve --public-url https://links.example.com")
        })?;

    let links_path = config.storage.links_path();
    let store = JsonFileLinkStore::open(&links_path)
        .await
        .with_context(|| format!("Failed to open link store {}", links_path.display()))?;
    info!("Serving links from {}", links_path.display());

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|err| HelpfulError::bind_failed(&config.server.bind_addr, &err.to_string()))?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => {
                warn!("Failed to listen for Ctrl+C: {}", err);
                return;
            }
        }
        signal_token.cancel();
    });

    println!(
        "Deeplinker listening on http://{} (public origin {})",
        config.server.bind_addr, config.server.public_base_url
    );
    println!("Press Ctrl+C to stop");

    serve(listener, app(&config, Arc::new(store)), shutdown)
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}
