//! `handoff` and `post-install`: run the client flows from a terminal.
//!
//! Navigations are logged instead of performed; the relay is the file at
//! `storage.relay_file`, so a `handoff` run followed by `post-install`
//! exercises the whole install gap.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use deeplinker_handoff::{
    query_from_url, CancellationToken, FileRelay, FlowDriver, LogNavigator, PostInstallCommand,
    PostInstallConfig, PostInstallRecovery, SmartRedirectCommand, SmartRedirectConfig,
    SmartRedirectCoordinator, SmartRedirectPhase,
};
use deeplinker_protocol::DeeplinkerConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::error::HelpfulError;

#[derive(Debug, Clone, Default)]
pub struct FlowArgs {
    /// Overrides `handoff.unit_ms`.
    pub unit_ms: Option<u64>,
    /// Read manual actions from stdin while the flow runs.
    pub interactive: bool,
}

#[derive(Debug, Clone)]
pub struct HandoffArgs {
    pub url: String,
    pub flow: FlowArgs,
}

pub async fn run_handoff(config: &DeeplinkerConfig, args: HandoffArgs) -> Result<()> {
    let query = query_from_url(&args.url);
    if args.flow.interactive {
        println!("Commands: r = retry app, s = go to store now, o = app opened");
    }

    let mut driver = driver(config, &args.flow);
    let commands = args
        .flow
        .interactive
        .then(|| spawn_stdin_commands(driver.cancellation_token(), parse_handoff_command));

    let coordinator = SmartRedirectCoordinator::new(SmartRedirectConfig::from(&config.handoff));
    let coordinator = driver.run_smart_redirect(coordinator, &query, commands).await;

    if let Some(err) = coordinator.error() {
        return Err(HelpfulError::invalid_handoff_url(&args.url, &err.to_string()).into());
    }
    for change in coordinator.history() {
        info!(at = change.at, "{} -> {}", change.from, change.to);
    }
    if let Some(entry) = coordinator.entry() {
        println!(
            "{} app: {} (store: {})",
            entry.platform, entry.app_url, entry.store_url
        );
        if coordinator.phase() == SmartRedirectPhase::StoreRedirected && entry.access_code.is_some()
        {
            println!(
                "Pending deep link saved to {}; run `deeplinker post-install` to recover it",
                config.storage.relay_path().display()
            );
        }
    }
    println!("Finished in phase: {}", coordinator.phase());
    Ok(())
}

pub async fn run_post_install(config: &DeeplinkerConfig, args: FlowArgs) -> Result<()> {
    if args.interactive {
        println!("Commands: o = open app again");
    }
    let mut driver = driver(config, &args);
    let commands = args
        .interactive
        .then(|| spawn_stdin_commands(driver.cancellation_token(), parse_post_install_command));

    let recovery = PostInstallRecovery::new(PostInstallConfig::from_config(config));
    let recovery = driver
        .run_post_install(recovery, commands)
        .await
        .with_context(|| {
            format!(
                "Failed to read pending deep link from {}",
                config.storage.relay_path().display()
            )
        })?;

    match recovery.payload() {
        Some(payload) => println!(
            "Recovered '{}' ({} app attempt(s), finished in phase: {})",
            payload.slug,
            recovery.attempts(),
            recovery.phase().as_str()
        ),
        None => println!("No pending deep link"),
    }
    Ok(())
}

fn driver(config: &DeeplinkerConfig, args: &FlowArgs) -> FlowDriver {
    let unit = Duration::from_millis(args.unit_ms.unwrap_or(config.handoff.unit_ms));
    let relay = FileRelay::new(config.storage.relay_path());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, tearing down");
            signal_token.cancel();
        }
    });
    FlowDriver::new(Box::new(LogNavigator), Arc::new(relay), unit).with_cancellation(cancel)
}

fn parse_handoff_command(line: &str) -> Option<SmartRedirectCommand> {
    match line.trim() {
        "r" | "retry" => Some(SmartRedirectCommand::RetryAppOpen),
        "s" | "store" => Some(SmartRedirectCommand::GoToStoreNow),
        "o" | "opened" => Some(SmartRedirectCommand::AppOpened),
        _ => None,
    }
}

fn parse_post_install_command(line: &str) -> Option<PostInstallCommand> {
    match line.trim() {
        "o" | "open" => Some(PostInstallCommand::OpenAppAgain),
        _ => None,
    }
}

/// Feed parsed stdin lines into a channel from a plain thread, so a pending
/// blocking read never holds up runtime shutdown.
fn spawn_stdin_commands<C: Send + 'static>(
    cancel: CancellationToken,
    parse: fn(&str) -> Option<C>,
) -> mpsc::Receiver<C> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if cancel.is_cancelled() {
                break;
            }
            match parse(&line) {
                Some(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command '{}'", line.trim()),
            }
        }
    });
    rx
}
