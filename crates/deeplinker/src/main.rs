//! Deeplinker command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deeplinker_logging::{init_logging, LogConfig};

mod cli;

use cli::config::ConfigAction;
use cli::handoff::{FlowArgs, HandoffArgs};
use cli::links::AddLinkArgs;
use cli::resolve::ResolveArgs;
use cli::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "deeplinker", version, about = "Deep link resolution server")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.deeplinker/config.toml)
    #[arg(long, global = true, env = "DEEPLINKER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the resolution server
    Serve {
        /// Listen address, overrides server.bind_addr
        #[arg(long)]
        bind: Option<String>,

        /// Public origin used to rebuild request URLs, overrides server.public_base_url
        #[arg(long)]
        public_url: Option<String>,
    },

    /// Create a link or update the URLs of an existing one
    AddLink {
        /// URL-safe identifier (letters, digits, '-' and '_')
        #[arg(long)]
        slug: String,

        /// App URL opened on iOS
        #[arg(long)]
        ios: Option<String>,

        /// App URL opened on Android
        #[arg(long)]
        android: Option<String>,

        /// Destination for desktop and unmatched platforms
        #[arg(long)]
        web: Option<String>,

        /// Destination when no web URL is set
        #[arg(long)]
        fallback: Option<String>,
    },

    /// Insert the example links (existing slugs are left unchanged)
    Seed,

    /// List stored links
    Links {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what the server would answer for a link, without serving
    Resolve {
        slug: String,

        /// Platform override: ios, android or web
        #[arg(short, long)]
        platform: Option<String>,

        /// User-Agent used for detection
        #[arg(long)]
        user_agent: Option<String>,

        /// Request query string, e.g. "utm_source=mail&access_code=42"
        #[arg(short, long)]
        query: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the smart redirect flow for a /smart-redirect URL
    Handoff {
        /// Smart redirect URL (absolute or server-relative)
        url: String,

        /// Length of one time unit in milliseconds
        #[arg(long)]
        unit_ms: Option<u64>,

        /// Read manual actions from stdin
        #[arg(short, long)]
        interactive: bool,
    },

    /// Recover a pending deep link as on first launch after install
    PostInstall {
        /// Length of one time unit in milliseconds
        #[arg(long)]
        unit_ms: Option<u64>,

        /// Read manual actions from stdin
        #[arg(short, long)]
        interactive: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

fn command_wants_json(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Links { json: true } | Commands::Resolve { json: true, .. }
    )
}

fn run_command(cli: Cli) -> Result<()> {
    let Cli {
        config: config_file,
        command,
        ..
    } = cli;
    let explicit = config_file.as_deref();
    let load = || cli::config::load_config(explicit);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async move {
        match command {
            Commands::Serve { bind, public_url } => {
                cli::serve::run(load()?, ServeArgs { bind, public_url }).await
            }
            Commands::AddLink {
                slug,
                ios,
                android,
                web,
                fallback,
            } => {
                let args = AddLinkArgs {
                    slug,
                    ios,
                    android,
                    web,
                    fallback,
                };
                cli::links::add_link(&load()?, args).await
            }
            Commands::Seed => cli::links::seed(&load()?).await,
            Commands::Links { json } => cli::links::list(&load()?, json).await,
            Commands::Resolve {
                slug,
                platform,
                user_agent,
                query,
                json,
            } => {
                let args = ResolveArgs {
                    slug,
                    platform,
                    user_agent,
                    query,
                    json,
                };
                cli::resolve::run(&load()?, args).await
            }
            Commands::Handoff {
                url,
                unit_ms,
                interactive,
            } => {
                let args = HandoffArgs {
                    url,
                    flow: FlowArgs {
                        unit_ms,
                        interactive,
                    },
                };
                cli::handoff::run_handoff(&load()?, args).await
            }
            Commands::PostInstall {
                unit_ms,
                interactive,
            } => {
                let args = FlowArgs {
                    unit_ms,
                    interactive,
                };
                cli::handoff::run_post_install(&load()?, args).await
            }
            Commands::Config { action } => {
                let action = match action {
                    ConfigCommand::Show => ConfigAction::Show,
                    ConfigCommand::Path => ConfigAction::Path,
                };
                cli::config::run(action, explicit)
            }
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let _log_guard = match init_logging(LogConfig {
        app_name: "deeplinker",
        verbose: cli.verbose,
        quiet: json_mode,
        log_dir: None,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
