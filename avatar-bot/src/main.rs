//! Avatar Bot CLI
//!
//! Runs the Telegram avatar wizard and manages its configuration.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use avatar_bot::config::{
    BotConfig, IssueLevel, config_path as default_config_path, init_config, load_config,
    load_config_from, save_config,
};
use avatar_bot::error::{BotError, Result};
use avatar_bot::gateway::GatewayBuilder;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Avatar Bot - generate DiceBear avatars through a Telegram wizard
#[derive(Parser)]
#[command(name = "avatar-bot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "AVATAR_BOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run(RunArgs),

    /// Write a default configuration file
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Bot token (overrides config and environment)
    #[arg(short, long)]
    token: Option<String>,
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "avatar_bot={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => cmd_run(args, cli.config).await,
        Commands::Init(args) => cmd_init(args, cli.config).await,
        Commands::Config(args) => cmd_config(args, cli.config).await,
    }
}

/// Load config from an explicit path or the default location.
async fn resolve_config(path: Option<PathBuf>) -> Result<BotConfig> {
    let config = match path {
        Some(path) => load_config_from(&path).await?,
        None => load_config().await?,
    };
    Ok(config)
}

/// Start the bot and run until Ctrl+C.
async fn cmd_run(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Avatar Bot...");

    let mut config = resolve_config(config_path).await?;
    if let Some(token) = args.token {
        config.telegram.token = Some(token);
    }

    for issue in config.validate() {
        match issue.level {
            IssueLevel::Error => tracing::error!("{}", issue.message),
            IssueLevel::Warning => tracing::warn!("{}", issue.message),
        }
    }
    if config.has_errors() {
        return Err(BotError::config(
            "configuration has errors; see `avatar-bot config validate`",
        ));
    }

    let gateway = GatewayBuilder::new().bot_config(config).build()?;

    println!("Bot running. Press Ctrl+C to stop.\n");

    gateway
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl+C: {e}");
                return;
            }
            println!("\nShutting down...");
        })
        .await
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config_file = config_path.clone().unwrap_or_else(default_config_path);

    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    match config_path {
        Some(path) => save_config(&BotConfig::default(), &path).await?,
        None => init_config().await?,
    }

    println!("Configuration created: {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. put your bot token in telegram.token");
    println!("     (or export TELEGRAM_BOT_TOKEN=<token>)");
    println!("  2. avatar-bot run");

    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config_file = config_path.clone().unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            let mut config = resolve_config(config_path).await?;
            if config.telegram.token.is_some() {
                config.telegram.token = Some("********".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate => {
            if config_path.is_some() && !config_file.exists() {
                println!("error: configuration file does not exist");
                return Ok(());
            }

            let config = match resolve_config(config_path).await {
                Ok(config) => config,
                Err(e) => {
                    println!("error: {e}");
                    return Ok(());
                }
            };

            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in issues {
                let label = match issue.level {
                    IssueLevel::Error => "error",
                    IssueLevel::Warning => "warning",
                };
                println!("{label}: {}", issue.message);
            }
        }
    }

    Ok(())
}
