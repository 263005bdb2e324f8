//! Intent bot webhook entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build LLM provider and handler registry
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Serve the webhook until shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use intent_bot::comms::{self, WebhookState};
use intent_bot::config::{self, IntegrationsConfig};
use intent_bot::dispatch::Dispatcher;
use intent_bot::error::AppError;
use intent_bot::handlers::{HandlerRegistry, catalog};
use intent_bot::llm::providers;
use intent_bot::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        bot_name = %config.bot_name,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        llm_provider = %config.llm.provider,
        llm_model = %config.llm.openai.model,
        "config loaded"
    );

    let token = config
        .bot_token
        .clone()
        .ok_or_else(|| AppError::Config("BOT_TOKEN is not set".into()))?;

    let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
    let registry = Arc::new(HandlerRegistry::new(catalog::reference(&config.integrations))?);
    let http = http_client(&config.integrations)?;

    info!(model = %llm.identity(), handlers = registry.len(), "pipeline ready");

    let dispatcher = Dispatcher::new(registry, llm, http);

    // Ctrl-C cancels the token so the server drains and exits.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    comms::serve(&config.webhook.bind, WebhookState::new(&token, dispatcher), shutdown).await?;

    info!("shutdown complete");
    Ok(())
}

/// Client for the target APIs, with the configured request timeout.
fn http_client(cfg: &IntegrationsConfig) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_seconds))
        .build()
        .map_err(|e| AppError::Comms(format!("failed to build HTTP client: {e}")))
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: intent-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
