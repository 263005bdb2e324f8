//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the file named by `INTENT_BOT_CONFIG`), then applies the
//! `INTENT_BOT_LOG_LEVEL`, `PORT` and `LLM_MODEL` env overrides.
//! Secrets (`BOT_TOKEN`, `LLM_API_KEY`) are only ever read from the
//! environment, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// Webhook listener configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Socket address the axum server binds to.
    pub bind: String,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Name shown to users in the capability summary. Derived from `model`
    /// when absent.
    pub display_name: Option<String>,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"` or `"openai"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Endpoints and timeout for the fixed target APIs.
#[derive(Debug, Clone)]
pub struct IntegrationsConfig {
    /// Timeout applied to every outbound target API call.
    pub timeout_seconds: u64,
    pub deposit_url: String,
    pub six_sigma_url: String,
}

/// Fully-resolved bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub webhook: WebhookConfig,
    pub llm: LlmConfig,
    pub integrations: IntegrationsConfig,
    /// Telegram bot token from `BOT_TOKEN`. Doubles as the webhook path secret.
    pub bot_token: Option<String>,
    /// API key from `LLM_API_KEY`; `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

/// Values that take precedence over the TOML file.
///
/// [`load`] fills this from the environment; tests build it directly
/// instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub port: Option<String>,
    pub model: Option<String>,
    pub bot_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("INTENT_BOT_LOG_LEVEL").ok(),
            port: env::var("PORT").ok(),
            model: env::var("LLM_MODEL").ok(),
            bot_token: env::var("BOT_TOKEN").ok().filter(|t| !t.is_empty()),
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    webhook: RawWebhook,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    integrations: RawIntegrations,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(default = "default_webhook_bind")]
    bind: String,
}

impl Default for RawWebhook {
    fn default() -> Self {
        Self { bind: default_webhook_bind() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            display_name: None,
            temperature: default_openai_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawIntegrations {
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_deposit_url")]
    deposit_url: String,
    #[serde(default = "default_six_sigma_url")]
    six_sigma_url: String,
}

impl Default for RawIntegrations {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            deposit_url: default_deposit_url(),
            six_sigma_url: default_six_sigma_url(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_webhook_bind() -> String { "0.0.0.0:8080".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_deposit_url() -> String { "https://compound-interest-calculator.containerapps.ru/standard".to_string() }
fn default_six_sigma_url() -> String { "https://six-sigma.containerapps.ru/chart".to_string() }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `path`, else `INTENT_BOT_CONFIG`, else
/// `config/default.toml`, then apply env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = path
        .map(PathBuf::from)
        .or_else(|| env::var("INTENT_BOT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config/default.toml"));
    load_from(&path, Overrides::from_env())
}

/// Loader with an explicit path and overrides.
pub fn load_from(path: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let bind = match overrides.port.as_deref() {
        Some(port) => with_port(&parsed.webhook.bind, port)?,
        None => parsed.webhook.bind,
    };

    let log_level = overrides.log_level.unwrap_or(parsed.bot.log_level);
    logger::parse_level(&log_level).map_err(|e| AppError::Config(format!("bot.log_level: {e}")))?;

    let oai = parsed.llm.openai;

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level,
        webhook: WebhookConfig { bind },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: oai.api_base_url,
                model: overrides.model.unwrap_or(oai.model),
                display_name: oai.display_name.filter(|n| !n.trim().is_empty()),
                temperature: oai.temperature,
                timeout_seconds: oai.timeout_seconds,
            },
        },
        integrations: IntegrationsConfig {
            timeout_seconds: parsed.integrations.timeout_seconds,
            deposit_url: parsed.integrations.deposit_url,
            six_sigma_url: parsed.integrations.six_sigma_url,
        },
        bot_token: overrides.bot_token,
        llm_api_key: overrides.llm_api_key,
    })
}

/// Replace the port of a `host:port` bind address.
fn with_port(bind: &str, port: &str) -> Result<String, AppError> {
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("invalid PORT value: '{port}'")))?;
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or(bind);
    Ok(format!("{host}:{port}"))
}

/// Safe `Config` for unit tests: dummy LLM, no secrets.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            webhook: WebhookConfig { bind: "127.0.0.1:0".into() },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    display_name: None,
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            integrations: IntegrationsConfig {
                timeout_seconds: 1,
                deposit_url: "http://localhost:0/standard".into(),
                six_sigma_url: "http://localhost:0/chart".into(),
            },
            bot_token: None,
            llm_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[bot]
name = "test-bot"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Overrides::default()).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.webhook.bind, "0.0.0.0:8080");
        assert_eq!(cfg.llm.provider, "dummy");
        assert!(cfg.integrations.deposit_url.ends_with("/standard"));
        assert!(cfg.integrations.six_sigma_url.ends_with("/chart"));
        assert!(cfg.bot_token.is_none());
    }

    #[test]
    fn parse_full_config() {
        let f = write_toml(
            r#"
[bot]
name = "router"
log_level = "debug"

[webhook]
bind = "127.0.0.1:9000"

[llm]
default = "openai"

[llm.openai]
api_base_url = "http://127.0.0.1:1234/v1/chat/completions"
model = "GigaChat"
display_name = "Assistant"
timeout_seconds = 5

[integrations]
timeout_seconds = 7
deposit_url = "http://deposit.local/standard"
six_sigma_url = "http://sigma.local/chart"
"#,
        );
        let cfg = load_from(f.path(), Overrides::default()).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.webhook.bind, "127.0.0.1:9000");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "GigaChat");
        assert_eq!(cfg.llm.openai.display_name.as_deref(), Some("Assistant"));
        assert_eq!(cfg.llm.openai.timeout_seconds, 5);
        assert_eq!(cfg.integrations.timeout_seconds, 7);
        assert_eq!(cfg.integrations.deposit_url, "http://deposit.local/standard");
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), Overrides::default());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn missing_bot_section_errors() {
        let f = write_toml("[webhook]\nbind = \"0.0.0.0:1\"\n");
        assert!(load_from(f.path(), Overrides::default()).is_err());
    }

    #[test]
    fn port_override_replaces_bind_port() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides { port: Some("9443".into()), ..Overrides::default() };
        let cfg = load_from(f.path(), overrides).unwrap();
        assert_eq!(cfg.webhook.bind, "0.0.0.0:9443");
    }

    #[test]
    fn invalid_port_override_errors() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides { port: Some("http".into()), ..Overrides::default() };
        assert!(load_from(f.path(), overrides).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides {
            log_level: Some("trace".into()),
            model: Some("GigaChat-Pro".into()),
            bot_token: Some("123:abc".into()),
            llm_api_key: Some("sk-test".into()),
            ..Overrides::default()
        };
        let cfg = load_from(f.path(), overrides).unwrap();
        assert_eq!(cfg.log_level, "trace");
        assert_eq!(cfg.llm.openai.model, "GigaChat-Pro");
        assert_eq!(cfg.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(cfg.llm_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn invalid_log_level_override_errors() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides { log_level: Some("loud".into()), ..Overrides::default() };
        let msg = load_from(f.path(), overrides).unwrap_err().to_string();
        assert!(msg.contains("bot.log_level"), "{msg}");
        assert!(msg.contains("loud"), "{msg}");
    }

    #[test]
    fn invalid_log_level_in_file_errors() {
        let f = write_toml("[bot]\nname = \"b\"\nlog_level = \"chatty\"\n");
        assert!(matches!(load_from(f.path(), Overrides::default()), Err(AppError::Config(_))));
    }

    #[test]
    fn blank_display_name_is_ignored() {
        let f = write_toml("[bot]\nname = \"b\"\n[llm.openai]\ndisplay_name = \"  \"\n");
        let cfg = load_from(f.path(), Overrides::default()).unwrap();
        assert!(cfg.llm.openai.display_name.is_none());
    }

    #[test]
    fn test_default_is_keyless() {
        let cfg = Config::test_default();
        assert_eq!(cfg.llm.provider, "dummy");
        assert!(cfg.llm_api_key.is_none());
    }
}
