use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{ProviderConfig, ProviderKind, SwitchboardConfig};
use switchboard_core::providers::ProviderAdapter;
use switchboard_core::{
    AnthropicAdapter, BreakerConfig, OpenAiAdapter, OpenAiCompatAdapter, ProviderDescriptor,
    ResponseValidator, Router, RouterConfig, ValidatorConfig,
};
use switchboard_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version)]
#[command(about = "Switchboard — multi-provider LLM router")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the router and HTTP gateway
    Start,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Switchboard initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure your providers, then run `switchboard start`.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(custom_path: &Option<PathBuf>) -> Result<()> {
    let config = SwitchboardConfig::load(custom_path)?;
    println!("{:#?}", config);
    Ok(())
}

async fn cmd_start(custom_path: &Option<PathBuf>) -> Result<()> {
    let config = SwitchboardConfig::load(custom_path)?;

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address {:?}", config.server.bind))?;

    let router = Arc::new(build_router(&config)?);
    info!(
        "Router configured with {} providers: {}",
        router.provider_count(),
        router.provider_names().join(", ")
    );

    let server = GatewayServer::new(bind, router);

    tokio::select! {
        result = server.run() => result,
        _ = signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

/// Assemble the routing engine from a validated config
fn build_router(config: &SwitchboardConfig) -> Result<Router> {
    let mut validator_config = ValidatorConfig::default();
    validator_config
        .code_signals
        .extend(config.validator.extra_code_signals.iter().cloned());
    validator_config
        .error_markers
        .extend(config.validator.extra_error_markers.iter().cloned());

    let router_config = RouterConfig {
        call_timeout: config.router.call_timeout(),
        request_deadline: config.router.request_deadline(),
    };
    let breaker_config = BreakerConfig {
        failure_threshold: config.breaker.failure_threshold,
        cooldown: config.breaker.cooldown(),
    };

    let mut router = Router::new(ResponseValidator::new(validator_config), router_config);
    for provider in &config.providers {
        let adapter = build_adapter(provider, config.router.call_timeout())?;
        router.register_provider(
            ProviderDescriptor::new(provider.effective_name(), provider.priority),
            adapter,
            breaker_config,
        );
    }
    Ok(router)
}

fn build_adapter(
    provider: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn ProviderAdapter>> {
    let name = provider.effective_name();
    let base_url = provider.effective_base_url()?;

    Ok(match provider.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(
            name,
            provider.api_key.clone(),
            provider.model.clone(),
            base_url,
            provider.max_tokens,
            timeout,
        )),
        ProviderKind::Openai => Arc::new(OpenAiAdapter::new(
            name,
            provider.api_key.clone(),
            provider.model.clone(),
            base_url,
            provider.max_tokens,
            timeout,
        )),
        ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatAdapter::new(
            name,
            provider.api_key.clone(),
            provider.model.clone(),
            base_url,
            provider.max_tokens,
            timeout,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SwitchboardConfig {
        toml::from_str(
            r#"
            [breaker]
            failure_threshold = 3

            [[providers]]
            kind = "anthropic"
            priority = 100
            model = "claude-sonnet-4-5"
            api_key = "key-a"

            [[providers]]
            kind = "openai_compat"
            name = "groq"
            priority = 50
            model = "llama3-70b-8192"
            api_key = "key-b"
            base_url = "https://api.groq.com/openai"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_router_registers_all_providers() {
        let router = build_router(&sample_config()).unwrap();
        assert_eq!(router.provider_count(), 2);
        assert_eq!(router.provider_names(), vec!["anthropic", "groq"]);
    }

    #[test]
    fn test_build_adapter_uses_kind_defaults() {
        let config = sample_config();
        let adapter = build_adapter(&config.providers[0], Duration::from_secs(30)).unwrap();
        assert_eq!(adapter.name(), "anthropic");
        assert_eq!(adapter.model(), "claude-sonnet-4-5");
    }

    #[test]
    fn test_default_config_template_is_valid() {
        let raw = include_str!("../../../config/default.toml");
        let config: SwitchboardConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
    }
}
