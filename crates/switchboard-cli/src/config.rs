use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub breaker: BreakerSection,
    #[serde(default)]
    pub validator: ValidatorSection,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    30
}
fn default_request_deadline_secs() -> u64 {
    120
}

impl RouterSection {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_cooldown_secs() -> u64 {
    60
}

impl BreakerSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Extensions to the built-in validation token sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorSection {
    #[serde(default)]
    pub extra_code_signals: Vec<String>,
    #[serde(default)]
    pub extra_error_markers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Openai,
    OpenaiCompat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::OpenaiCompat => "openai_compat",
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::Openai => Some("https://api.openai.com"),
            Self::OpenaiCompat => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Routing name; defaults to the kind name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: i32,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub api_key: String,
    /// Required for openai_compat, optional otherwise
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("name", &self.effective_name())
            .field("priority", &self.priority)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_max_tokens() -> u32 {
    4096
}

impl ProviderConfig {
    pub fn effective_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }

    pub fn effective_base_url(&self) -> Result<String> {
        self.base_url
            .clone()
            .or_else(|| self.kind.default_base_url().map(|u| u.to_string()))
            .with_context(|| {
                format!(
                    "Provider {} requires an explicit base_url",
                    self.effective_name()
                )
            })
    }
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

impl SwitchboardConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // Refuse configs other users can read; they may carry keys
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `switchboard init` first.",
                path.display()
            )
        })?;

        // Expand environment variables before parsing
        let expanded = expand_env_vars(&content);

        let config: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        config.validate()?;

        for provider in &config.providers {
            if provider.api_key.starts_with("sk-") || provider.api_key.starts_with("gsk_") {
                warn!(
                    "API key for provider {} is hardcoded in config file. For security, use environment variables: api_key = \"${{ANTHROPIC_API_KEY}}\"",
                    provider.effective_name()
                );
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("Config must declare at least one [[providers]] entry");
        }
        if self.breaker.failure_threshold == 0 {
            anyhow::bail!("breaker.failure_threshold must be at least 1");
        }

        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            let name = provider.effective_name();
            if !seen.insert(name.clone()) {
                anyhow::bail!("Duplicate provider name {:?} in config", name);
            }
            let base_url = provider.effective_base_url()?;
            url::Url::parse(&base_url)
                .with_context(|| format!("Provider {} has an invalid base_url", name))?;
        }
        Ok(())
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "TOGETHER_API_KEY",
    "CUSTOM_LLM_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = result[abs_start + 2..abs_start + end].to_string();

                // Only expand variables in the allowlist
                let value = if ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
                    std::env::var(&var_name).unwrap_or_default()
                } else {
                    warn!(
                        "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                        var_name
                    );
                    // Leave the ${VAR} unexpanded so it's obvious
                    pos = abs_start + end + 1;
                    continue;
                };

                let value_len = value.len();
                result = format!(
                    "{}{}{}",
                    &result[..abs_start],
                    value,
                    &result[abs_start + end + 1..]
                );
                pos = abs_start + value_len; // Skip past the expanded value
            } else {
                break;
            }
        } else {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [[providers]]
            kind = "anthropic"
            model = "claude-sonnet-4-5"
            api_key = "key"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.router.call_timeout_secs, 30);
        assert_eq!(config.router.request_deadline_secs, 120);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown_secs, 60);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].effective_name(), "anthropic");
        assert_eq!(config.providers[0].max_tokens, 4096);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config_parses() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [router]
            call_timeout_secs = 10
            request_deadline_secs = 45

            [breaker]
            failure_threshold = 3
            cooldown_secs = 30

            [validator]
            extra_code_signals = ["SELECT "]
            extra_error_markers = ["quota exceeded"]

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
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.router.call_timeout(), Duration::from_secs(10));
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(30));
        assert_eq!(config.validator.extra_code_signals, vec!["SELECT "]);
        assert_eq!(config.providers[1].effective_name(), "groq");
        assert_eq!(
            config.providers[1].effective_base_url().unwrap(),
            "https://api.groq.com/openai"
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_compat_without_base_url_is_rejected() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [[providers]]
            kind = "openai_compat"
            name = "local"
            model = "llama3"
            api_key = "key"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [[providers]]
            kind = "anthropic"
            model = "m1"
            api_key = "a"

            [[providers]]
            kind = "anthropic"
            model = "m2"
            api_key = "b"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [breaker]
            failure_threshold = 0

            [[providers]]
            kind = "openai"
            model = "gpt-4o"
            api_key = "key"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-ant-abcdef123456"), "sk-...3456");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config: SwitchboardConfig = toml::from_str(
            r#"
            [[providers]]
            kind = "anthropic"
            model = "claude-sonnet-4-5"
            api_key = "sk-ant-supersecret99"
            "#,
        )
        .unwrap();
        let debug = format!("{:?}", config.providers[0]);
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_env_expansion_outside_allowlist_is_left_alone() {
        let expanded = expand_env_vars("api_key = \"${TOTALLY_UNKNOWN_VAR}\"");
        assert_eq!(expanded, "api_key = \"${TOTALLY_UNKNOWN_VAR}\"");
    }

    #[test]
    fn test_env_expansion_of_allowlisted_var() {
        // HOME is allowlisted and set in any sane test environment
        let home = std::env::var("HOME").unwrap_or_default();
        let expanded = expand_env_vars("dir = \"${HOME}\"");
        assert_eq!(expanded, format!("dir = \"{}\"", home));
    }
}
