use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Process-wide settings. Read once at startup and shared read-only.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub chat: ChatConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound for request bodies; video uploads are large.
    pub max_body_bytes: usize,
    /// Only used for the startup banner; the client picks the model per request.
    pub default_model: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_body_bytes: 100 * 1024 * 1024,
            default_model: "gpt-4o-mini".into(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            connect_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_prompt_chars: usize,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Continuation calls allowed after the first one within a single request.
    pub max_continuations: u32,
    pub call_timeout_secs: u64,
    pub total_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 32_000,
            max_tokens: Some(4000),
            temperature: Some(0.7),
            max_continuations: 8,
            call_timeout_secs: 120,
            total_timeout_secs: 600,
        }
    }
}

impl ChatConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 30,
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists, then applies environment overrides.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut cfg = match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Environment wins over the file. Unparseable numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("API_KEY").filter(|v| !v.is_empty()) {
            self.upstream.api_key = Some(v);
        }
        if let Some(v) = lookup("BASE_URL").filter(|v| !v.is_empty()) {
            self.upstream.base_url = v;
        }
        if let Some(v) = lookup("DEFAULT_MODEL").filter(|v| !v.is_empty()) {
            self.server.default_model = v;
        }
        if let Some(v) = parse_env(&lookup, "PORT") {
            self.server.port = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_PROMPT_CHARS") {
            self.chat.max_prompt_chars = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_CONTINUATIONS") {
            self.chat.max_continuations = v;
        }
        if let Some(v) = parse_env(&lookup, "RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = v;
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.upstream.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.chat.max_tokens, Some(4000));
        assert_eq!(cfg.rate_limit.max_requests, 30);
        assert_eq!(cfg.rate_limit.window_secs, 60);
        assert_eq!(cfg.server.max_body_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [upstream]
            base_url = "https://api.lambda.ai/v1"

            [chat]
            max_continuations = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.upstream.base_url, "https://api.lambda.ai/v1");
        assert_eq!(cfg.chat.max_continuations, 2);
        assert_eq!(cfg.chat.call_timeout_secs, 120);
        assert!(cfg.upstream.api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("API_KEY", "sk-env"),
            ("PORT", "8081"),
            ("MAX_CONTINUATIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.upstream.api_key.as_deref(), Some("sk-env"));
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.chat.max_continuations, 8);
    }

    #[test]
    fn debug_output_hides_key() {
        let cfg = UpstreamConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("redacted"));
    }
}
