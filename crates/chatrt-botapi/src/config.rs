//! Bot-API adapter configuration.
//!
//! Grounded on `conductor/core/src/backend/ollama.rs`'s `from_env`
//! legacy-prefixed environment resolution.

/// Configuration for the bot-API adapter.
#[derive(Clone, Debug)]
pub struct BotApiConfig {
    /// The bot token issued by the platform.
    pub token: String,
    /// Override for the API root, for self-hosted Bot API servers.
    pub api_root: Option<String>,
    /// Receive updates via webhook instead of long polling.
    pub use_webhook: bool,
    /// Public domain the webhook is registered against. Required when
    /// `use_webhook` is set.
    pub webhook_domain: Option<String>,
    /// Local port the webhook listener binds to. Required when
    /// `use_webhook` is set.
    pub webhook_port: Option<u16>,
    /// Secret token the platform must echo back on every webhook request,
    /// rejecting any request that doesn't carry it.
    pub webhook_secret_token: Option<String>,
    /// Restrict the update types requested (`message`, `edited_message`,
    /// `callback_query`, ...). `None` requests the library default set.
    pub allowed_updates: Option<Vec<String>>,
}

impl BotApiConfig {
    /// Construct a configuration with every optional field defaulted to
    /// long-polling with no restrictions.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_root: None,
            use_webhook: false,
            webhook_domain: None,
            webhook_port: None,
            webhook_secret_token: None,
            allowed_updates: None,
        }
    }

    /// Override the API root.
    #[must_use]
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = Some(api_root.into());
        self
    }

    /// Switch to webhook mode, binding `port` and advertising `domain`.
    #[must_use]
    pub fn with_webhook(mut self, domain: impl Into<String>, port: u16) -> Self {
        self.use_webhook = true;
        self.webhook_domain = Some(domain.into());
        self.webhook_port = Some(port);
        self
    }

    /// Require the platform to echo this secret token on webhook requests.
    #[must_use]
    pub fn with_webhook_secret_token(mut self, token: impl Into<String>) -> Self {
        self.webhook_secret_token = Some(token.into());
        self
    }

    /// Restrict the update types requested from the platform.
    #[must_use]
    pub fn with_allowed_updates(mut self, updates: Vec<String>) -> Self {
        self.allowed_updates = Some(updates);
        self
    }

    /// Resolve from environment: `CHATRT_TELEGRAM_TOKEN` (required),
    /// `CHATRT_TELEGRAM_API_ROOT`, `CHATRT_TELEGRAM_USE_WEBHOOK`,
    /// `CHATRT_TELEGRAM_WEBHOOK_DOMAIN`, `CHATRT_TELEGRAM_WEBHOOK_PORT`,
    /// each falling back to the unprefixed legacy name the same way
    /// `OllamaBackend::from_env` checks `OLLAMA_HOST` before
    /// `YOLLAYAH_OLLAMA_HOST`.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("CHATRT_TELEGRAM_TOKEN").or_else(|_| std::env::var("TELEGRAM_BOT_TOKEN")).ok()?;
        let mut config = Self::new(token);
        if let Ok(root) = std::env::var("CHATRT_TELEGRAM_API_ROOT") {
            config.api_root = Some(root);
        }
        let use_webhook = std::env::var("CHATRT_TELEGRAM_USE_WEBHOOK")
            .or_else(|_| std::env::var("TELEGRAM_USE_WEBHOOK"))
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if use_webhook {
            let domain = std::env::var("CHATRT_TELEGRAM_WEBHOOK_DOMAIN").ok();
            let port = std::env::var("CHATRT_TELEGRAM_WEBHOOK_PORT").ok().and_then(|v| v.parse().ok());
            if let (Some(domain), Some(port)) = (domain, port) {
                config = config.with_webhook(domain, port);
            }
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_long_polling() {
        let config = BotApiConfig::new("token-123");
        assert!(!config.use_webhook);
        assert!(config.webhook_domain.is_none());
    }

    #[test]
    fn with_webhook_sets_domain_and_port() {
        let config = BotApiConfig::new("token-123").with_webhook("example.com", 8443);
        assert!(config.use_webhook);
        assert_eq!(config.webhook_port, Some(8443));
    }
}
