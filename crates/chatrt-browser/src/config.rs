//! Browser-automation adapter configuration.
//!
//! Grounded on `conductor/core/src/backend/ollama.rs`'s `from_env`
//! legacy-prefixed environment resolution, adapted to the knobs a
//! WebDriver-backed session needs instead of an HTTP base URL.

use std::collections::HashMap;
use std::path::PathBuf;

use chatrt_behavior::ResponseProfile;

use crate::selectors::Selectors;

/// Login credentials for the automated session.
#[derive(Clone, Debug)]
pub struct BrowserCredentials {
    /// The identifier entered into the login form (email, phone, handle).
    pub username: String,
    /// The login form's password.
    pub password: String,
}

impl BrowserCredentials {
    /// Construct a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Configuration for the browser-automation adapter.
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    /// Login credentials.
    pub credentials: BrowserCredentials,
    /// The chat web app's URL; navigated to on connect.
    pub target_url: String,
    /// Directory for the browser's persistent profile (cookies, local
    /// storage) so re-authentication isn't required on every connect.
    pub user_data_dir: PathBuf,
    /// The WebDriver endpoint to connect to (a running chromedriver/
    /// geckodriver instance). Defaults to `http://localhost:9515`.
    pub webdriver_url: String,
    /// Run the browser headless. Defaults to `true`.
    pub headless: bool,
    /// An optional upstream proxy for the browser instance.
    pub proxy: Option<String>,
    /// How long to wait for a single element lookup before failing.
    /// Defaults to 10 seconds.
    pub element_timeout_ms: u64,
    /// How often to poll the open conversation's DOM for new messages.
    /// Defaults to 3 seconds.
    pub message_polling_interval_ms: u64,
    /// A human-response profile driving simulated read/think/type delays
    /// before outbound sends. `None` disables timing simulation (sends
    /// happen as fast as the WebDriver round-trip allows).
    pub session_profile: Option<ResponseProfile>,
    /// Which browser family this profile targets (`"chrome"` or
    /// `"firefox"`), selecting the capability dialect used to request
    /// headless mode/proxy/profile directory. Defaults to `"chrome"`.
    pub browser_profile: String,
    /// Per-deployment CSS selector overrides, keyed by [`Selectors`] field
    /// name.
    pub selector_overrides: HashMap<String, String>,
}

impl BrowserConfig {
    /// Construct a configuration with every optional field defaulted.
    #[must_use]
    pub fn new(credentials: BrowserCredentials, target_url: impl Into<String>, user_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            target_url: target_url.into(),
            user_data_dir: user_data_dir.into(),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            proxy: None,
            element_timeout_ms: 10_000,
            message_polling_interval_ms: 3_000,
            session_profile: None,
            browser_profile: "chrome".to_string(),
            selector_overrides: HashMap::new(),
        }
    }

    /// Override the WebDriver endpoint.
    #[must_use]
    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = url.into();
        self
    }

    /// Override headlessness.
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set an upstream proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Override the element-lookup timeout, in milliseconds.
    #[must_use]
    pub fn with_element_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.element_timeout_ms = timeout_ms;
        self
    }

    /// Override the DOM message-polling interval, in milliseconds.
    #[must_use]
    pub fn with_message_polling_interval_ms(mut self, interval_ms: u64) -> Self {
        self.message_polling_interval_ms = interval_ms;
        self
    }

    /// Attach a human-response profile for send timing simulation.
    #[must_use]
    pub fn with_session_profile(mut self, profile: ResponseProfile) -> Self {
        self.session_profile = Some(profile);
        self
    }

    /// Override the browser family (`"chrome"` or `"firefox"`).
    #[must_use]
    pub fn with_browser_profile(mut self, profile: impl Into<String>) -> Self {
        self.browser_profile = profile.into();
        self
    }

    /// Attach named selector overrides.
    #[must_use]
    pub fn with_selector_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.selector_overrides = overrides;
        self
    }

    /// Resolve the effective selector table.
    #[must_use]
    pub fn selectors(&self) -> Selectors {
        Selectors::with_overrides(&self.selector_overrides)
    }

    /// Resolve the WebDriver endpoint and headlessness from environment,
    /// falling back to the unprefixed legacy name the same way
    /// `BackendConfig::ollama_from_env` checks `OLLAMA_HOST` before
    /// `YOLLAYAH_OLLAMA_HOST`.
    #[must_use]
    pub fn from_env(credentials: BrowserCredentials, target_url: impl Into<String>, user_data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(credentials, target_url, user_data_dir);
        if let Ok(url) = std::env::var("CHATRT_BROWSER_WEBDRIVER_URL").or_else(|_| std::env::var("WEBDRIVER_URL")) {
            config.webdriver_url = url;
        }
        if let Ok(value) = std::env::var("CHATRT_BROWSER_HEADLESS") {
            if let Ok(parsed) = value.parse() {
                config.headless = parsed;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> BrowserCredentials {
        BrowserCredentials::new("agent@example.com", "hunter2")
    }

    #[test]
    fn new_defaults_to_headless_chrome_on_localhost_webdriver() {
        let config = BrowserConfig::new(credentials(), "https://chat.example.com", "/tmp/profile");
        assert!(config.headless);
        assert_eq!(config.browser_profile, "chrome");
        assert_eq!(config.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn builder_overrides_apply() {
        let config = BrowserConfig::new(credentials(), "https://chat.example.com", "/tmp/profile")
            .with_headless(false)
            .with_browser_profile("firefox")
            .with_element_timeout_ms(5_000);
        assert!(!config.headless);
        assert_eq!(config.browser_profile, "firefox");
        assert_eq!(config.element_timeout_ms, 5_000);
    }
}
