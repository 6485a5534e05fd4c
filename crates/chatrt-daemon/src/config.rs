//! TOML configuration layer.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s env-first config
//! resolution, extended here with a file layer the teacher's binary didn't
//! need: every section is optional, and a present field always wins over
//! the adapter crate's own `from_env` fallback rather than the reverse, so
//! a operator can pin most settings in the file and leave secrets (tokens,
//! passwords) in the environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use chatrt_behavior::ResponseProfile;
use chatrt_botapi::config::BotApiConfig;
use chatrt_browser::config::{BrowserConfig, BrowserCredentials};
use chatrt_health::{AlertRule, AlertSeverity, CollectorConfig, Condition, MetricKey, Op};
use chatrt_rpc::config::SubprocessConfig;
use chatrt_types::Platform;

/// Top-level daemon configuration, deserialized from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct DaemonConfig {
    /// Bot-API adapter section. Absent means the platform isn't started
    /// unless `--platforms` names it and `CHATRT_TELEGRAM_TOKEN`/
    /// `TELEGRAM_BOT_TOKEN` is set.
    #[serde(default)]
    pub bot_api: Option<BotApiSection>,
    /// Subprocess-RPC adapter section.
    #[serde(default)]
    pub subprocess: Option<SubprocessSection>,
    /// Browser-automation adapter section.
    #[serde(default)]
    pub browser: Option<BrowserSection>,
    /// Health monitor and alert rule configuration.
    #[serde(default)]
    pub health: HealthSection,
}

impl DaemonConfig {
    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {path:?}"))
    }

    /// The platforms this config has a section for, in a stable order.
    #[must_use]
    pub fn configured_platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.bot_api.is_some() {
            platforms.push(Platform::BotApi);
        }
        if self.subprocess.is_some() {
            platforms.push(Platform::Subprocess);
        }
        if self.browser.is_some() {
            platforms.push(Platform::Browser);
        }
        platforms
    }
}

/// `[bot_api]` section mirroring [`BotApiConfig`]'s fields.
#[derive(Debug, Default, Deserialize)]
pub struct BotApiSection {
    /// Bot token. Falls back to `CHATRT_TELEGRAM_TOKEN`/`TELEGRAM_BOT_TOKEN`
    /// when absent.
    pub token: Option<String>,
    /// Override for the API root.
    pub api_root: Option<String>,
    /// Receive updates via webhook instead of long polling.
    #[serde(default)]
    pub use_webhook: bool,
    /// Public webhook domain.
    pub webhook_domain: Option<String>,
    /// Local webhook port.
    pub webhook_port: Option<u16>,
    /// Webhook secret token.
    pub webhook_secret_token: Option<String>,
    /// Restricted update types.
    pub allowed_updates: Option<Vec<String>>,
}

impl BotApiSection {
    fn into_config(self) -> Result<BotApiConfig> {
        let mut config = match self.token {
            Some(token) => BotApiConfig::new(token),
            None => BotApiConfig::from_env().context("no [bot_api] token in config and no CHATRT_TELEGRAM_TOKEN/TELEGRAM_BOT_TOKEN in environment")?,
        };
        if let Some(root) = self.api_root {
            config = config.with_api_root(root);
        }
        if self.use_webhook {
            let domain = self.webhook_domain.context("[bot_api] use_webhook is set but webhook_domain is missing")?;
            let port = self.webhook_port.context("[bot_api] use_webhook is set but webhook_port is missing")?;
            config = config.with_webhook(domain, port);
            if let Some(secret) = self.webhook_secret_token {
                config = config.with_webhook_secret_token(secret);
            }
        }
        if let Some(allowed) = self.allowed_updates {
            config = config.with_allowed_updates(allowed);
        }
        Ok(config)
    }
}

/// `[subprocess]` section mirroring [`SubprocessConfig`]'s fields.
#[derive(Debug, Default, Deserialize)]
pub struct SubprocessSection {
    /// The phone number this CLI instance is registered under.
    pub phone_number: Option<String>,
    /// Path to the CLI binary.
    pub signal_cli_bin: Option<String>,
    /// Data directory passed to the CLI.
    pub data_dir: Option<PathBuf>,
    /// Per-request timeout, in ms.
    pub request_timeout_ms: Option<u64>,
}

impl SubprocessSection {
    fn into_config(self, default_data_dir: Option<&Path>) -> Result<SubprocessConfig> {
        let phone_number = self
            .phone_number
            .context("[subprocess] section is missing phone_number")?;
        let mut config = SubprocessConfig::new(phone_number);
        if let Some(bin) = self.signal_cli_bin {
            config = config.with_signal_cli_bin(bin);
        }
        if let Some(dir) = self.data_dir.or_else(|| default_data_dir.map(|d| d.join("subprocess"))) {
            config = config.with_data_dir(dir);
        }
        if let Some(timeout) = self.request_timeout_ms {
            config = config.with_request_timeout_ms(timeout);
        }
        Ok(config)
    }
}

/// `[browser]` section mirroring [`BrowserConfig`]'s fields, plus an
/// optional `[browser.persona]` sub-table driving simulated response
/// timing.
#[derive(Debug, Default, Deserialize)]
pub struct BrowserSection {
    /// Login username/handle/email.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// The chat web app's URL.
    pub target_url: Option<String>,
    /// Directory for the browser's persistent profile.
    pub user_data_dir: Option<PathBuf>,
    /// WebDriver endpoint.
    pub webdriver_url: Option<String>,
    /// Run headless.
    pub headless: Option<bool>,
    /// Upstream proxy.
    pub proxy: Option<String>,
    /// Element lookup timeout, in ms.
    pub element_timeout_ms: Option<u64>,
    /// DOM polling interval, in ms.
    pub message_polling_interval_ms: Option<u64>,
    /// Browser family (`chrome`/`firefox`).
    pub browser_profile: Option<String>,
    /// Selector overrides.
    #[serde(default)]
    pub selector_overrides: HashMap<String, String>,
    /// Simulated human-response persona.
    pub persona: Option<PersonaSection>,
}

impl BrowserSection {
    fn into_config(self, default_data_dir: Option<&Path>) -> Result<BrowserConfig> {
        let username = self.username.context("[browser] section is missing username")?;
        let password = self.password.context("[browser] section is missing password")?;
        let target_url = self.target_url.context("[browser] section is missing target_url")?;
        let user_data_dir = self
            .user_data_dir
            .or_else(|| default_data_dir.map(|d| d.join("browser")))
            .context("[browser] section is missing user_data_dir and no --data-dir was given")?;

        let mut config = BrowserConfig::new(BrowserCredentials::new(username, password), target_url, user_data_dir);
        if let Some(url) = self.webdriver_url {
            config = config.with_webdriver_url(url);
        }
        if let Some(headless) = self.headless {
            config = config.with_headless(headless);
        }
        if let Some(proxy) = self.proxy {
            config = config.with_proxy(proxy);
        }
        if let Some(timeout) = self.element_timeout_ms {
            config = config.with_element_timeout_ms(timeout);
        }
        if let Some(interval) = self.message_polling_interval_ms {
            config = config.with_message_polling_interval_ms(interval);
        }
        if let Some(profile) = self.browser_profile {
            config = config.with_browser_profile(profile);
        }
        if !self.selector_overrides.is_empty() {
            config = config.with_selector_overrides(self.selector_overrides);
        }
        if let Some(persona) = self.persona {
            config = config.with_session_profile(persona.into_profile());
        }
        Ok(config)
    }
}

/// `[browser.persona]` sub-table: the four clamped `[0,1]` knobs behind
/// [`ResponseProfile`].
#[derive(Debug, Deserialize)]
pub struct PersonaSection {
    #[serde(default = "default_knob")]
    reading_speed: f64,
    #[serde(default = "default_knob")]
    deliberation: f64,
    #[serde(default = "default_knob")]
    activity_level: f64,
    #[serde(default = "default_knob")]
    idle_tendency: f64,
}

fn default_knob() -> f64 {
    0.5
}

impl PersonaSection {
    fn into_profile(self) -> ResponseProfile {
        ResponseProfile::new(self.reading_speed, self.deliberation, self.activity_level, self.idle_tendency)
    }
}

/// `[health]` section: collector tunables plus a list of alert rules.
#[derive(Debug, Deserialize)]
pub struct HealthSection {
    /// Sliding window width, in ms.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Hard cap on retained samples.
    #[serde(default = "default_max_window_size")]
    pub max_window_size: usize,
    /// How long since the last success before a platform is `disconnected`.
    #[serde(default = "default_disconnect_threshold_ms")]
    pub disconnect_threshold_ms: u64,
    /// Alert rules to register with the [`chatrt_health::AlertManager`].
    #[serde(default)]
    pub rules: Vec<AlertRuleSection>,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_window_size: default_max_window_size(),
            disconnect_threshold_ms: default_disconnect_threshold_ms(),
            rules: Vec::new(),
        }
    }
}

fn default_window_ms() -> u64 {
    5 * 60 * 1000
}

fn default_max_window_size() -> usize {
    10_000
}

fn default_disconnect_threshold_ms() -> u64 {
    2 * 60 * 1000
}

impl HealthSection {
    /// Build the [`CollectorConfig`] this section describes.
    #[must_use]
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            window_ms: self.window_ms,
            max_window_size: self.max_window_size,
            disconnect_threshold_ms: self.disconnect_threshold_ms,
        }
    }

    /// Build the configured [`AlertRule`]s, failing on an unrecognised
    /// metric/platform/op name.
    pub fn alert_rules(&self) -> Result<Vec<AlertRule>> {
        self.rules.iter().map(AlertRuleSection::into_rule).collect()
    }
}

/// A single `[[health.rules]]` table.
#[derive(Debug, Deserialize)]
pub struct AlertRuleSection {
    id: String,
    name: String,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(default)]
    platforms: Vec<String>,
    conditions: Vec<ConditionSection>,
    #[serde(default)]
    resolve_conditions: Vec<ConditionSection>,
    #[serde(default)]
    cooldown_ms: u64,
}

fn default_severity() -> String {
    "warning".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConditionSection {
    metric: String,
    op: String,
    threshold: f64,
}

impl ConditionSection {
    fn into_condition(&self) -> Result<Condition> {
        let metric = match self.metric.as_str() {
            "connected" => MetricKey::Connected,
            "avg_latency_ms" => MetricKey::AvgLatencyMs,
            "p99_latency_ms" => MetricKey::P99LatencyMs,
            "success_rate" => MetricKey::SuccessRate,
            "error_rate" => MetricKey::ErrorRate,
            "captcha_encountered" => MetricKey::CaptchaEncountered,
            "rate_limited" => MetricKey::RateLimited,
            "suspected_detection" => MetricKey::SuspectedDetection,
            "sample_count" => MetricKey::SampleCount,
            other => anyhow::bail!("unrecognised alert metric {other:?}"),
        };
        let op = match self.op.as_str() {
            "gt" => Op::Gt,
            "gte" => Op::Gte,
            "lt" => Op::Lt,
            "lte" => Op::Lte,
            "eq" => Op::Eq,
            other => anyhow::bail!("unrecognised alert comparator {other:?}"),
        };
        Ok(Condition { metric, op, threshold: self.threshold })
    }
}

impl AlertRuleSection {
    fn into_rule(&self) -> Result<AlertRule> {
        let severity = match self.severity.as_str() {
            "info" => AlertSeverity::Info,
            "warning" => AlertSeverity::Warning,
            "critical" => AlertSeverity::Critical,
            other => anyhow::bail!("unrecognised alert severity {other:?} for rule {}", self.id),
        };
        let platforms = self
            .platforms
            .iter()
            .map(|p| parse_platform(p))
            .collect::<Result<Vec<_>>>()?;
        let conditions = self.conditions.iter().map(ConditionSection::into_condition).collect::<Result<Vec<_>>>()?;
        let resolve_conditions = self
            .resolve_conditions
            .iter()
            .map(ConditionSection::into_condition)
            .collect::<Result<Vec<_>>>()?;
        Ok(AlertRule {
            id: self.id.clone(),
            name: self.name.clone(),
            severity,
            platforms,
            conditions,
            resolve_conditions,
            cooldown_ms: self.cooldown_ms,
        })
    }
}

/// Parse a platform name as it appears in `--platforms` or a `[[health.rules]]`
/// table's `platforms` list.
pub fn parse_platform(name: &str) -> Result<Platform> {
    match name {
        "bot_api" | "bot-api" | "telegram" => Ok(Platform::BotApi),
        "mobile" => Ok(Platform::Mobile),
        "subprocess" | "signal" => Ok(Platform::Subprocess),
        "browser" => Ok(Platform::Browser),
        other => anyhow::bail!("unrecognised platform {other:?}"),
    }
}

/// Resolve a bot-API adapter configuration from its section.
pub fn resolve_bot_api(section: BotApiSection) -> Result<BotApiConfig> {
    section.into_config()
}

/// Resolve a subprocess adapter configuration from its section.
pub fn resolve_subprocess(section: SubprocessSection, default_data_dir: Option<&Path>) -> Result<SubprocessConfig> {
    section.into_config(default_data_dir)
}

/// Resolve a browser adapter configuration from its section.
pub fn resolve_browser(section: BrowserSection, default_data_dir: Option<&Path>) -> Result<BrowserConfig> {
    section.into_config(default_data_dir)
}
