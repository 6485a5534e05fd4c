//! Mobile-protocol adapter configuration.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s
//! `BackendConfig::ollama_from_env` legacy-prefixed environment resolution.

use std::path::PathBuf;

use crate::session::SessionManagerConfig;

/// Configuration for the mobile-protocol adapter.
#[derive(Clone, Debug)]
pub struct MobileConfig {
    /// The phone number this session is paired under.
    pub phone_number: String,
    /// Data directory for the file-backed auth store. Defaults to the
    /// platform data directory under `chatrt/mobile/<sanitized number>`.
    pub data_dir: Option<PathBuf>,
    /// Mark the account online as soon as the socket opens.
    pub mark_online_on_connect: bool,
    /// Session manager tunables (reconnect attempts, backoff, QR timeout).
    pub session: SessionManagerConfig,
}

impl MobileConfig {
    /// Construct a configuration with every optional field defaulted.
    #[must_use]
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            data_dir: None,
            mark_online_on_connect: false,
            session: SessionManagerConfig::default(),
        }
    }

    /// Override the auth-store data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Override the session manager's reconnect/backoff/QR tunables.
    #[must_use]
    pub fn with_session_config(mut self, session: SessionManagerConfig) -> Self {
        self.session = session;
        self
    }

    /// Mark the account online as soon as the socket opens.
    #[must_use]
    pub fn with_mark_online_on_connect(mut self, mark_online: bool) -> Self {
        self.mark_online_on_connect = mark_online;
        self
    }

    /// Resolve the phone number and reconnect tunables from environment,
    /// falling back to the unprefixed legacy name the same way
    /// `BackendConfig::ollama_from_env` checks `OLLAMA_HOST` before
    /// `YOLLAYAH_OLLAMA_HOST`.
    pub fn from_env(phone_number: impl Into<String>) -> Self {
        let mut config = Self::new(phone_number);
        if let Ok(dir) = std::env::var("CHATRT_MOBILE_DATA_DIR").or_else(|_| std::env::var("MOBILE_DATA_DIR")) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(value) = std::env::var("CHATRT_MOBILE_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(parsed) = value.parse() {
                config.session.max_reconnect_attempts = parsed;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_reconnect_enabled() {
        let config = MobileConfig::new("+15550000001");
        assert!(config.session.max_reconnect_attempts > 0);
        assert!(config.data_dir.is_none());
    }
}
