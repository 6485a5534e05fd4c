//! Subprocess-RPC adapter configuration.
//!
//! Grounded on `conductor/core/src/backend/traits.rs`'s
//! `BackendConfig::ollama_from_env` legacy-prefixed environment resolution.

use std::path::PathBuf;

/// Configuration for the subprocess-RPC adapter.
#[derive(Clone, Debug)]
pub struct SubprocessConfig {
    /// The phone number this CLI instance is registered under.
    pub phone_number: String,
    /// Path to the CLI binary. Defaults to `signal-cli` on `PATH`.
    pub signal_cli_bin: String,
    /// Data directory passed to the CLI (`--config`). Defaults to the
    /// platform data directory under `chatrt/subprocess`.
    pub data_dir: PathBuf,
    /// Per-request timeout, in ms.
    pub request_timeout_ms: u64,
}

impl SubprocessConfig {
    /// Construct a configuration with every optional field defaulted.
    #[must_use]
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            signal_cli_bin: "signal-cli".to_string(),
            data_dir: default_data_dir(),
            request_timeout_ms: 10_000,
        }
    }

    /// Override the CLI binary path.
    #[must_use]
    pub fn with_signal_cli_bin(mut self, path: impl Into<String>) -> Self {
        self.signal_cli_bin = path.into();
        self
    }

    /// Override the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Resolve from environment: `CHATRT_SIGNAL_PHONE_NUMBER` (required),
    /// `CHATRT_SIGNAL_CLI_BIN`, `CHATRT_SIGNAL_DATA_DIR`,
    /// `CHATRT_SIGNAL_REQUEST_TIMEOUT_MS`, each falling back to the
    /// unprefixed legacy name the same way
    /// `BackendConfig::ollama_from_env` checks `OLLAMA_HOST` before
    /// `YOLLAYAH_OLLAMA_HOST`.
    pub fn from_env(phone_number: impl Into<String>) -> Self {
        let mut config = Self::new(phone_number);
        if let Ok(bin) = std::env::var("CHATRT_SIGNAL_CLI_BIN").or_else(|_| std::env::var("SIGNAL_CLI_BIN")) {
            config.signal_cli_bin = bin;
        }
        if let Ok(dir) = std::env::var("CHATRT_SIGNAL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(timeout) = std::env::var("CHATRT_SIGNAL_REQUEST_TIMEOUT_MS") {
            if let Ok(parsed) = timeout.parse() {
                config.request_timeout_ms = parsed;
            }
        }
        config
    }

    /// The CLI args for `signal-cli --config <dir> -a <number> jsonRpc`.
    #[must_use]
    pub fn cli_args(&self) -> Vec<String> {
        vec![
            "--config".to_string(),
            self.data_dir.to_string_lossy().into_owned(),
            "-a".to_string(),
            self.phone_number.clone(),
            "jsonRpc".to_string(),
        ]
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("chatrt").join("subprocess")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_args_names_phone_number_and_data_dir() {
        let config = SubprocessConfig::new("+15550000001").with_data_dir("/tmp/sig");
        let args = config.cli_args();
        assert!(args.contains(&"+15550000001".to_string()));
        assert!(args.contains(&"/tmp/sig".to_string()));
        assert!(args.contains(&"jsonRpc".to_string()));
    }
}
