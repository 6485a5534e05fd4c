//! Command-line surface, grounded on the teacher's `conductor-daemon`
//! binary argument handling (environment-first configuration, falling back
//! to flags and then to compiled-in defaults).

use std::path::PathBuf;

use clap::Parser;

/// Constructs a configured subset of chat-integration adapters, wires a
/// shared health monitor and alert manager across them, and runs until a
/// shutdown signal.
#[derive(Parser, Debug)]
#[command(name = "chatrt-daemon", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file. Sections not present fall back
    /// to each adapter's `from_env` resolution.
    #[arg(long, env = "CHATRT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated platforms to start (`bot_api`, `subprocess`,
    /// `browser`, `mobile`). Defaults to every platform with a config
    /// section present.
    #[arg(long, env = "CHATRT_PLATFORMS", value_delimiter = ',')]
    pub platforms: Option<Vec<String>>,

    /// Base data directory for adapters that persist state (auth stores,
    /// browser profiles) when a section doesn't name its own.
    #[arg(long, env = "CHATRT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log verbosity (`trace`, `debug`, `info`, `warn`, `error`), passed
    /// through to `tracing_subscriber`'s `EnvFilter` as the default
    /// directive. `RUST_LOG` still overrides this when set.
    #[arg(long, env = "CHATRT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
