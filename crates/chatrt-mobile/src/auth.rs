//! The external auth-store contract and a file-backed reference
//! implementation.
//!
//! The core session manager imposes no filesystem structure; it only calls
//! through the [`AuthStore`] trait. The reference implementation persists
//! state as a directory of JSON files under a configurable data directory,
//! matching the teacher's `dirs`-crate conventions for locating default data
//! homes (see `conductor/core/src/backend/traits.rs`'s `ollama_from_env`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::MobileError;

/// Persisted session state: credentials and the associated signal-key
/// material. Both are opaque `Value`s — the core never inspects their
/// contents, only round-trips them through the store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthState {
    /// The device/session credentials, if any have been saved yet.
    pub creds: Option<Value>,
    /// Associated key material, if any has been saved yet.
    pub keys: Option<Value>,
}

/// The contract the session manager persists credentials through.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Load whatever state was last persisted, or a default/empty state for
    /// a never-paired session.
    async fn load_state(&self) -> Result<AuthState, MobileError>;

    /// Persist updated credentials. Called on every `creds.update` event.
    async fn save_creds(&self, creds: Value) -> Result<(), MobileError>;

    /// Erase all persisted state (invoked on a permanent disconnect
    /// classification that clears the session).
    async fn clear_state(&self) -> Result<(), MobileError>;

    /// Whether a previous pairing's credentials are on disk.
    async fn has_existing_state(&self) -> bool;
}

/// A directory-of-JSON-files [`AuthStore`].
pub struct FileAuthStore {
    dir: PathBuf,
}

impl FileAuthStore {
    /// Use `dir` as the root for `creds.json`/`keys.json`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The platform data directory's default location for a given phone
    /// number's session (`$XDG_DATA_HOME/chatrt/mobile/<sanitized number>`).
    #[must_use]
    pub fn default_for(phone_number: &str) -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("chatrt")
            .join("mobile")
            .join(sanitize(phone_number));
        Self::new(base)
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join("creds.json")
    }

    fn keys_path(&self) -> PathBuf {
        self.dir.join("keys.json")
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    async fn load_state(&self) -> Result<AuthState, MobileError> {
        let creds = read_json(&self.creds_path()).await?;
        let keys = read_json(&self.keys_path()).await?;
        Ok(AuthState { creds, keys })
    }

    async fn save_creds(&self, creds: Value) -> Result<(), MobileError> {
        fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(&creds).map_err(|err| MobileError::Serialization(err.to_string()))?;
        fs::write(self.creds_path(), bytes).await?;
        Ok(())
    }

    async fn clear_state(&self) -> Result<(), MobileError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn has_existing_state(&self) -> bool {
        fs::metadata(self.creds_path()).await.is_ok()
    }
}

async fn read_json(path: &Path) -> Result<Option<Value>, MobileError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| MobileError::Serialization(err.to_string())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn sanitize(value: &str) -> String {
    value.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_creds_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::new(dir.path());

        assert!(!store.has_existing_state().await);

        store.save_creds(serde_json::json!({"registrationId": 42})).await.unwrap();
        assert!(store.has_existing_state().await);

        let state = store.load_state().await.unwrap();
        assert_eq!(state.creds.unwrap()["registrationId"], 42);
        assert!(state.keys.is_none());
    }

    #[tokio::test]
    async fn clear_state_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::new(dir.path());
        store.save_creds(serde_json::json!({"a": 1})).await.unwrap();

        store.clear_state().await.unwrap();
        assert!(!store.has_existing_state().await);

        let state = store.load_state().await.unwrap();
        assert!(state.creds.is_none());
    }

    #[tokio::test]
    async fn clear_state_on_never_paired_store_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::new(dir.path().join("never-created"));
        store.clear_state().await.unwrap();
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize("+1 (555) 000-0001"), "_1_555__000_0001");
    }
}
