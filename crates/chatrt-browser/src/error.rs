//! Browser-adapter-internal error taxonomy, mapped to
//! [`chatrt_core::AdapterError`] only at the `Adapter` trait boundary.

/// Errors raised by the WebDriver session, login flow, and DOM scraping.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The WebDriver client rejected a command or the connection dropped.
    #[error("webdriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),
    /// The WebDriver client could not be constructed.
    #[error("webdriver session could not be started: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),
    /// A required element did not appear within `element_timeout_ms`.
    #[error("element not found for selector {selector:?} within {timeout_ms}ms")]
    ElementTimeout {
        /// The CSS selector that timed out.
        selector: String,
        /// The timeout budget that was exceeded, in ms.
        timeout_ms: u64,
    },
    /// The login form rejected the supplied credentials, or the post-login
    /// landing state never appeared.
    #[error("login did not complete: {0}")]
    LoginFailed(String),
    /// An attachment could not be staged to a local path for upload (e.g. a
    /// remote `Attachment::Url`, which this adapter has no HTTP client to
    /// fetch).
    #[error("attachment could not be staged for upload: {0}")]
    AttachmentUnsupported(String),
    /// Writing a staged attachment to the profile's scratch directory
    /// failed.
    #[error("failed to stage attachment on disk: {0}")]
    Io(#[from] std::io::Error),
}
