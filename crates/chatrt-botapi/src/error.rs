//! Error taxonomy for the bot-API adapter.

use thiserror::Error;

/// Errors raised constructing or running the bot-API update listener.
#[derive(Debug, Error)]
pub enum BotApiError {
    /// The client library rejected a request (bad token, network failure,
    /// rate limit, ...).
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),

    /// Starting the webhook listener failed (bind, TLS, or URL
    /// configuration error).
    #[error("webhook setup failed: {0}")]
    Webhook(String),

    /// `use_webhook` was set without the domain/port the listener needs to
    /// bind and advertise.
    #[error("webhook mode requires webhook_domain and webhook_port")]
    WebhookConfigIncomplete,
}
