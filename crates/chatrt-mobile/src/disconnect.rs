//! Disconnect-reason classification.
//!
//! Grounded on `conductor/core/src/routing/policy.rs`'s keyword/threshold
//! classification style (a pure function over a small closed input mapping
//! to a decision enum).

/// The reason category assigned to a transport close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectCategory {
    /// Credentials were revoked on the device side.
    LoggedOut,
    /// The session's stored keys no longer match the server.
    BadSession,
    /// The account was banned.
    Banned,
    /// The connection was closed but is safe to retry.
    ConnectionClosed,
    /// The connection dropped without a clean close.
    ConnectionLost,
    /// A timeout occurred (including pairing/QR exhaustion).
    TimedOut,
    /// Another device session replaced this one.
    ConnectionReplaced,
    /// The backend requires a restart before reconnecting.
    RestartRequired,
    /// The backend service is temporarily unavailable.
    ServiceUnavailable,
    /// A multi-device protocol mismatch occurred.
    MultideviceMismatch,
    /// No known status code matched.
    Unknown,
}

/// The outcome of classifying a disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisconnectClassification {
    /// The assigned category.
    pub category: DisconnectCategory,
    /// Whether the session manager should schedule a reconnect.
    pub should_reconnect: bool,
    /// Whether the persisted auth state should be cleared.
    pub clear_session: bool,
}

impl DisconnectClassification {
    const fn new(category: DisconnectCategory, should_reconnect: bool, clear_session: bool) -> Self {
        Self {
            category,
            should_reconnect,
            clear_session,
        }
    }
}

/// Classify a transport close by its status code, with a text fallback for
/// the ambiguous 408 case (pairing/QR exhaustion vs. a plain lost
/// connection).
#[must_use]
pub fn classify_disconnect(status_code: Option<i32>, reason: Option<&str>) -> DisconnectClassification {
    use DisconnectCategory::{
        Banned, BadSession, ConnectionClosed, ConnectionLost, ConnectionReplaced, LoggedOut, MultideviceMismatch,
        RestartRequired, ServiceUnavailable, TimedOut, Unknown,
    };

    match status_code {
        Some(401) => DisconnectClassification::new(LoggedOut, false, true),
        Some(500) => DisconnectClassification::new(BadSession, false, true),
        Some(403) => DisconnectClassification::new(Banned, false, true),
        Some(428) => DisconnectClassification::new(ConnectionClosed, true, false),
        Some(408) => {
            if qr_or_pairing_exhausted(reason) {
                DisconnectClassification::new(TimedOut, false, false)
            } else {
                DisconnectClassification::new(ConnectionLost, true, false)
            }
        }
        Some(440) => DisconnectClassification::new(ConnectionReplaced, false, false),
        Some(515) => DisconnectClassification::new(RestartRequired, true, false),
        Some(503) => DisconnectClassification::new(ServiceUnavailable, true, false),
        Some(411) => DisconnectClassification::new(MultideviceMismatch, false, false),
        _ => DisconnectClassification::new(Unknown, true, false),
    }
}

fn qr_or_pairing_exhausted(reason: Option<&str>) -> bool {
    reason
        .map(str::to_lowercase)
        .is_some_and(|text| text.contains("qr") || text.contains("pairing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_out_clears_session_without_reconnect() {
        let c = classify_disconnect(Some(401), None);
        assert_eq!(c.category, DisconnectCategory::LoggedOut);
        assert!(!c.should_reconnect);
        assert!(c.clear_session);
    }

    #[test]
    fn restart_required_reconnects_without_clearing() {
        let c = classify_disconnect(Some(515), None);
        assert_eq!(c.category, DisconnectCategory::RestartRequired);
        assert!(c.should_reconnect);
        assert!(!c.clear_session);
    }

    #[test]
    fn plain_408_is_connection_lost_and_reconnects() {
        let c = classify_disconnect(Some(408), Some("socket reset by peer"));
        assert_eq!(c.category, DisconnectCategory::ConnectionLost);
        assert!(c.should_reconnect);
    }

    #[test]
    fn qr_exhausted_408_is_timed_out_without_reconnect() {
        let c = classify_disconnect(Some(408), Some("QR refresh attempts exhausted"));
        assert_eq!(c.category, DisconnectCategory::TimedOut);
        assert!(!c.should_reconnect);
    }

    #[test]
    fn unknown_status_defaults_to_reconnect() {
        let c = classify_disconnect(Some(999), None);
        assert_eq!(c.category, DisconnectCategory::Unknown);
        assert!(c.should_reconnect);
        assert!(!c.clear_session);
    }

    #[test]
    fn missing_status_code_is_unknown() {
        let c = classify_disconnect(None, None);
        assert_eq!(c.category, DisconnectCategory::Unknown);
    }
}
