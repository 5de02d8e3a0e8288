//! Realtime client configuration
//!
//! Everything is an explicit constructor parameter; nothing is read from
//! process-global state. Binaries that want env-driven setup read their own
//! variables and build a `RealtimeConfig` from them.

use std::time::Duration;

/// Configuration for one realtime connection
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Identity this connection authenticates as (user or agent ID)
    pub identity: String,
    /// WebSocket endpoint base, e.g. "wss://rt.tutorlink.io"
    pub endpoint: String,
    /// Opaque auth token, appended as a query parameter when present
    pub auth_token: Option<String>,

    /// Application-level ping cadence
    pub heartbeat_interval: Duration,
    /// First reconnect delay
    pub backoff_base: Duration,
    /// Reconnect delay ceiling
    pub backoff_cap: Duration,
    /// Bound on a single connection attempt
    pub connect_timeout: Duration,
    /// Force a reconnect after this much inbound silence (None = never)
    pub liveness_timeout: Option<Duration>,
    /// Give up after this many consecutive failed attempts (None = retry forever)
    pub max_reconnect_attempts: Option<u32>,

    /// How recent a peer's last_seen_at must be to count as online
    pub presence_freshness: Duration,
    /// How long a typing indicator stays valid without an explicit stop
    pub typing_ttl: Duration,
}

impl RealtimeConfig {
    /// Configuration with production defaults for the given identity and endpoint
    pub fn new(identity: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            endpoint: endpoint.into(),
            auth_token: None,
            heartbeat_interval: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            liveness_timeout: None,
            max_reconnect_attempts: None,
            presence_freshness: Duration::from_secs(300),
            typing_ttl: Duration::from_secs(5),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_presence_freshness(mut self, freshness: Duration) -> Self {
        self.presence_freshness = freshness;
        self
    }

    pub fn with_typing_ttl(mut self, ttl: Duration) -> Self {
        self.typing_ttl = ttl;
        self
    }

    /// Full URL for this identity's channel: `{endpoint}/ws/{identity}`,
    /// plus the token query parameter when one is configured
    pub fn channel_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let mut url = format!("{}/ws/{}", base, self.identity);
        if let Some(token) = &self.auth_token {
            url.push_str("?token=");
            url.push_str(token);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RealtimeConfig::new("student-1", "wss://rt.tutorlink.io");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_cap, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.presence_freshness, Duration::from_secs(300));
        assert_eq!(config.typing_ttl, Duration::from_secs(5));
        assert!(config.liveness_timeout.is_none());
        assert!(config.max_reconnect_attempts.is_none());
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_channel_url_composition() {
        let config = RealtimeConfig::new("student-1", "wss://rt.tutorlink.io");
        assert_eq!(config.channel_url(), "wss://rt.tutorlink.io/ws/student-1");
    }

    #[test]
    fn test_channel_url_tolerates_trailing_slash() {
        let config = RealtimeConfig::new("student-1", "wss://rt.tutorlink.io/");
        assert_eq!(config.channel_url(), "wss://rt.tutorlink.io/ws/student-1");
    }

    #[test]
    fn test_channel_url_appends_token() {
        let config =
            RealtimeConfig::new("student-1", "wss://rt.tutorlink.io").with_auth_token("tok-abc");
        assert_eq!(
            config.channel_url(),
            "wss://rt.tutorlink.io/ws/student-1?token=tok-abc"
        );
    }

    #[test]
    fn test_builder_overrides() {
        let config = RealtimeConfig::new("tutor-2", "ws://localhost:8080")
            .with_heartbeat_interval(Duration::from_secs(10))
            .with_backoff(Duration::from_millis(250), Duration::from_secs(8))
            .with_liveness_timeout(Duration::from_secs(90))
            .with_max_reconnect_attempts(5);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.backoff_base, Duration::from_millis(250));
        assert_eq!(config.backoff_cap, Duration::from_secs(8));
        assert_eq!(config.liveness_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.max_reconnect_attempts, Some(5));
    }
}
