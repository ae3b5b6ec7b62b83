// ── Runtime connection configuration ──
//
// Describes *how* to reach a hub: endpoint, credential and timing. Never
// touches disk; the CLI builds a `HubConfig` from its profile files and
// hands it in.

use std::time::Duration;

use homeward_api::{Backoff, ClientConfig, ReconnectConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Configuration for one hub connection.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub URL. `http(s)://` is accepted and rewritten to `ws(s)://`.
    pub url: Url,
    /// Long-lived access token.
    pub token: SecretString,
    /// Per-request deadline.
    pub request_timeout: Duration,
    /// Deadline for the challenge/credential exchange.
    pub handshake_timeout: Duration,
    /// Delay before a reconnect attempt (initial delay for exponential backoff).
    pub reconnect_delay: Duration,
    /// Consecutive failed reconnects before giving up.
    pub max_reconnect_attempts: u32,
    pub backoff: Backoff,
}

impl HubConfig {
    /// Config with the default timings: 30s requests, 10s handshake,
    /// 5s fixed reconnect delay, 10 attempts.
    pub fn new(url: Url, token: SecretString) -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            url,
            token,
            request_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            reconnect_delay: reconnect.delay,
            max_reconnect_attempts: reconnect.max_attempts,
            backoff: reconnect.backoff,
        }
    }

    /// Translate into the connection core's config.
    pub fn to_client_config(&self) -> Result<ClientConfig, CoreError> {
        if self.request_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "request timeout must be greater than zero".into(),
            });
        }

        let config = ClientConfig::new(self.url.as_str(), self.token.clone())?
            .with_request_timeout(self.request_timeout)
            .with_handshake_timeout(self.handshake_timeout)
            .with_reconnect(ReconnectConfig {
                delay: self.reconnect_delay,
                max_attempts: self.max_reconnect_attempts,
                backoff: self.backoff.clone(),
            });
        Ok(config)
    }
}
