//! HTTP surface configuration

use serde::Deserialize;

/// Configuration for the trigger and webhook endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server
    ///
    /// Common values:
    /// - `[::]:8025` (IPv6 any address)
    /// - `127.0.0.1:8025` (localhost only)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Shared secret expected as `Authorization: Bearer <token>` on the
    /// trigger endpoint.
    pub trigger_token: String,

    /// Webhook signing secret (`whsec_…`).
    ///
    /// When set, every webhook request must carry a valid provider
    /// signature. When unset, verification is skipped — but only outside
    /// production; a production deployment without a secret rejects all
    /// webhook traffic rather than accepting it unverified.
    #[serde(default)]
    pub webhook_signing_secret: Option<String>,

    /// Whether this deployment is production.
    #[serde(default)]
    pub production: bool,
}

fn default_listen_address() -> String {
    "[::]:8025".to_string()
}

impl ServerConfig {
    /// A config suitable for tests: localhost, fixed token, no signature.
    #[must_use]
    pub fn for_tests(trigger_token: &str) -> Self {
        Self {
            listen_address: "127.0.0.1:0".to_string(),
            trigger_token: trigger_token.to_string(),
            webhook_signing_secret: None,
            production: false,
        }
    }
}
