//! Security configuration.

use serde::Deserialize;

/// Security configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret for bearer tokens. The daemon refuses to start with a
    /// weak or default value (see `security::secret`).
    #[serde(default)]
    pub token_secret: String,
}
