//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::accounts::AccountBlock;
use super::security::SecurityConfig;
use super::sites::SiteBlock;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Security configuration (token secret).
    #[serde(default)]
    pub security: SecurityConfig,
    /// Boot-time account directory.
    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountBlock>,
    /// Registered sites (provisioned out-of-band, loaded read-only).
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteBlock>,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would misbehave at runtime rather than at load time.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut account_ids = std::collections::HashSet::new();
        let mut usernames = std::collections::HashSet::new();
        for account in &self.accounts {
            if account.id <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "account id {} is not a positive integer",
                    account.id
                )));
            }
            if !account_ids.insert(account.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate account id {}",
                    account.id
                )));
            }
            if !usernames.insert(account.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate username {:?}",
                    account.username
                )));
            }
        }

        let mut site_ids = std::collections::HashSet::new();
        for site in &self.sites {
            if site.id <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "site id {} is not a positive integer",
                    site.id
                )));
            }
            if !site_ids.insert(site.id) {
                return Err(ConfigError::Invalid(format!("duplicate site id {}", site.id)));
            }
            // Surfaces undecodable keys now instead of failing every request.
            site.to_site()?;
        }
        Ok(())
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hub name (e.g., "hub.rangehub.net").
    pub name: String,
    /// Address the API listens on.
    pub listen: SocketAddr,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [server]
        name = "hub.test"
        listen = "127.0.0.1:0"

        [security]
        token_secret = "an-adequately-long-test-secret"
    "#;

    fn parse(extra: &str) -> Result<(), ConfigError> {
        let config: Config = toml::from_str(&format!("{BASE}\n{extra}")).unwrap();
        config.validate()
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(parse("").is_ok());
    }

    #[test]
    fn duplicate_site_ids_are_rejected() {
        let err = parse(
            r#"
            [[site]]
            id = 7
            public_key = "3pDIUwCRwPV0kCpgunAh8511hcHl1LBkr6VJdYBZSxc="

            [[site]]
            id = 7
            public_key = "3pDIUwCRwPV0kCpgunAh8511hcHl1LBkr6VJdYBZSxc="
            "#,
        );
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn non_positive_site_id_is_rejected() {
        let err = parse(
            r#"
            [[site]]
            id = 0
            public_key = "3pDIUwCRwPV0kCpgunAh8511hcHl1LBkr6VJdYBZSxc="
            "#,
        );
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn undecodable_public_key_is_rejected_at_load() {
        let err = parse(
            r#"
            [[site]]
            id = 7
            public_key = "not base64!"
            "#,
        );
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let err = parse(
            r#"
            [[account]]
            id = 1
            username = "alice"
            email = "a@test"
            password = "$argon2id$fake"

            [[account]]
            id = 2
            username = "alice"
            email = "b@test"
            password = "$argon2id$fake"
            "#,
        );
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }
}
