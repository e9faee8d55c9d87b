//! Test hub management.
//!
//! Spawns the daemon in-process on an ephemeral port, with a fixed set of
//! test accounts and caller-supplied site blocks. Config still goes through
//! a real TOML file so the loader and its validation run on every test.

use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rangehub_trust::{canonicalize, RequestBody, SiteKeyPair};
use rangehubd::config::Config;
use rangehubd::security::password::hash_password;
use rangehubd::server::{self, AppState};

/// A hub instance running inside the test process.
pub struct TestHub {
    pub state: Arc<AppState>,
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
    _data_dir: tempfile::TempDir,
}

/// Test accounts present in every hub:
/// alice (1, global admin), bob (2), carol (3), dave (4).
/// Per-site roles come from the caller's site blocks.
pub const PASSWORD: &str = "test-password";

impl TestHub {
    /// Spawn a hub with the standard accounts plus the given site blocks.
    pub async fn spawn(site_blocks: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;

        let hash = hash_password(PASSWORD).expect("argon2 hash");
        let config_content = format!(
            r#"
[server]
name = "hub.test"
listen = "127.0.0.1:0"
metrics_port = 0

[security]
token_secret = "integration-tests-need-a-long-secret"

[[account]]
id = 1
username = "alice"
email = "alice@hub.test"
password = "{hash}"
global_admin = true

[[account]]
id = 2
username = "bob"
email = "bob@hub.test"
password = "{hash}"

[[account]]
id = 3
username = "carol"
email = "carol@hub.test"
password = "{hash}"

[[account]]
id = 4
username = "dave"
email = "dave@hub.test"
password = "{hash}"

{site_blocks}
"#
        );

        let config_path = data_dir.path().join("rangehub.toml");
        std::fs::write(&config_path, config_content)?;
        let config = Config::load(&config_path)?;

        let state = Arc::new(AppState::from_config(&config)?);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = {
            let state = state.clone();
            tokio::spawn(async move {
                let _ = server::serve(state, listener).await;
            })
        };

        Ok(Self {
            state,
            addr,
            task,
            _data_dir: data_dir,
        })
    }

    /// Absolute HTTP URL for a path.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Absolute WebSocket URL for a path.
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    /// Log a standard account in and return its bearer token.
    pub async fn login(&self, client: &reqwest::Client, username: &str) -> anyhow::Result<String> {
        let resp = client
            .post(self.url("/v1/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "login failed for {username}: {}",
            resp.status()
        );
        let body: serde_json::Value = resp.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no token in login response"))
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Render a `[[site]]` config block for a test keypair.
pub fn site_block(id: i64, keys: &SiteKeyPair, owners: &[i64], guards: &[i64]) -> String {
    format!(
        r#"
[[site]]
id = {id}
name = "site-{id}"
public_key = "{key}"
owners = {owners:?}
security_guards = {guards:?}
"#,
        key = keys.public_key().to_base64(),
    )
}

/// Sign a request the way a site daemon does: returns the `site-id` and
/// `signature` header values for the given claim.
pub fn sign_headers(
    keys: &SiteKeyPair,
    claimed_site: i64,
    path: &str,
    body: &RequestBody,
) -> (String, String) {
    let payload = canonicalize(claimed_site, path, body);
    (
        claimed_site.to_string(),
        STANDARD.encode(keys.sign(&payload)),
    )
}
