#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use inventory_gate::config::{AppConfig, Environment};
use inventory_gate::secret::ReplicaSecret;
use inventory_gate::server::{AuthReplica, InventoryReplica};
use inventory_gate::store::{MemoryRecordStore, MemorySecretStore};

pub const SECRET_KEY: &str = "system_jwt_secret";

/// Development defaults with cheap hashing and a one-second retry
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_profile(Environment::Development);
    config.security.password_hash_memory_kib = 8;
    config.security.password_hash_iterations = 1;
    config.security.secret_resync_secs = 0;
    config.bootstrap.retry_delay_secs = 1;
    config.bootstrap.retry_max_delay_secs = 1;
    config.server.enable_cors = false;
    config
}

/// A replica serving on a local port; shuts down when dropped
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    cancel: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen() -> Result<(TcpListener, u16)> {
    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    Ok((listener, port))
}

fn test_server(port: u16, cancel: CancellationToken) -> TestServer {
    TestServer {
        port,
        base_url: format!("http://127.0.0.1:{}", port),
        cancel,
    }
}

pub async fn spawn_auth(
    config: &AppConfig,
    secrets: &MemorySecretStore,
    records: &MemoryRecordStore,
) -> Result<(TestServer, ReplicaSecret)> {
    let (listener, port) = listen().await?;
    let replica = AuthReplica::new(config, Arc::new(secrets.clone()), Arc::new(records.clone()))?;
    let secret = replica.secret().clone();
    let cancel = CancellationToken::new();
    tokio::spawn(replica.serve(listener, cancel.clone()));
    Ok((test_server(port, cancel), secret))
}

pub async fn spawn_inventory(
    config: &AppConfig,
    secrets: &MemorySecretStore,
    records: &MemoryRecordStore,
) -> Result<TestServer> {
    let (listener, port) = listen().await?;
    let replica = InventoryReplica::new(config, Arc::new(secrets.clone()), Arc::new(records.clone()));
    let cancel = CancellationToken::new();
    tokio::spawn(replica.serve(listener, cancel.clone()));
    Ok(test_server(port, cancel))
}

/// Waits for an auth replica to finish bootstrap
pub async fn wait_ready(secret: &ReplicaSecret, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, secret.ready())
        .await
        .context("auth replica did not finish bootstrap in time")?;
    Ok(())
}

pub async fn login(server: &TestServer, username: &str, password: &str) -> Result<(StatusCode, Value)> {
    let res = reqwest::Client::new()
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    let status = res.status();
    Ok((status, res.json::<Value>().await?))
}

pub async fn token(server: &TestServer, username: &str, password: &str) -> Result<String> {
    let (status, body) = login(server, username, password).await?;
    anyhow::ensure!(status == StatusCode::OK, "login failed with {}: {}", status, body);
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}
