use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config;
use crate::server::{AuthReplica, InventoryReplica};
use crate::store::{PgRecordStore, RedisSecretStore, SecretStore};

#[derive(Subcommand)]
pub enum ServeCommands {
    #[command(about = "Issuing service: login and password change")]
    Auth {
        #[arg(long, help = "Listen port (defaults to AUTH_PORT or 4000)")]
        port: Option<u16>,
    },

    #[command(about = "Consuming service: token-gated product CRUD")]
    Inventory {
        #[arg(long, help = "Listen port (defaults to INVENTORY_PORT or 5000)")]
        port: Option<u16>,
    },
}

pub async fn handle(cmd: ServeCommands) -> anyhow::Result<()> {
    let config = config::config();
    info!(environment = ?config.environment, "Loaded configuration");

    let secrets: Arc<dyn SecretStore> =
        Arc::new(RedisSecretStore::open(&config.cache.url).context("invalid cache URL")?);
    let records = Arc::new(PgRecordStore::connect_lazy(&config.records).context("invalid record store URL")?);

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cmd {
        ServeCommands::Auth { port } => {
            let listener = bind(port.unwrap_or(config.server.auth_port)).await?;
            let replica = AuthReplica::new(config, secrets, records).context("invalid password hashing settings")?;
            replica.serve(listener, cancel).await.context("auth service failed")?;
        }
        ServeCommands::Inventory { port } => {
            let listener = bind(port.unwrap_or(config.server.inventory_port)).await?;
            let replica = InventoryReplica::new(config, secrets, records);
            replica.serve(listener, cancel).await.context("inventory service failed")?;
        }
    }

    Ok(())
}

async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}
