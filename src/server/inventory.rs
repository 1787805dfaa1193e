use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bootstrap::{DependencyBootstrap, RetryPolicy, RetrySupervisor};
use crate::config::AppConfig;
use crate::handlers::{protected::products, public::health};
use crate::middleware::require_token;
use crate::store::{ProductStore, RecordStore, SecretStore};
use crate::token::TokenVerifier;

/// Shared handler state of the inventory service
#[derive(Clone)]
pub struct InventoryState {
    pub products: Arc<dyn ProductStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub secret_key: String,
    pub verifier: TokenVerifier,
}

pub fn router(state: InventoryState) -> Router {
    let protected = Router::new()
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/:id", put(products::update).delete(products::delete))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_token,
        ));

    Router::new()
        // Liveness goes ahead of the token gate
        .route("/api/products/health", get(health::inventory_health))
        .merge(protected)
        .with_state(state)
}

/// One replica of the consuming service
pub struct InventoryReplica {
    state: InventoryState,
    bootstrap: DependencyBootstrap,
    supervisor: RetrySupervisor,
    enable_cors: bool,
}

impl InventoryReplica {
    pub fn new<R>(config: &AppConfig, secrets: Arc<dyn SecretStore>, records: Arc<R>) -> Self
    where
        R: ProductStore + RecordStore + 'static,
    {
        let verifier = TokenVerifier::new(
            secrets.clone(),
            config.cache.secret_key.clone(),
            config.security.verifier_cache_ttl(),
        );
        let bootstrap = DependencyBootstrap {
            secrets: secrets.clone(),
            records: records.clone(),
        };

        Self {
            state: InventoryState {
                products: records,
                secrets,
                secret_key: config.cache.secret_key.clone(),
                verifier,
            },
            bootstrap,
            supervisor: RetrySupervisor::new(RetryPolicy::from(&config.bootstrap)),
            enable_cors: config.server.enable_cors,
        }
    }

    pub fn state(&self) -> &InventoryState {
        &self.state
    }

    pub fn router(&self) -> Router {
        let router = router(self.state.clone()).layer(TraceLayer::new_for_http());
        match super::cors_layer(self.enable_cors) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    pub fn spawn_background(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let bootstrap = self.bootstrap.clone();
        let supervisor = self.supervisor.clone();

        tokio::spawn(async move {
            if supervisor
                .run("Inventory bootstrap", &cancel, || bootstrap.attempt())
                .await
                .is_some()
            {
                info!("Inventory replica dependencies ready");
            }
        })
    }

    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let background = self.spawn_background(cancel.clone());
        info!(addr = ?listener.local_addr().ok(), "Inventory service listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(super::shutdown(cancel.clone()))
            .await;

        cancel.cancel();
        super::join_background(background, "Inventory background task").await;
        result
    }
}
