use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bootstrap::{IssuerBootstrap, RetryPolicy, RetrySupervisor, SeedUser};
use crate::config::AppConfig;
use crate::handlers::public::{auth, health};
use crate::password::{PasswordError, Passwords};
use crate::secret::{resync_loop, ReplicaSecret};
use crate::services::AuthService;
use crate::store::{SecretStore, UserStore};

/// Shared handler state of the auth service
#[derive(Clone)]
pub struct AuthState {
    pub service: AuthService,
    pub secrets: Arc<dyn SecretStore>,
    pub users: Arc<dyn UserStore>,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/health", get(health::auth_health))
        .with_state(state)
}

/// One replica of the issuing service
pub struct AuthReplica {
    state: AuthState,
    bootstrap: IssuerBootstrap,
    supervisor: RetrySupervisor,
    secret_key: String,
    resync_interval: Option<Duration>,
    enable_cors: bool,
}

impl AuthReplica {
    pub fn new(
        config: &AppConfig,
        secrets: Arc<dyn SecretStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self, PasswordError> {
        let passwords = Passwords::new(
            config.security.password_hash_memory_kib,
            config.security.password_hash_iterations,
        )?;
        let secret = ReplicaSecret::pending();
        let service = AuthService::new(
            users.clone(),
            passwords.clone(),
            secret,
            config.security.token_ttl(),
        );
        let bootstrap = IssuerBootstrap {
            secrets: secrets.clone(),
            users: users.clone(),
            passwords,
            seed: SeedUser {
                username: config.security.seed_admin_username.clone(),
                password: config.security.seed_admin_password.clone(),
            },
            secret_key: config.cache.secret_key.clone(),
        };

        Ok(Self {
            state: AuthState { service, secrets, users },
            bootstrap,
            supervisor: RetrySupervisor::new(RetryPolicy::from(&config.bootstrap)),
            secret_key: config.cache.secret_key.clone(),
            resync_interval: config.security.secret_resync_interval(),
            enable_cors: config.server.enable_cors,
        })
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn secret(&self) -> &ReplicaSecret {
        self.state.service.secret()
    }

    pub fn router(&self) -> Router {
        let router = router(self.state.clone()).layer(TraceLayer::new_for_http());
        match super::cors_layer(self.enable_cors) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Runs the supervised bootstrap, then keeps the secret in sync until cancelled.
    pub fn spawn_background(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let bootstrap = self.bootstrap.clone();
        let supervisor = self.supervisor.clone();
        let handle = self.secret().clone();
        let secrets = self.state.secrets.clone();
        let key = self.secret_key.clone();
        let resync_interval = self.resync_interval;

        tokio::spawn(async move {
            let Some(secret) = supervisor
                .run("Auth bootstrap", &cancel, || bootstrap.attempt())
                .await
            else {
                return;
            };
            handle.adopt(secret);
            info!("Auth replica ready to issue tokens");

            if let Some(interval) = resync_interval {
                resync_loop(secrets, key, handle, interval, cancel).await;
            }
        })
    }

    /// Accepts traffic immediately; login answers 503 until bootstrap completes.
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let background = self.spawn_background(cancel.clone());
        info!(addr = ?listener.local_addr().ok(), "Auth service listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(super::shutdown(cancel.clone()))
            .await;

        cancel.cancel();
        super::join_background(background, "Auth background task").await;
        result
    }
}
